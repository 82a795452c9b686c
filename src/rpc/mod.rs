//! Endpoint probing: protocol adapters, transports and the dispatcher

pub mod outcome;
pub mod pool;
pub mod protocol;
pub mod transport;

pub use outcome::{ErrorKind, ProbeError, ProbeOutcome, Transport};
pub use pool::{Dispatcher, Prober};
pub use protocol::{ApiClass, RpcRequest};
pub use transport::{FallbackTrigger, HttpProber};
