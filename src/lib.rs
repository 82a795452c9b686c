//! bc-monitor - Blockchain RPC endpoint health poller
//!
//! Periodically probes every RPC endpoint listed by an endpoint directory for
//! its latest block height, computes each chain's consensus height and how far
//! every endpoint trails it, and writes the results to InfluxDB.
//!
//! # Example
//!
//! ```rust,no_run
//! use bc_monitor::{Config, ConfigFile, InfluxSink, Monitor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let file = ConfigFile::load_default()?.unwrap_or_default();
//!     let config = Config::from_file(&file)?;
//!
//!     let sink = InfluxSink::new(config.influx()?)?;
//!     let mut monitor = Monitor::from_config(&config, sink)?;
//!     monitor.run().await?;
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod bench;
pub mod config;
pub mod directory;
pub mod error;
pub mod monitor;
pub mod output;
pub mod rpc;

// Re-exports for convenience
pub use aggregate::{aggregate, ChainAggregate};
pub use bench::{measure, LatencyReport};
pub use config::{
    normalize_log_level, Config, ConfigFile, DirectoryConfig, DispatchConfig, Endpoint,
    InfluxConfig,
};
pub use directory::{CachedEndpoints, DirectoryClient, EndpointCache};
pub use error::{ConfigError, DirectoryError, Error, ProtocolError, Result, SinkError};
pub use monitor::{CycleReport, Monitor, RunningStats};
pub use output::{
    build_records, FieldValue, InfluxSink, MetricRecord, MetricsSink, StdoutSink, MAX_HEIGHT_URL,
};
pub use rpc::{
    ApiClass, Dispatcher, ErrorKind, HttpProber, ProbeError, ProbeOutcome, Prober, Transport,
};
