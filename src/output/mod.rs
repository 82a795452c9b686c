//! Metric records and the sinks they are written to

mod influx;
mod record;
mod stdout;

pub use influx::InfluxSink;
pub use record::{
    build_records, timestamp_now, FieldValue, MetricRecord, MAX_HEIGHT_URL, MEASUREMENT,
};
pub use stdout::StdoutSink;

use crate::error::Result;
use std::future::Future;

/// Destination for a cycle's records
///
/// Any error returned here stops the monitor.
pub trait MetricsSink {
    /// Check the sink is reachable before the first cycle
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    /// Write all records of one cycle
    fn write(&self, records: &[MetricRecord]) -> impl Future<Output = Result<()>> + Send;
}
