//! Line protocol to stdout, for dry runs

use crate::error::{Result, SinkError};
use crate::output::{MetricRecord, MetricsSink};
use std::io::{self, Write};

/// Prints records as line protocol instead of storing them
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink;

impl StdoutSink {
    fn print(records: &[MetricRecord]) -> io::Result<()> {
        let mut out = io::stdout().lock();
        for record in records {
            writeln!(out, "{}", record.to_line_protocol())?;
        }
        out.flush()
    }
}

impl MetricsSink for StdoutSink {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn write(&self, records: &[MetricRecord]) -> Result<()> {
        Self::print(records).map_err(SinkError::from)?;
        Ok(())
    }
}
