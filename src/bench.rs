//! Endpoint latency benchmark
//!
//! Probes a fixed URL list for several rounds through the regular dispatcher
//! and summarizes latency and reported height per URL.

use crate::config::Endpoint;
use crate::rpc::{Dispatcher, ErrorKind, Prober};
use std::collections::BTreeMap;
use std::time::Duration;

/// Latency summary for one URL
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LatencyReport {
    pub url: String,
    pub successes: usize,
    pub failures: usize,
    pub min: Option<Duration>,
    pub max: Option<Duration>,
    total: Duration,
    /// Height reported in the last successful round
    pub last_height: Option<u64>,
    /// Error of the last failed round
    pub last_error: Option<ErrorKind>,
}

impl LatencyReport {
    pub fn mean(&self) -> Option<Duration> {
        if self.successes == 0 {
            None
        } else {
            Some(self.total / self.successes as u32)
        }
    }

    fn add(&mut self, latency: Duration, height: u64) {
        self.successes += 1;
        self.total += latency;
        self.min = Some(self.min.map_or(latency, |m| m.min(latency)));
        self.max = Some(self.max.map_or(latency, |m| m.max(latency)));
        self.last_height = Some(height);
    }
}

/// Probe `endpoints` for `rounds` rounds, one summary per URL in input order
pub async fn measure<P: Prober>(
    dispatcher: &Dispatcher<P>,
    endpoints: &[Endpoint],
    rounds: usize,
) -> Vec<LatencyReport> {
    let mut reports: BTreeMap<&str, LatencyReport> = endpoints
        .iter()
        .map(|e| {
            let report = LatencyReport {
                url: e.url.clone(),
                ..Default::default()
            };
            (e.url.as_str(), report)
        })
        .collect();

    for round in 1..=rounds {
        let outcomes = dispatcher.dispatch(endpoints.to_vec()).await;
        tracing::debug!("Latency round {}/{} done", round, rounds);

        for outcome in outcomes {
            let Some(report) = reports.get_mut(outcome.endpoint.url.as_str()) else {
                continue;
            };
            match (outcome.block_height, outcome.latency) {
                (Some(height), Some(latency)) => report.add(latency, height),
                _ => {
                    report.failures += 1;
                    report.last_error = outcome.error_kind();
                }
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    endpoints
        .iter()
        .filter(|e| seen.insert(e.url.as_str()))
        .filter_map(|e| reports.remove(e.url.as_str()))
        .collect()
}
