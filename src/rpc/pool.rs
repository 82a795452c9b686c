//! Bounded-concurrency probe dispatcher
//!
//! A fixed set of `min(concurrency, pending)` slots is kept busy: the moment a
//! probe finishes, its slot takes the next queued endpoint. Every endpoint
//! handed to [`Dispatcher::dispatch`] comes back as exactly one
//! [`ProbeOutcome`], in completion order.

use crate::config::{DispatchConfig, Endpoint};
use crate::rpc::outcome::{ErrorKind, ProbeError, ProbeOutcome, Transport};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

/// Something that can probe a single endpoint
///
/// Implementations report every failure inside the outcome.
pub trait Prober {
    fn probe(&self, endpoint: Endpoint) -> impl Future<Output = ProbeOutcome> + Send;
}

/// Index into the slot pool
type SlotId = usize;

/// Dispatches one probe per endpoint with bounded concurrency
pub struct Dispatcher<P> {
    prober: P,
    /// Max probes in flight
    concurrency: usize,
    /// Wake-up interval while waiting on in-flight probes
    housekeeping_interval: Duration,
    /// Outer bound on a single probe, fallback included
    probe_deadline: Duration,
}

impl<P: Prober> Dispatcher<P> {
    /// Create a dispatcher
    pub fn new(prober: P, config: &DispatchConfig) -> Self {
        Self {
            prober,
            concurrency: config.concurrency.max(1),
            housekeeping_interval: config.housekeeping_interval,
            // Two transport attempts plus one housekeeping period of slack
            probe_deadline: config.request_timeout.saturating_mul(2)
                + config.housekeeping_interval,
        }
    }

    /// Get the prober
    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Get concurrency level
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Probe every endpoint once
    pub async fn dispatch(&self, endpoints: Vec<Endpoint>) -> Vec<ProbeOutcome> {
        let total = endpoints.len();
        if total == 0 {
            return Vec::new();
        }

        let slot_count = self.concurrency.min(total);
        let mut free: Vec<SlotId> = (0..slot_count).rev().collect();
        let mut queue: VecDeque<Endpoint> = endpoints.into();
        let mut in_flight = FuturesUnordered::new();
        let mut outcomes = Vec::with_capacity(total);

        let mut housekeeping = tokio::time::interval(self.housekeeping_interval);
        housekeeping.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let started = Instant::now();

        tracing::debug!(
            "Dispatching {} probes over {} connection slots",
            total,
            slot_count
        );

        while outcomes.len() < total {
            // Hand every free slot the next queued endpoint
            while !queue.is_empty() {
                let Some(slot) = free.pop() else { break };
                if let Some(endpoint) = queue.pop_front() {
                    in_flight.push(self.run_slot(slot, endpoint));
                }
            }

            tokio::select! {
                Some((slot, outcome)) = in_flight.next() => {
                    log_outcome(&outcome);
                    outcomes.push(outcome);
                    free.push(slot);
                }
                _ = housekeeping.tick() => {
                    tracing::trace!(
                        "Dispatch - {}/{} done, {} in flight, {} queued, {:.1}s elapsed",
                        outcomes.len(),
                        total,
                        in_flight.len(),
                        queue.len(),
                        started.elapsed().as_secs_f64()
                    );
                }
            }
        }

        tracing::debug!(
            "Dispatched {} probes in {:.3}s",
            total,
            started.elapsed().as_secs_f64()
        );

        outcomes
    }

    async fn run_slot(&self, slot: SlotId, endpoint: Endpoint) -> (SlotId, ProbeOutcome) {
        let fallback = endpoint.clone();
        let outcome =
            match tokio::time::timeout(self.probe_deadline, self.prober.probe(endpoint)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let transport = if fallback.is_websocket() {
                        Transport::WebSocket
                    } else {
                        Transport::Http
                    };
                    let error = ProbeError::new(
                        ErrorKind::Timeout,
                        format!("probe exceeded {}ms", self.probe_deadline.as_millis()),
                    );
                    ProbeOutcome::failure(fallback, transport, error)
                }
            };
        (slot, outcome)
    }
}

fn log_outcome(outcome: &ProbeOutcome) {
    match (&outcome.error, outcome.block_height) {
        (None, Some(height)) => tracing::debug!(
            "Probe OK for [{}] ({}): height {} via {:?}",
            outcome.endpoint.url,
            outcome.endpoint.chain,
            height,
            outcome.transport
        ),
        (Some(error), _) => tracing::debug!(
            "Probe failed for [{}] ({}): {}",
            outcome.endpoint.url,
            outcome.endpoint.chain,
            error
        ),
        (None, None) => tracing::debug!("Probe for [{}] returned no height", outcome.endpoint.url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Replies with a fixed height per URL after a per-URL delay
    struct FakeProber {
        replies: HashMap<String, (u64, Duration)>,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl FakeProber {
        fn new(replies: &[(&str, u64, u64)]) -> Self {
            Self {
                replies: replies
                    .iter()
                    .map(|(url, height, delay)| {
                        (url.to_string(), (*height, Duration::from_millis(*delay)))
                    })
                    .collect(),
                in_flight: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl Prober for FakeProber {
        async fn probe(&self, endpoint: Endpoint) -> ProbeOutcome {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let (height, delay) = self.replies[&endpoint.url];
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            ProbeOutcome::success(endpoint, Transport::Http, 200, delay, height)
        }
    }

    fn config(concurrency: usize, timeout_ms: u64) -> DispatchConfig {
        DispatchConfig {
            concurrency,
            request_timeout: Duration::from_millis(timeout_ms),
            housekeeping_interval: Duration::from_millis(10),
            websocket_fallback: true,
        }
    }

    fn endpoints(urls: &[&str]) -> Vec<Endpoint> {
        urls.iter()
            .map(|url| Endpoint::new("eth", *url, "ethereum"))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_dispatch() {
        let dispatcher = Dispatcher::new(FakeProber::new(&[]), &config(4, 100));
        assert!(dispatcher.dispatch(Vec::new()).await.is_empty());
    }

    #[tokio::test]
    async fn test_every_endpoint_yields_one_outcome() {
        let replies: Vec<(String, u64, u64)> = (0..25)
            .map(|i| (format!("http://node-{}", i), 100 + i, (i % 5) * 3))
            .collect();
        let borrowed: Vec<(&str, u64, u64)> = replies
            .iter()
            .map(|(u, h, d)| (u.as_str(), *h, *d))
            .collect();
        let urls: Vec<&str> = borrowed.iter().map(|(u, _, _)| *u).collect();

        let dispatcher = Dispatcher::new(FakeProber::new(&borrowed), &config(4, 1000));
        let outcomes = dispatcher.dispatch(endpoints(&urls)).await;

        assert_eq!(outcomes.len(), 25);
        let mut seen: Vec<_> = outcomes.iter().map(|o| o.endpoint.url.clone()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 25);
        assert!(dispatcher.prober().peak.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn test_concurrency_is_saturated() {
        let replies = [
            ("http://a", 1, 30),
            ("http://b", 1, 30),
            ("http://c", 1, 30),
            ("http://d", 1, 30),
            ("http://e", 1, 30),
        ];
        let urls: Vec<&str> = replies.iter().map(|(u, _, _)| *u).collect();
        let dispatcher = Dispatcher::new(FakeProber::new(&replies), &config(3, 1000));

        dispatcher.dispatch(endpoints(&urls)).await;
        assert_eq!(dispatcher.prober().peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_slot_refilled_before_batch_drains() {
        // One slow probe must not hold back the fast ones queued behind it
        let replies = [
            ("http://slow", 1, 300),
            ("http://fast-1", 2, 10),
            ("http://fast-2", 3, 10),
            ("http://fast-3", 4, 10),
        ];
        let urls: Vec<&str> = replies.iter().map(|(u, _, _)| *u).collect();
        let dispatcher = Dispatcher::new(FakeProber::new(&replies), &config(2, 1000));

        let outcomes = dispatcher.dispatch(endpoints(&urls)).await;
        let order: Vec<_> = outcomes.iter().map(|o| o.endpoint.url.as_str()).collect();
        assert_eq!(order, vec!["http://fast-1", "http://fast-2", "http://fast-3", "http://slow"]);
    }

    #[tokio::test]
    async fn test_stuck_probe_becomes_timeout() {
        let replies = [("http://stuck", 1, 5_000), ("http://ok", 7, 5)];
        let urls: Vec<&str> = replies.iter().map(|(u, _, _)| *u).collect();
        let dispatcher = Dispatcher::new(FakeProber::new(&replies), &config(2, 50));

        let outcomes = dispatcher.dispatch(endpoints(&urls)).await;
        assert_eq!(outcomes.len(), 2);

        let stuck = outcomes
            .iter()
            .find(|o| o.endpoint.url == "http://stuck")
            .unwrap();
        assert_eq!(stuck.error_kind(), Some(ErrorKind::Timeout));
        assert_eq!(stuck.block_height, None);

        let ok = outcomes.iter().find(|o| o.endpoint.url == "http://ok").unwrap();
        assert_eq!(ok.block_height, Some(7));
    }
}
