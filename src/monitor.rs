//! Polling loop: load endpoints, probe, aggregate, emit, sleep

use crate::aggregate::aggregate;
use crate::config::{Config, Endpoint};
use crate::directory::EndpointCache;
use crate::error::{DirectoryError, Error, Result, SinkError};
use crate::output::{build_records, timestamp_now, MetricsSink};
use crate::rpc::{Dispatcher, HttpProber, ProbeOutcome, Prober};
use std::future::Future;
use std::time::{Duration, Instant};

/// Counters and phase timings of one cycle
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Endpoints dispatched
    pub attempted: usize,
    /// Outcomes collected
    pub processed: usize,
    /// Outcomes without a height
    pub failed: usize,
    pub http: usize,
    pub websocket: usize,
    /// Subset of `websocket` reached through HTTP fallback
    pub fallbacks: usize,
    /// Records handed to the sink
    pub records: usize,
    pub load_time: Duration,
    pub dispatch_time: Duration,
    pub process_time: Duration,
    pub write_time: Duration,
    pub total_time: Duration,
}

impl CycleReport {
    fn count(&mut self, outcomes: &[ProbeOutcome]) {
        self.processed = outcomes.len();
        for outcome in outcomes {
            if !outcome.is_success() {
                self.failed += 1;
            }
            if outcome.transport.is_websocket() {
                self.websocket += 1;
                if outcome.transport.is_fallback() {
                    self.fallbacks += 1;
                }
            } else {
                self.http += 1;
            }
        }
    }

    /// Mean processing time per endpoint
    pub fn mean_time(&self) -> Duration {
        if self.attempted == 0 {
            Duration::ZERO
        } else {
            self.total_time / self.attempted as u32
        }
    }
}

/// Program-wide statistics across cycles
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    cycles: u64,
    total_time: Duration,
    total_failed: u64,
}

impl RunningStats {
    pub fn record(&mut self, report: &CycleReport) {
        self.cycles += 1;
        self.total_time += report.total_time;
        self.total_failed += report.failed as u64;
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn mean_cycle_time(&self) -> Duration {
        if self.cycles == 0 {
            Duration::ZERO
        } else {
            self.total_time.div_f64(self.cycles as f64)
        }
    }

    pub fn mean_failed(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.total_failed as f64 / self.cycles as f64
        }
    }
}

/// Owns the cycle loop and its cross-cycle state
pub struct Monitor<P, S> {
    cache: EndpointCache,
    dispatcher: Dispatcher<P>,
    sink: S,
    poll_interval: Duration,
    stats: RunningStats,
    /// Endpoints of the last successful load
    endpoints: Option<Vec<Endpoint>>,
}

impl<S: MetricsSink> Monitor<HttpProber, S> {
    /// Build a monitor probing over HTTP/WebSocket
    pub fn from_config(config: &Config, sink: S) -> Result<Self> {
        let cache = EndpointCache::from_config(&config.directory)?;
        let prober = HttpProber::new(&config.dispatch)?;
        let dispatcher = Dispatcher::new(prober, &config.dispatch);
        Ok(Self::new(cache, dispatcher, sink, config.poll_interval))
    }
}

impl<P: Prober, S: MetricsSink> Monitor<P, S> {
    pub fn new(
        cache: EndpointCache,
        dispatcher: Dispatcher<P>,
        sink: S,
        poll_interval: Duration,
    ) -> Self {
        Self {
            cache,
            dispatcher,
            sink,
            poll_interval,
            stats: RunningStats::default(),
            endpoints: None,
        }
    }

    pub fn stats(&self) -> &RunningStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Check the metrics sink and the endpoint directory are reachable
    pub async fn preflight(&self) -> Result<()> {
        if let Err(e) = self.sink.ping().await {
            tracing::error!("Couldn't connect to the metrics sink: {}", e);
            return Err(match e {
                Error::Sink(sink) => sink.into(),
                other => SinkError::Unavailable(other.to_string()).into(),
            });
        }

        let client = self.cache.client();
        if let Err(e) = client.ping().await {
            tracing::error!(
                "Couldn't connect to the endpoint directory at {}: {}",
                client.base_url(),
                e
            );
            return Err(DirectoryError::Unavailable(format!("{}: {}", client.base_url(), e)).into());
        }

        tracing::info!("Connection tested.");
        Ok(())
    }

    /// Run one load → dispatch → aggregate → emit cycle
    ///
    /// Fails only when there are no endpoints at all yet, or when the sink
    /// rejects the write.
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let started = Instant::now();

        let endpoints = self.load().await?;
        report.attempted = endpoints.len();
        report.load_time = started.elapsed();

        let phase = Instant::now();
        let outcomes = self.dispatcher.dispatch(endpoints).await;
        report.dispatch_time = phase.elapsed();

        let phase = Instant::now();
        let timestamp = timestamp_now();
        let aggregates = aggregate(&outcomes);
        let records = build_records(&outcomes, &aggregates, timestamp);
        report.count(&outcomes);
        report.records = records.len();
        for outcome in outcomes.iter().filter(|o| o.http_status.is_some_and(|s| s != 200)) {
            tracing::warn!(
                "HTTP code [{}] for {}, something went wrong with the request.",
                outcome.http_status.unwrap_or_default(),
                outcome.endpoint.url
            );
        }
        report.process_time = phase.elapsed();

        let phase = Instant::now();
        self.sink.write(&records).await?;
        report.write_time = phase.elapsed();

        report.total_time = started.elapsed();
        self.stats.record(&report);
        self.log_cycle(&report);

        Ok(report)
    }

    /// Loop until `shutdown` resolves or a fatal error occurs
    ///
    /// A running cycle is always completed; shutdown is honoured while sleeping.
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tracing::info!("- MONITOR LOOP START");
            self.run_cycle().await?;

            tracing::info!("Sleeping for {} seconds...", self.poll_interval.as_secs_f64());
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = &mut shutdown => break,
            }
        }

        tracing::info!("Monitor stopped after {} loops", self.stats.cycles());
        Ok(())
    }

    /// Bootstrap, then loop until Ctrl-C
    pub async fn run(&mut self) -> Result<()> {
        self.preflight().await?;
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Received Ctrl-C, shutting down");
        })
        .await
    }

    /// Current endpoints; a failed load after the first keeps the last list
    async fn load(&mut self) -> Result<Vec<Endpoint>> {
        match self.cache.load_endpoints().await {
            Ok(endpoints) => {
                self.endpoints = Some(endpoints.clone());
                Ok(endpoints)
            }
            Err(e) => match &self.endpoints {
                Some(last) => {
                    tracing::warn!(
                        "Endpoint load failed, reusing {} endpoints from the previous loop: {}",
                        last.len(),
                        e
                    );
                    Ok(last.clone())
                }
                None => Err(e),
            },
        }
    }

    fn log_cycle(&self, report: &CycleReport) {
        tracing::info!("- MONITOR LOOP END");
        tracing::info!("Loop - Processed requests:   {}/{}", report.processed, report.attempted);
        tracing::info!("Loop - Failed requests:      {}", report.failed);
        tracing::info!("Loop - Endpoints using http: {}", report.http);
        tracing::info!(
            "Loop - Endpoints using ws:   {} ({} by fallback)",
            report.websocket,
            report.fallbacks
        );
        tracing::info!(
            "Loop - Processing time:      {:.3}s (mean {:.3}s)",
            report.total_time.as_secs_f64(),
            report.mean_time().as_secs_f64()
        );

        tracing::info!("Program - Loops since program start: {}", self.stats.cycles());
        tracing::info!(
            "Program - Mean loop processing time: {:.3}s",
            self.stats.mean_cycle_time().as_secs_f64()
        );
        tracing::info!(
            "Program - Average failed requests:   {:.2}",
            self.stats.mean_failed()
        );

        tracing::debug!("Config - Concurrent connections: {}", self.dispatcher.concurrency());
        tracing::debug!("Time data - Loading endpoints: {:.3}s", report.load_time.as_secs_f64());
        tracing::debug!("Time data - Fetching results: {:.3}s", report.dispatch_time.as_secs_f64());
        tracing::debug!("Time data - Parse results: {:.3}s", report.process_time.as_secs_f64());
        tracing::debug!("Time data - Write records: {:.3}s", report.write_time.as_secs_f64());
    }
}
