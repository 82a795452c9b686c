//! Polling commands

use bc_monitor::{Config, InfluxSink, MetricsSink, Monitor, StdoutSink};
use clap::Args;

#[derive(Args)]
pub struct OnceArgs {
    /// Print line protocol to stdout instead of writing to InfluxDB
    #[arg(long)]
    pub dry_run: bool,
}

/// Poll until Ctrl-C
pub async fn handle_run(config: &Config) -> anyhow::Result<()> {
    let sink = InfluxSink::new(config.influx()?)?;
    tracing::info!("Blockchain monitor started.");

    let mut monitor = Monitor::from_config(config, sink)?;
    if let Err(e) = monitor.run().await {
        tracing::error!("Exiting: {}", e);
        return Err(e.into());
    }
    Ok(())
}

/// Single cycle
pub async fn handle_once(args: &OnceArgs, config: &Config) -> anyhow::Result<()> {
    if args.dry_run {
        run_once(config, StdoutSink).await
    } else {
        run_once(config, InfluxSink::new(config.influx()?)?).await
    }
}

async fn run_once<S: MetricsSink>(config: &Config, sink: S) -> anyhow::Result<()> {
    let mut monitor = Monitor::from_config(config, sink)?;
    monitor.preflight().await?;

    let report = monitor.run_cycle().await?;
    eprintln!(
        "{}/{} endpoints answered, {} failed, {} records in {:.2}s",
        report.processed - report.failed,
        report.attempted,
        report.failed,
        report.records,
        report.total_time.as_secs_f64()
    );
    Ok(())
}
