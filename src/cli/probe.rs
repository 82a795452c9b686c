//! Ad-hoc probing and latency measurement

use super::{format_secs, format_thousands};
use bc_monitor::{measure, ApiClass, DispatchConfig, Dispatcher, Endpoint, HttpProber};
use clap::Args;

#[derive(Args)]
pub struct ProbeArgs {
    /// RPC URL (http, https, ws or wss)
    pub url: String,

    /// Protocol family of the endpoint
    #[arg(long, default_value = "ethereum")]
    pub api_class: ApiClass,

    /// Chain label for log output
    #[arg(long, default_value = "adhoc")]
    pub chain: String,
}

#[derive(Args)]
pub struct LatencyArgs {
    /// RPC URLs to compare
    #[arg(required = true)]
    pub urls: Vec<String>,

    /// Protocol family of the endpoints
    #[arg(long, default_value = "ethereum")]
    pub api_class: ApiClass,

    /// Number of probe rounds
    #[arg(short, long, default_value = "5")]
    pub rounds: usize,
}

pub async fn handle_probe(args: &ProbeArgs, dispatch: &DispatchConfig) -> anyhow::Result<()> {
    let prober = HttpProber::new(dispatch)?;
    let endpoint = Endpoint::new(&args.chain, &args.url, args.api_class.as_str());

    println!("Probing {} ({})\n", args.url, args.api_class);
    let outcome = prober.probe_endpoint(endpoint).await;

    println!("  Transport:   {:?}", outcome.transport);
    println!(
        "  HTTP status: {}",
        outcome
            .http_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    println!("  Latency:     {}", format_secs(outcome.latency));

    match (&outcome.error, outcome.block_height) {
        (None, Some(height)) => println!("  Height:      ✓ {}", format_thousands(height)),
        (Some(error), _) => println!("  Height:      ✗ FAILED: {}", error),
        (None, None) => println!("  Height:      ? UNKNOWN"),
    }

    Ok(())
}

pub async fn handle_latency(args: &LatencyArgs, dispatch: &DispatchConfig) -> anyhow::Result<()> {
    if args.rounds == 0 {
        anyhow::bail!("--rounds must be at least 1");
    }

    let prober = HttpProber::new(dispatch)?;
    let dispatcher = Dispatcher::new(prober, dispatch);
    let endpoints: Vec<Endpoint> = args
        .urls
        .iter()
        .map(|url| Endpoint::new("latency", url, args.api_class.as_str()))
        .collect();

    eprintln!(
        "Measuring {} endpoints over {} rounds...",
        endpoints.len(),
        args.rounds
    );
    let reports = measure(&dispatcher, &endpoints, args.rounds).await;

    let width = reports.iter().map(|r| r.url.len()).max().unwrap_or(3).max(3);
    println!(
        "{:<width$}  {:>8}  {:>8}  {:>8}  {:>5}  {:>14}",
        "URL", "MEAN", "MIN", "MAX", "FAIL", "HEIGHT",
    );
    for report in &reports {
        println!(
            "{:<width$}  {:>8}  {:>8}  {:>8}  {:>5}  {:>14}",
            report.url,
            format_secs(report.mean()),
            format_secs(report.min),
            format_secs(report.max),
            report.failures,
            report
                .last_height
                .map(format_thousands)
                .unwrap_or_else(|| report
                    .last_error
                    .map(|k| k.to_string())
                    .unwrap_or_else(|| "-".to_string())),
        );
    }

    Ok(())
}
