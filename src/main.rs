//! bc-monitor CLI - Blockchain RPC endpoint health poller

mod cli;

use bc_monitor::{normalize_log_level, Config, DispatchConfig};
use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config commands must work even when the config file does not parse
    if let Some(Commands::Config { action }) = &cli.command {
        return cli::config::handle(action, &cli);
    }

    let file = cli.load_config_file()?;

    // Set up logging: -v wins over the configured level
    let configured = normalize_log_level(&file.settings.log_level);
    let filter = match cli.verbose {
        0 => configured.unwrap_or("info"),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    // Logs go to stderr; stdout carries command output such as line protocol
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::new(filter))
        .init();

    if configured.is_none() {
        tracing::warn!(
            "Log level error [{}], level set to 'info'.",
            file.settings.log_level
        );
    }

    match &cli.command {
        None | Some(Commands::Run) => {
            let config = Config::from_file(&file)?;
            tracing::info!("Config file loaded from {}", cli.config_path().display());
            cli::monitor::handle_run(&config).await
        }
        Some(Commands::Once(args)) => {
            let config = Config::from_file(&file)?;
            cli::monitor::handle_once(args, &config).await
        }
        Some(Commands::Endpoints { action }) => {
            let config = Config::from_file(&file)?;
            cli::endpoints::handle(action, &config).await
        }
        Some(Commands::Probe(args)) => {
            let dispatch = DispatchConfig::from_settings(&file.settings)?;
            cli::probe::handle_probe(args, &dispatch).await
        }
        Some(Commands::Latency(args)) => {
            let dispatch = DispatchConfig::from_settings(&file.settings)?;
            cli::probe::handle_latency(args, &dispatch).await
        }
        Some(Commands::Config { .. }) => Ok(()),
    }
}
