//! CLI command modules
//!
//! Each subcommand has its own module with argument definitions and handlers.

pub mod config;
pub mod endpoints;
pub mod monitor;
pub mod probe;

use bc_monitor::ConfigFile;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bc-monitor")]
#[command(
    version,
    about = "Blockchain RPC endpoint health poller: block height, drift and latency per endpoint"
)]
#[command(after_help = r#"EXAMPLES:
    # Poll forever, writing to InfluxDB
    bc-monitor run

    # One cycle, print line protocol instead of writing it
    bc-monitor once --dry-run

    # Probe a single endpoint
    bc-monitor probe https://eth.llamarpc.com --api-class ethereum

    # Compare endpoint latency over 10 rounds
    bc-monitor latency https://rpc.ankr.com/eth https://eth.drpc.org --rounds 10

    # Force an endpoint directory refresh
    bc-monitor endpoints refresh

ENVIRONMENT VARIABLES:
    INFLUXDB_TOKEN    InfluxDB API token (overrides influxdb.token)

CONFIG FILE:
    Default: ~/.config/bc-monitor/config.toml
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// InfluxDB API token
    #[arg(long, env = "INFLUXDB_TOKEN", global = true, hide_env_values = true)]
    pub influx_token: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv), overrides settings.log_level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Poll all endpoints until interrupted (default)
    Run,

    /// Run a single poll cycle
    Once(monitor::OnceArgs),

    /// Show or refresh the cached endpoint directory
    Endpoints {
        #[command(subcommand)]
        action: endpoints::EndpointCommands,
    },

    /// Probe one endpoint and print the outcome
    Probe(probe::ProbeArgs),

    /// Measure endpoint latency over several rounds
    Latency(probe::LatencyArgs),

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: config::ConfigCommands,
    },
}

impl Cli {
    /// Load the config file named by `--config`, else the default one
    ///
    /// A missing default file yields defaults; a missing `--config` file is an error.
    pub fn load_config_file(&self) -> anyhow::Result<ConfigFile> {
        let mut file = match &self.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::load_default()?.unwrap_or_default(),
        };

        if let Some(token) = &self.influx_token {
            file.influxdb.token = Some(token.clone());
        }

        Ok(file)
    }

    /// Path of the config file in use
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(ConfigFile::default_path)
    }
}

/// Format a number with thousands separators
pub fn format_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut result = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }

    result
}

/// Format an optional duration as seconds
pub fn format_secs(d: Option<std::time::Duration>) -> String {
    d.map(|d| format!("{:.3}s", d.as_secs_f64()))
        .unwrap_or_else(|| "-".to_string())
}
