//! Configuration management commands

use super::Cli;
use bc_monitor::Config;
use clap::Subcommand;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show config file path
    Path,

    /// Show current config and whether it validates
    Show,
}

pub fn handle(action: &ConfigCommands, cli: &Cli) -> anyhow::Result<()> {
    match action {
        ConfigCommands::Path => {
            println!("{}", cli.config_path().display());
        }

        ConfigCommands::Show => {
            let path = cli.config_path();
            if path.exists() {
                let content = std::fs::read_to_string(&path)?;
                println!("# {}\n", path.display());
                println!("{}", content);
            } else {
                println!("No config file found at: {}", path.display());
                println!("\nMinimal config:");
                println!("  [directory]");
                println!("  url = \"http://127.0.0.1:5000\"");
            }

            let validated = cli
                .load_config_file()
                .and_then(|file| Config::from_file(&file).map_err(Into::into));
            match validated {
                Ok(config) => {
                    println!("Config OK");
                    println!("  Directory:     {}", config.directory.url);
                    println!("  Cache:         {}", config.directory.cache_path.display());
                    println!(
                        "  InfluxDB:      {}",
                        config
                            .influx
                            .as_ref()
                            .map(|i| format!("{} (org {}, bucket {})", i.url, i.org, i.bucket))
                            .unwrap_or_else(|| "not configured".to_string())
                    );
                    println!("  Concurrency:   {}", config.dispatch.concurrency);
                    println!(
                        "  Poll interval: {}s",
                        config.poll_interval.as_secs()
                    );
                }
                Err(e) => println!("Config INVALID: {}", e),
            }
        }
    }

    Ok(())
}
