//! Endpoint directory commands

use bc_monitor::directory::unix_now;
use bc_monitor::{Config, Endpoint, EndpointCache};
use clap::Subcommand;
use std::collections::BTreeMap;

#[derive(Subcommand)]
pub enum EndpointCommands {
    /// List cached endpoints by chain
    List,

    /// Fetch the directory now and rewrite the cache
    Refresh,
}

pub async fn handle(action: &EndpointCommands, config: &Config) -> anyhow::Result<()> {
    let cache = EndpointCache::from_config(&config.directory)?;

    match action {
        EndpointCommands::List => {
            let Some(cached) = cache.read() else {
                println!("No endpoint cache at {}", cache.path().display());
                println!("\nCreate one with:");
                println!("  bc-monitor endpoints refresh");
                return Ok(());
            };

            let age = cached.age(unix_now());
            println!(
                "RPC ENDPOINTS ({} cached {:.0}s ago, max age {}s)\n",
                cached.endpoints.len(),
                age,
                config.directory.cache_max_age.as_secs()
            );
            print_by_chain(&cached.endpoints);
        }

        EndpointCommands::Refresh => {
            let endpoints = cache.refresh().await?;
            println!(
                "Fetched {} endpoints from {} into {}\n",
                endpoints.len(),
                cache.client().base_url(),
                cache.path().display()
            );
            print_by_chain(&endpoints);
        }
    }

    Ok(())
}

fn print_by_chain(endpoints: &[Endpoint]) {
    let mut by_chain: BTreeMap<&str, Vec<&Endpoint>> = BTreeMap::new();
    for ep in endpoints {
        by_chain.entry(ep.chain.as_str()).or_default().push(ep);
    }

    for (chain, eps) in by_chain {
        println!("{} ({}):", chain, eps[0].api_class);
        for ep in eps {
            let note = if ep.protocol().is_err() {
                " (unsupported api_class)"
            } else {
                ""
            };
            println!("  {}{}", ep.url, note);
        }
        println!();
    }
}
