//! Per-chain consensus height and drift

use crate::rpc::ProbeOutcome;
use std::collections::BTreeMap;

/// Consensus view of one chain for one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainAggregate {
    pub chain: String,
    /// Highest height any endpoint of the chain reported
    pub max_height: u64,
    /// Blocks each successful endpoint trails `max_height` by, keyed by URL
    pub diffs: BTreeMap<String, u64>,
}

impl ChainAggregate {
    pub fn diff(&self, url: &str) -> Option<u64> {
        self.diffs.get(url).copied()
    }
}

/// Compute consensus height and drift per chain
///
/// Only outcomes with a height take part. Chains where nothing succeeded are
/// omitted. Output is ordered by chain name and does not depend on the order
/// outcomes arrived in.
pub fn aggregate(outcomes: &[ProbeOutcome]) -> Vec<ChainAggregate> {
    let mut heights: BTreeMap<&str, BTreeMap<&str, u64>> = BTreeMap::new();

    for outcome in outcomes {
        if let Some(height) = outcome.block_height {
            heights
                .entry(outcome.endpoint.chain.as_str())
                .or_default()
                .insert(outcome.endpoint.url.as_str(), height);
        }
    }

    heights
        .into_iter()
        .filter_map(|(chain, by_url)| {
            let max_height = by_url.values().copied().max()?;
            let diffs = by_url
                .into_iter()
                .map(|(url, height)| (url.to_string(), max_height - height))
                .collect();

            Some(ChainAggregate {
                chain: chain.to_string(),
                max_height,
                diffs,
            })
        })
        .collect()
}
