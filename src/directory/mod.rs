//! Endpoint directory: remote listing plus local cache

pub mod cache;
pub mod client;

pub use cache::{unix_now, CachedEndpoints, EndpointCache};
pub use client::{ChainEntry, ChainInfo, DirectoryClient};
