//! Local endpoint directory cache
//!
//! The cache file holds `[endpoints, refresh_timestamp_seconds]` as JSON and is
//! replaced atomically (temp file + rename), so readers never observe a
//! half-written file.

use crate::config::{DirectoryConfig, Endpoint};
use crate::directory::DirectoryClient;
use crate::error::{DirectoryError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;

/// On-disk layout: a two-element JSON array
#[derive(Debug, Serialize, Deserialize)]
struct CacheFile(Vec<Endpoint>, f64);

/// Endpoints as last fetched from the directory
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEndpoints {
    pub endpoints: Vec<Endpoint>,
    /// Unix time of the refresh, in seconds
    pub refreshed_at: f64,
}

impl CachedEndpoints {
    /// Seconds since the refresh
    pub fn age(&self, now: f64) -> f64 {
        now - self.refreshed_at
    }
}

/// Directory cache with a maximum age
#[derive(Debug, Clone)]
pub struct EndpointCache {
    client: DirectoryClient,
    path: PathBuf,
    max_age: Duration,
}

impl EndpointCache {
    /// Create a cache backed by `path`
    pub fn new(client: DirectoryClient, path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            client,
            path: path.into(),
            max_age,
        }
    }

    /// Create a cache from directory settings
    pub fn from_config(config: &DirectoryConfig) -> Result<Self> {
        let client = DirectoryClient::new(&config.url, config.timeout)?;
        Ok(Self::new(client, &config.cache_path, config.cache_max_age))
    }

    /// Get the directory client
    pub fn client(&self) -> &DirectoryClient {
        &self.client
    }

    /// Get the cache file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load endpoints, refreshing from the directory when the cache is stale
    pub async fn load_endpoints(&self) -> Result<Vec<Endpoint>> {
        self.load_at(unix_now()).await
    }

    /// [`load_endpoints`](Self::load_endpoints) as of `now` (Unix seconds)
    pub async fn load_at(&self, now: f64) -> Result<Vec<Endpoint>> {
        let cached = self.read();

        if let Some(cache) = &cached {
            let age = cache.age(now);
            let max_age = self.max_age.as_secs_f64();
            if age <= max_age {
                tracing::info!(
                    "{} will be updated in: {:.1} seconds",
                    self.path.display(),
                    max_age - age
                );
                return Ok(cache.endpoints.clone());
            }
        }

        self.refresh_at(now, cached).await
    }

    /// Refresh from the directory regardless of cache age
    ///
    /// Unlike [`load_endpoints`](Self::load_endpoints), a failed fetch is an
    /// error here and the cache file is left untouched.
    pub async fn refresh(&self) -> Result<Vec<Endpoint>> {
        let endpoints = self.client.fetch_endpoints().await?;
        self.write(&endpoints, unix_now())?;
        Ok(endpoints)
    }

    async fn refresh_at(&self, now: f64, previous: Option<CachedEndpoints>) -> Result<Vec<Endpoint>> {
        tracing::info!("Updating endpoint cache from {}", self.client.base_url());

        match self.client.fetch_endpoints().await {
            Ok(endpoints) => {
                if let Err(e) = self.write(&endpoints, now) {
                    tracing::warn!(
                        "Failed to write endpoint cache {}: {}",
                        self.path.display(),
                        e
                    );
                }
                Ok(endpoints)
            }
            Err(e) => match previous {
                Some(cache) => {
                    tracing::warn!(
                        "Endpoint directory refresh failed, keeping {} cached endpoints from {:.0}s ago: {}",
                        cache.endpoints.len(),
                        cache.age(now),
                        e
                    );
                    Ok(cache.endpoints)
                }
                None => Err(DirectoryError::Unavailable(format!(
                    "no endpoint cache at {} and directory fetch failed: {}",
                    self.path.display(),
                    e
                ))
                .into()),
            },
        }
    }

    /// Read the cache file; missing or corrupt files count as no cache
    pub fn read(&self) -> Option<CachedEndpoints> {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Could not load values from {}: {}", self.path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<CacheFile>(&content) {
            Ok(CacheFile(endpoints, refreshed_at)) => Some(CachedEndpoints {
                endpoints,
                refreshed_at,
            }),
            Err(e) => {
                tracing::warn!("Ignoring corrupt cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    fn write(&self, endpoints: &[Endpoint], refreshed_at: f64) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir)?;
        serde_json::to_writer(tmp.as_file_mut(), &CacheFile(endpoints.to_vec(), refreshed_at))?;
        tmp.as_file_mut().flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        tracing::debug!(
            "Wrote {} endpoints to {}",
            endpoints.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Current Unix time in seconds
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
