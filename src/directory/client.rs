//! Endpoint directory API client
//!
//! The directory lists chains at `{base}/all/chains` and each chain's API
//! class and RPC URLs at `{base}/chain_info?chain_name=<name>`.

use crate::config::Endpoint;
use crate::error::{DirectoryError, Error, Result};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// Chain info requests in flight during a refresh
const CHAIN_INFO_CONCURRENCY: usize = 4;

/// Entry of `/all/chains`
#[derive(Debug, Clone, Deserialize)]
pub struct ChainEntry {
    pub name: String,
}

/// Response of `/chain_info`
#[derive(Debug, Clone, Deserialize)]
pub struct ChainInfo {
    pub chain_name: String,
    pub api_class: String,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl ChainInfo {
    /// Flatten into one endpoint per URL
    ///
    /// A chain with a blank name yields nothing, since its records could
    /// not be tagged.
    pub fn endpoints(&self) -> impl Iterator<Item = Endpoint> + '_ {
        let chain = self.chain_name.trim();
        let urls: &[String] = if chain.is_empty() { &[] } else { &self.urls };
        urls.iter()
            .map(|url| url.trim())
            .filter(|url| !url.is_empty())
            .map(move |url| Endpoint::new(chain, url, &self.api_class))
    }
}

/// HTTP client for the endpoint directory
#[derive(Debug, Clone)]
pub struct DirectoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    /// Create a client for the directory at `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the directory answers the chain listing with 200
    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/all/chains", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(DirectoryError::from)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(DirectoryError::Status {
                url,
                status: response.status().as_u16(),
            }
            .into())
        }
    }

    /// List chain names
    pub async fn chains(&self) -> Result<Vec<String>> {
        let url = format!("{}/all/chains", self.base_url);
        let entries: Vec<ChainEntry> = self.get_json(&url, &[]).await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    /// Get API class and URLs for a chain
    pub async fn chain_info(&self, chain: &str) -> Result<ChainInfo> {
        let url = format!("{}/chain_info", self.base_url);
        self.get_json(&url, &[("chain_name", chain)]).await
    }

    /// Fetch the complete endpoint list
    ///
    /// Any failing chain fails the whole fetch, so a refresh never produces a
    /// partial directory.
    pub async fn fetch_endpoints(&self) -> Result<Vec<Endpoint>> {
        let chains = self.chains().await?;
        tracing::debug!("Directory lists {} chains", chains.len());

        let infos: Vec<ChainInfo> = stream::iter(chains)
            .map(|chain| async move { self.chain_info(&chain).await })
            .buffered(CHAIN_INFO_CONCURRENCY)
            .try_collect()
            .await?;

        for info in infos.iter().filter(|info| info.chain_name.trim().is_empty()) {
            tracing::warn!(
                "Skipping chain with blank name ({} URLs, api_class {:?})",
                info.urls.len(),
                info.api_class
            );
        }

        let endpoints: Vec<Endpoint> = infos.iter().flat_map(|info| info.endpoints()).collect();
        tracing::debug!(
            "Directory lists {} endpoints across {} chains",
            endpoints.len(),
            infos.len()
        );

        Ok(endpoints)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, &str)]) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(DirectoryError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.bytes().await.map_err(DirectoryError::from)?;
        serde_json::from_slice(&body).map_err(|e| {
            DirectoryError::Malformed {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_info_flatten() {
        let info: ChainInfo = serde_json::from_str(
            r#"{
                "chain_name": "polkadot",
                "api_class": "substrate",
                "urls": ["wss://rpc.polkadot.io", " ", "https://polkadot-rpc.dwellir.com "]
            }"#,
        )
        .unwrap();

        let endpoints: Vec<Endpoint> = info.endpoints().collect();
        assert_eq!(
            endpoints,
            vec![
                Endpoint::new("polkadot", "wss://rpc.polkadot.io", "substrate"),
                Endpoint::new("polkadot", "https://polkadot-rpc.dwellir.com", "substrate"),
            ]
        );
    }

    #[test]
    fn test_chain_info_blank_name() {
        let info: ChainInfo = serde_json::from_str(
            r#"{"chain_name": "  ", "api_class": "ethereum", "urls": ["https://a.example"]}"#,
        )
        .unwrap();
        assert_eq!(info.endpoints().count(), 0);
    }

    #[test]
    fn test_chain_info_without_urls() {
        let info: ChainInfo =
            serde_json::from_str(r#"{"chain_name": "empty", "api_class": "ethereum"}"#).unwrap();
        assert_eq!(info.endpoints().count(), 0);
    }

    #[test]
    fn test_base_url_normalized() {
        let client = DirectoryClient::new("http://dir.local:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://dir.local:5000");
    }
}
