//! InfluxDB v2 sink

use crate::config::InfluxConfig;
use crate::error::{Error, Result, SinkError};
use crate::output::{MetricRecord, MetricsSink};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Writes records through the InfluxDB v2 HTTP API
#[derive(Debug, Clone)]
pub struct InfluxSink {
    client: reqwest::Client,
    url: String,
    org: String,
    bucket: String,
}

impl InfluxSink {
    pub fn new(config: &InfluxConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Token {}", config.token))
            .map_err(|_| SinkError::Unavailable("token is not a valid header value".to_string()))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(WRITE_TIMEOUT)
            .build()
            .map_err(|e| Error::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl MetricsSink for InfluxSink {
    async fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(format!("{}: {}", url, e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(SinkError::Unavailable(format!("{} returned HTTP {}", url, response.status())).into())
        }
    }

    async fn write(&self, records: &[MetricRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let body = records
            .iter()
            .map(MetricRecord::to_line_protocol)
            .collect::<Vec<_>>()
            .join("\n");

        let response = self
            .client
            .post(format!("{}/api/v2/write", self.url))
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ns"),
            ])
            .body(body)
            .send()
            .await
            .map_err(SinkError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::WriteRejected {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        tracing::debug!("Wrote {} records to {}", records.len(), self.url);
        Ok(())
    }
}
