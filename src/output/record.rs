//! Metric records and InfluxDB line protocol encoding

use crate::aggregate::ChainAggregate;
use crate::rpc::ProbeOutcome;
use std::collections::HashMap;
use std::fmt::{self, Write};
use std::time::{SystemTime, UNIX_EPOCH};

/// Measurement every record is written to
pub const MEASUREMENT: &str = "block_height_request";

/// `url` tag of the per-chain consensus record; sorts after real URLs
pub const MAX_HEIGHT_URL: &str = "zzz - Max over time";

/// Typed field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => write!(f, "{}i", v),
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Str(v) => {
                f.write_char('"')?;
                for c in v.chars() {
                    if c == '"' || c == '\\' {
                        f.write_char('\\')?;
                    }
                    f.write_char(c)?;
                }
                f.write_char('"')
            }
        }
    }
}

/// One point of the `block_height_request` measurement
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub chain: String,
    pub url: String,
    pub fields: Vec<(&'static str, FieldValue)>,
    /// Nanoseconds since the Unix epoch
    pub timestamp: i64,
}

impl MetricRecord {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn is_max_height(&self) -> bool {
        self.url == MAX_HEIGHT_URL
    }

    /// Encode as one line of InfluxDB line protocol
    pub fn to_line_protocol(&self) -> String {
        let mut line = String::with_capacity(128);
        line.push_str(&escape_key(MEASUREMENT, true));
        line.push_str(",chain=");
        line.push_str(&escape_key(&self.chain, false));
        line.push_str(",url=");
        line.push_str(&escape_key(&self.url, false));

        for (i, (name, value)) in self.fields.iter().enumerate() {
            line.push(if i == 0 { ' ' } else { ',' });
            line.push_str(&escape_key(name, false));
            line.push('=');
            let _ = write!(line, "{}", value);
        }

        let _ = write!(line, " {}", self.timestamp);
        line
    }
}

/// Escape a measurement, tag key/value or field key
fn escape_key(raw: &str, measurement: bool) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            ',' | ' ' => escaped.push('\\'),
            '=' if !measurement => escaped.push('\\'),
            _ => {}
        }
        escaped.push(c);
    }
    escaped
}

/// Current time in nanoseconds since the Unix epoch
pub fn timestamp_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Saturate instead of wrapping into negative values
fn int_field(value: u64) -> FieldValue {
    FieldValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Build one record per outcome plus one consensus record per aggregated chain
///
/// All records share `timestamp`. Endpoint records without an HTTP response
/// carry `http_code = 0`.
pub fn build_records(
    outcomes: &[ProbeOutcome],
    aggregates: &[ChainAggregate],
    timestamp: i64,
) -> Vec<MetricRecord> {
    let by_chain: HashMap<&str, &ChainAggregate> = aggregates
        .iter()
        .map(|agg| (agg.chain.as_str(), agg))
        .collect();

    let mut records = Vec::with_capacity(outcomes.len() + aggregates.len());

    for outcome in outcomes {
        let endpoint = &outcome.endpoint;
        let mut fields = vec![(
            "http_code",
            FieldValue::Int(outcome.http_status.map(i64::from).unwrap_or(0)),
        )];

        if let Some(height) = outcome.block_height {
            fields.push(("block_height", int_field(height)));
        }
        if let Some(diff) = by_chain
            .get(endpoint.chain.as_str())
            .and_then(|agg| agg.diff(&endpoint.url))
        {
            fields.push(("block_height_diff", int_field(diff)));
        }
        if let Some(latency) = outcome.latency_secs() {
            fields.push(("request_time_total", FieldValue::Float(latency)));
        }
        if let Some(error) = &outcome.error {
            fields.push(("error", FieldValue::Str(error.kind.to_string())));
            if let Some(code) = error.code {
                fields.push(("error_code", FieldValue::Int(code)));
            }
        }

        records.push(MetricRecord {
            chain: endpoint.chain.clone(),
            url: endpoint.url.clone(),
            fields,
            timestamp,
        });
    }

    for agg in aggregates {
        records.push(MetricRecord {
            chain: agg.chain.clone(),
            url: MAX_HEIGHT_URL.to_string(),
            fields: vec![("block_height", int_field(agg.max_height))],
            timestamp,
        });
    }

    records
}
