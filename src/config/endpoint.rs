//! Monitored RPC endpoint

use crate::error::ProtocolError;
use crate::rpc::ApiClass;
use serde::{Deserialize, Serialize};

/// One RPC/WebSocket service to probe
///
/// Identity is `(chain, url)`. The API class is kept as the directory
/// delivered it and resolved when a probe is built, so an unknown class shows
/// up as an `InvalidApiClass` outcome instead of vanishing from the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// Chain name, e.g. "ethereum-mainnet"
    pub chain: String,
    /// RPC URL (http, https, ws or wss)
    pub url: String,
    /// API class name from the directory
    pub api_class: String,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(
        chain: impl Into<String>,
        url: impl Into<String>,
        api_class: impl Into<String>,
    ) -> Self {
        Self {
            chain: chain.into(),
            url: url.into(),
            api_class: api_class.into(),
        }
    }

    /// Resolve the API class
    pub fn protocol(&self) -> Result<ApiClass, ProtocolError> {
        self.api_class.parse()
    }

    /// Whether the URL selects the WebSocket transport
    pub fn is_websocket(&self) -> bool {
        let url = self.url.trim_start().to_ascii_lowercase();
        url.starts_with("ws://") || url.starts_with("wss://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_protocol() {
        let endpoint = Endpoint::new("eth", "https://rpc.example.com", "ethereum");
        assert_eq!(endpoint.protocol().unwrap(), ApiClass::Ethereum);
        assert!(!endpoint.is_websocket());

        let endpoint = Endpoint::new("dot", "wss://rpc.polkadot.io", "substrate");
        assert_eq!(endpoint.protocol().unwrap(), ApiClass::Substrate);
        assert!(endpoint.is_websocket());

        let endpoint = Endpoint::new("sol", "https://api.mainnet-beta.solana.com", "solana");
        assert!(matches!(
            endpoint.protocol(),
            Err(ProtocolError::InvalidApiClass(_))
        ));
    }

    #[test]
    fn test_endpoint_serde() {
        let endpoint = Endpoint::new("eth", "https://rpc.example.com", "ethereum");
        let json = serde_json::to_string(&endpoint).unwrap();
        assert_eq!(
            json,
            r#"{"chain":"eth","url":"https://rpc.example.com","api_class":"ethereum"}"#
        );
        let back: Endpoint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, endpoint);
    }
}
