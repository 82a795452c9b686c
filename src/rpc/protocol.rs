//! JSON-RPC request construction and block height extraction per API class
//!
//! Every supported chain API is one row in a static table: the method that
//! returns the chain head, and where the height lives in the response.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

/// Chain API family an endpoint speaks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiClass {
    Ethereum,
    Substrate,
    Starknet,
}

/// How the height is encoded inside `result`
#[derive(Debug, Clone, Copy)]
enum HeightFormat {
    /// `"0x..."` string
    Hex,
    /// Plain JSON number
    Decimal,
}

/// Largest height accepted from an endpoint
pub const MAX_HEIGHT: u64 = i64::MAX as u64;

/// One row of the protocol table
#[derive(Debug, Clone, Copy)]
struct ProtocolEntry {
    method: &'static str,
    /// Keys to walk below `result`
    path: &'static [&'static str],
    format: HeightFormat,
}

const ETHEREUM: ProtocolEntry = ProtocolEntry {
    method: "eth_blockNumber",
    path: &[],
    format: HeightFormat::Hex,
};

const SUBSTRATE: ProtocolEntry = ProtocolEntry {
    method: "chain_getHeader",
    path: &["number"],
    format: HeightFormat::Hex,
};

const STARKNET: ProtocolEntry = ProtocolEntry {
    method: "starknet_blockNumber",
    path: &[],
    format: HeightFormat::Decimal,
};

/// A ready-to-send JSON-RPC request
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub method: &'static str,
    pub body: Value,
}

impl RpcRequest {
    /// Serialized body for the wire
    pub fn to_json(&self) -> String {
        self.body.to_string()
    }
}

impl ApiClass {
    /// All supported API classes
    pub const ALL: [ApiClass; 3] = [ApiClass::Ethereum, ApiClass::Substrate, ApiClass::Starknet];

    const fn entry(self) -> &'static ProtocolEntry {
        match self {
            ApiClass::Ethereum => &ETHEREUM,
            ApiClass::Substrate => &SUBSTRATE,
            ApiClass::Starknet => &STARKNET,
        }
    }

    /// Name as used by the endpoint directory
    pub fn as_str(self) -> &'static str {
        match self {
            ApiClass::Ethereum => "ethereum",
            ApiClass::Substrate => "substrate",
            ApiClass::Starknet => "starknet",
        }
    }

    /// JSON-RPC method returning the chain head
    pub fn method(self) -> &'static str {
        self.entry().method
    }

    /// Build the block height request
    pub fn build_request(self) -> RpcRequest {
        RpcRequest {
            method: self.method(),
            body: json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": self.method(),
                "params": [],
            }),
        }
    }

    /// Extract the block height from a decoded JSON-RPC response
    ///
    /// A response without a `result` key is an RPC error and is rejected before
    /// any height parsing takes place.
    pub fn extract_height(self, response: &Value) -> Result<u64, ProtocolError> {
        let result = validate_response(response)?;
        let entry = self.entry();

        let mut value = result;
        for key in entry.path {
            value = value.get(key).ok_or_else(|| {
                ProtocolError::Malformed(format!("missing result.{} for {}", key, self))
            })?;
        }

        let height = match entry.format {
            HeightFormat::Hex => parse_hex_height(value)?,
            HeightFormat::Decimal => parse_decimal_height(value)?,
        };

        // Heights are stored as signed 64-bit integers
        if height > MAX_HEIGHT {
            return Err(ProtocolError::Malformed(format!(
                "height {} out of range for {}",
                height, self
            )));
        }
        Ok(height)
    }
}

impl fmt::Display for ApiClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiClass {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" => Ok(ApiClass::Ethereum),
            "substrate" => Ok(ApiClass::Substrate),
            "starknet" => Ok(ApiClass::Starknet),
            other => Err(ProtocolError::InvalidApiClass(other.to_string())),
        }
    }
}

/// Return the `result` member, or the RPC error the endpoint reported
fn validate_response(response: &Value) -> Result<&Value, ProtocolError> {
    let object = response
        .as_object()
        .ok_or_else(|| ProtocolError::Malformed(format!("expected JSON object, got {}", response)))?;

    if let Some(result) = object.get("result") {
        return Ok(result);
    }

    match object.get("error") {
        Some(error) => Err(ProtocolError::Rpc {
            code: error.get("code").and_then(Value::as_i64),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| error.to_string()),
        }),
        None => Err(ProtocolError::Rpc {
            code: None,
            message: "response has no result".to_string(),
        }),
    }
}

fn parse_hex_height(value: &Value) -> Result<u64, ProtocolError> {
    let s = value
        .as_str()
        .ok_or_else(|| ProtocolError::Malformed(format!("expected hex string, got {}", value)))?;
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);

    u64::from_str_radix(digits, 16)
        .map_err(|e| ProtocolError::Malformed(format!("invalid hex height {:?}: {}", s, e)))
}

fn parse_decimal_height(value: &Value) -> Result<u64, ProtocolError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| ProtocolError::Malformed(format!("height out of range: {}", n))),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|e| ProtocolError::Malformed(format!("invalid height {:?}: {}", s, e))),
        other => Err(ProtocolError::Malformed(format!(
            "expected numeric height, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_methods() {
        assert_eq!(ApiClass::Ethereum.method(), "eth_blockNumber");
        assert_eq!(ApiClass::Substrate.method(), "chain_getHeader");
        assert_eq!(ApiClass::Starknet.method(), "starknet_blockNumber");
    }

    #[test]
    fn test_build_request() {
        let request = ApiClass::Substrate.build_request();
        assert_eq!(request.method, "chain_getHeader");
        assert_eq!(request.body["jsonrpc"], "2.0");
        assert_eq!(request.body["id"], 1);
        assert_eq!(request.body["method"], "chain_getHeader");
        assert_eq!(request.body["params"], json!([]));
    }

    #[test]
    fn test_parse_api_class() {
        assert_eq!("ethereum".parse::<ApiClass>().unwrap(), ApiClass::Ethereum);
        assert_eq!("Substrate".parse::<ApiClass>().unwrap(), ApiClass::Substrate);
        assert_eq!(
            "solana".parse::<ApiClass>(),
            Err(ProtocolError::InvalidApiClass("solana".to_string()))
        );
    }

    #[test]
    fn test_extract_ethereum_height() {
        let response = json!({"jsonrpc": "2.0", "id": 1, "result": "0x12a05f2"});
        assert_eq!(ApiClass::Ethereum.extract_height(&response).unwrap(), 19_531_250);
    }

    #[test]
    fn test_extract_substrate_height() {
        let response = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"number": "0x1b4", "parentHash": "0xabc"}
        });
        assert_eq!(ApiClass::Substrate.extract_height(&response).unwrap(), 436);

        let flat = json!({"result": "0x1b4"});
        assert!(matches!(
            ApiClass::Substrate.extract_height(&flat),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_extract_starknet_height() {
        let response = json!({"jsonrpc": "2.0", "id": 1, "result": 654321});
        assert_eq!(ApiClass::Starknet.extract_height(&response).unwrap(), 654_321);
    }

    #[test]
    fn test_error_object_is_rpc_error() {
        let response = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32004, "message": "daily request limit reached"}
        });

        for class in ApiClass::ALL {
            assert_eq!(
                class.extract_height(&response),
                Err(ProtocolError::Rpc {
                    code: Some(-32004),
                    message: "daily request limit reached".to_string()
                })
            );
        }
    }

    #[test]
    fn test_height_above_i64_is_malformed() {
        let response = json!({"result": "0xffffffffffffffff"});
        assert!(matches!(
            ApiClass::Ethereum.extract_height(&response),
            Err(ProtocolError::Malformed(_))
        ));

        let response = json!({"result": u64::MAX});
        assert!(matches!(
            ApiClass::Starknet.extract_height(&response),
            Err(ProtocolError::Malformed(_))
        ));

        let response = json!({"result": "0x7fffffffffffffff"});
        assert_eq!(ApiClass::Ethereum.extract_height(&response).unwrap(), MAX_HEIGHT);
    }

    #[test]
    fn test_garbage_result_is_malformed() {
        let response = json!({"result": "latest"});
        assert!(matches!(
            ApiClass::Ethereum.extract_height(&response),
            Err(ProtocolError::Malformed(_))
        ));

        let response = json!({"result": null});
        assert!(matches!(
            ApiClass::Starknet.extract_height(&response),
            Err(ProtocolError::Malformed(_))
        ));

        let response = json!(["not", "an", "object"]);
        assert!(matches!(
            ApiClass::Ethereum.extract_height(&response),
            Err(ProtocolError::Malformed(_))
        ));
    }
}
