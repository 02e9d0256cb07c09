//! JSON-RPC client for chain block queries
//!
//! Thin wrapper over an Ethereum-style JSON-RPC endpoint, exposing only
//! the block queries the divergence scan needs.

use crate::oracle::{Fingerprint, OracleFailure};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// RPC client configuration
#[derive(Debug, Clone)]
pub struct RpcConfig {
    /// RPC URL (e.g., "http://127.0.0.1:8545")
    pub url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl RpcConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Ethereum JSON-RPC client
pub struct EthRpcClient {
    client: Client,
    config: RpcConfig,
}

impl EthRpcClient {
    /// Create a new RPC client
    pub fn new(config: RpcConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client, config }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Make an RPC call
    async fn call(&self, method: &str, params: Value) -> Result<Value, OracleFailure> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let response = self
            .client
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleFailure::Transport(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleFailure::Transport(format!(
                "request failed with status: {}",
                status
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| OracleFailure::Malformed(format!("invalid JSON body: {}", e)))?;

        if let Some(error) = json.get("error") {
            if !error.is_null() {
                return Err(OracleFailure::Rpc(error.to_string()));
            }
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| OracleFailure::Malformed("response missing result".to_string()))
    }

    /// Get the current head height (`eth_blockNumber`)
    pub async fn block_number(&self) -> Result<u64, OracleFailure> {
        let result = self.call("eth_blockNumber", serde_json::json!([])).await?;
        let hex = result
            .as_str()
            .ok_or_else(|| OracleFailure::Malformed("eth_blockNumber not a string".to_string()))?;
        parse_hex_quantity(hex)
    }

    /// Get the canonical block hash at a height, or `None` if the node
    /// has no block there (`eth_getBlockByNumber` with a null result).
    pub async fn block_hash_by_number(
        &self,
        number: u64,
    ) -> Result<Option<Fingerprint>, OracleFailure> {
        let params = serde_json::json!([format!("0x{:x}", number), false]);
        let result = self.call("eth_getBlockByNumber", params).await?;
        parse_block_hash(&result)
    }
}

/// Parse a `0x`-prefixed hex quantity (e.g., an `eth_blockNumber` result)
pub fn parse_hex_quantity(hex: &str) -> Result<u64, OracleFailure> {
    let digits = hex
        .strip_prefix("0x")
        .ok_or_else(|| OracleFailure::Malformed(format!("quantity missing 0x prefix: {}", hex)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| OracleFailure::Malformed(format!("bad hex quantity {}: {}", hex, e)))
}

/// Extract and validate the `hash` field of an `eth_getBlockByNumber`
/// result. A null result means the block is not present.
pub fn parse_block_hash(result: &Value) -> Result<Option<Fingerprint>, OracleFailure> {
    if result.is_null() {
        return Ok(None);
    }

    let hash = result
        .get("hash")
        .and_then(|v| v.as_str())
        .ok_or_else(|| OracleFailure::Malformed("block object missing hash".to_string()))?;

    let digits = hash
        .strip_prefix("0x")
        .ok_or_else(|| OracleFailure::Malformed(format!("hash missing 0x prefix: {}", hash)))?;
    let bytes = hex::decode(digits)
        .map_err(|e| OracleFailure::Malformed(format!("hash is not hex: {}", e)))?;
    if bytes.len() != 32 {
        return Err(OracleFailure::Malformed(format!(
            "hash is {} bytes, expected 32: {}",
            bytes.len(),
            hash
        )));
    }

    Ok(Some(Fingerprint::from(hash)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0x4e3a3754410177e6937ef1f84bba68ea139e8d1a2258c5f85db9f1cd715a1bdd";

    #[test]
    fn parses_block_hash_from_block_object() {
        let block = serde_json::json!({ "number": "0x10", "hash": HASH });
        let fp = parse_block_hash(&block).unwrap().unwrap();
        assert_eq!(fp.as_str(), HASH);
    }

    #[test]
    fn null_block_means_not_present() {
        assert_eq!(parse_block_hash(&Value::Null).unwrap(), None);
    }

    #[test]
    fn rejects_block_without_hash() {
        let block = serde_json::json!({ "number": "0x10" });
        assert!(matches!(
            parse_block_hash(&block),
            Err(OracleFailure::Malformed(_))
        ));
    }

    #[test]
    fn rejects_truncated_hash() {
        let block = serde_json::json!({ "hash": "0xdeadbeef" });
        assert!(matches!(
            parse_block_hash(&block),
            Err(OracleFailure::Malformed(_))
        ));
    }

    #[test]
    fn parses_hex_quantities() {
        assert_eq!(parse_hex_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_hex_quantity("0x1234abc").unwrap(), 0x1234abc);
        assert!(parse_hex_quantity("1234").is_err());
        assert!(parse_hex_quantity("0xzz").is_err());
    }
}
