//! Minimal JSON-RPC 2.0 client
//!
//! One POST per call, request ids from an atomic counter, errors mapped
//! into `HeraldError::Rpc`. Signer-capable endpoints can require a bearer
//! token; everything else about transport stays inside reqwest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::types::{HeraldError, Result};

pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    auth_token: Option<String>,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: &str, auth_token: Option<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("herald/0.1")
            .build()
            .unwrap_or_default();
        Self {
            http,
            url: url.to_string(),
            auth_token,
            next_id: AtomicU64::new(1),
        }
    }

    /// Perform one JSON-RPC call and deserialize its result.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let mut request = self.http.post(&self.url).json(&body);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HeraldError::Rpc(format!(
                "{} failed: endpoint returned HTTP {}",
                method, status
            )));
        }

        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| HeraldError::Rpc(format!("{} returned malformed JSON: {}", method, e)))?;
        if let Some(error) = envelope.error {
            return Err(HeraldError::Rpc(format!(
                "{} failed: {} (code {})",
                method, error.message, error.code
            )));
        }
        envelope
            .result
            .ok_or_else(|| HeraldError::Rpc(format!("{} returned no result", method)))
    }
}

#[derive(Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

/// Format a block number or gas amount as an RPC quantity.
pub fn to_quantity(value: u64) -> String {
    format!("{:#x}", value)
}

/// Parse an RPC quantity ("0x10") into a u64.
pub fn from_quantity(text: &str) -> Result<u64> {
    let digits = text
        .strip_prefix("0x")
        .ok_or_else(|| HeraldError::Rpc(format!("expected 0x quantity, got: {}", text)))?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| HeraldError::Rpc(format!("bad quantity {}: {}", text, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client(server: &MockServer) -> JsonRpcClient {
        JsonRpcClient::new(&server.base_url(), None, Duration::from_secs(5))
    }

    #[test]
    fn test_quantity_round_trip() {
        assert_eq!(to_quantity(0), "0x0");
        assert_eq!(to_quantity(120), "0x78");
        assert_eq!(from_quantity("0x78").unwrap(), 120);
        assert!(from_quantity("78").is_err());
        assert!(from_quantity("0xgg").is_err());
    }

    #[tokio::test]
    async fn test_call_parses_result() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("eth_blockNumber");
                then.status(200)
                    .json_body(serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": "0x10"}));
            })
            .await;

        let head: String = client(&server)
            .call("eth_blockNumber", json!([]))
            .await
            .unwrap();
        assert_eq!(head, "0x10");
    }

    #[tokio::test]
    async fn test_call_surfaces_rpc_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": {"code": -32000, "message": "execution reverted"}
                }));
            })
            .await;

        let err = client(&server)
            .call::<String>("eth_estimateGas", json!([]))
            .await
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("execution reverted"), "got: {}", text);
        assert!(text.contains("-32000"), "got: {}", text);
    }

    #[tokio::test]
    async fn test_call_surfaces_http_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/");
                then.status(502);
            })
            .await;

        let err = client(&server)
            .call::<String>("eth_blockNumber", json!([]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("502"), "got: {}", err);
    }
}
