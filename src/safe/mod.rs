//! Multi-signature execution service client
//!
//! The relay credential is collectively custodied, so vote transactions
//! are not signed here: herald creates a transaction on the safe service
//! and asks it to execute, and the service's own approval flow takes it
//! from there. Create-then-execute, never a direct signed send.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::chain::abi::{encode_hex, Address, Uint256};
use crate::types::{HeraldError, Result};

/// Handle for a transaction queued on the safe service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTx {
    pub id: String,
}

/// Write surface of the multi-signature execution service.
#[async_trait]
pub trait SafeExecutor: Send + Sync {
    /// Queue a transaction on the safe. No chain effect yet.
    async fn create_transaction(
        &self,
        to: &Address,
        data: &[u8],
        value: &Uint256,
    ) -> Result<SafeTx>;

    /// Execute a queued transaction. Returns the chain transaction hash.
    async fn execute(&self, tx: &SafeTx) -> Result<String>;
}

pub struct HttpSafeExecutor {
    http: reqwest::Client,
    base_url: String,
    safe_address: Address,
    api_token: Option<String>,
}

impl HttpSafeExecutor {
    pub fn new(
        base_url: &str,
        safe_address: Address,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("herald/0.1")
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            safe_address,
            api_token,
        }
    }

    fn transactions_url(&self) -> String {
        format!(
            "{}/api/v1/safes/{}/transactions",
            self.base_url, self.safe_address
        )
    }

    async fn post(&self, url: String, body: serde_json::Value) -> Result<reqwest::Response> {
        let mut request = self.http.post(url).json(&body);
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HeraldError::Safe(format!(
                "safe service returned HTTP {}",
                status
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl SafeExecutor for HttpSafeExecutor {
    async fn create_transaction(
        &self,
        to: &Address,
        data: &[u8],
        value: &Uint256,
    ) -> Result<SafeTx> {
        let body = json!({
            "to": to.to_string(),
            "value": value.to_string(),
            "data": encode_hex(data),
        });
        let response = self.post(self.transactions_url(), body).await?;
        let created: CreatedTx = response
            .json()
            .await
            .map_err(|e| HeraldError::Safe(format!("create response is malformed: {}", e)))?;
        debug!(tx = %created.id, "Safe transaction created");
        Ok(SafeTx { id: created.id })
    }

    async fn execute(&self, tx: &SafeTx) -> Result<String> {
        let url = format!("{}/{}/execute", self.transactions_url(), tx.id);
        let response = self.post(url, json!({})).await?;
        let executed: ExecutedTx = response
            .json()
            .await
            .map_err(|e| HeraldError::Safe(format!("execute response is malformed: {}", e)))?;
        Ok(executed.tx_hash)
    }
}

#[derive(Deserialize)]
struct CreatedTx {
    id: String,
}

#[derive(Deserialize)]
struct ExecutedTx {
    #[serde(rename = "txHash")]
    tx_hash: String,
}
