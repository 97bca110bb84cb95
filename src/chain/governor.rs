//! Governor contract client over JSON-RPC
//!
//! Submission goes through `eth_sendTransaction` against a
//! signer-capable endpoint (key-managing node or signing proxy), so raw
//! key material never enters this process. The optional submitter
//! address is the account that endpoint signs for.

use serde::Deserialize;
use serde_json::{json, Value};

use tracing::warn;

use super::abi::{self, Address, Uint256};
use super::rpc::{from_quantity, to_quantity, JsonRpcClient};
use super::{BlockInfo, GovernorClient, ProposalCreatedEvent};
use crate::types::{HeraldError, Result, ValidatedCall};

pub struct HttpGovernor {
    rpc: JsonRpcClient,
    governor: Address,
    submitter: Option<Address>,
}

impl HttpGovernor {
    pub fn new(rpc: JsonRpcClient, governor: Address, submitter: Option<Address>) -> Self {
        Self {
            rpc,
            governor,
            submitter,
        }
    }

    async fn block(&self, tag: &str) -> Result<Value> {
        self.rpc
            .call("eth_getBlockByNumber", json!([tag, false]))
            .await
    }
}

#[async_trait::async_trait]
impl GovernorClient for HttpGovernor {
    async fn head(&self) -> Result<BlockInfo> {
        let block = self.block("latest").await?;
        parse_block(&block)
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64> {
        let block = self.block(&to_quantity(number)).await?;
        if block.is_null() {
            return Err(HeraldError::Rpc(format!(
                "block {} is not available yet",
                number
            )));
        }
        Ok(parse_block(&block)?.timestamp)
    }

    async fn proposal_created(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ProposalCreatedEvent>> {
        let filter = json!({
            "fromBlock": to_quantity(from_block),
            "toBlock": to_quantity(to_block),
            "address": self.governor.to_string(),
            "topics": [abi::PROPOSAL_CREATED_TOPIC],
        });
        let logs: Vec<LogEntry> = self.rpc.call("eth_getLogs", json!([filter])).await?;

        // An undecodable log is dropped with a warning instead of failing
        // the whole scan; the window will not revisit it, but neither
        // would retrying decode it any better.
        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match abi::decode_hex(&log.data).and_then(|d| abi::decode_proposal_created(&d)) {
                Ok(event) => events.push(event),
                Err(e) => warn!(error = %e, "Skipping undecodable ProposalCreated log"),
            }
        }
        Ok(events)
    }

    async fn voting_end(&self, proposal_id: &Uint256) -> Result<u64> {
        let data = abi::encode_proposal_deadline(proposal_id);
        let call = json!({
            "to": self.governor.to_string(),
            "data": abi::encode_hex(&data),
        });
        let output: String = self.rpc.call("eth_call", json!([call, "latest"])).await?;
        let bytes = abi::decode_hex(&output)?;
        let word = abi::decode_uint_output(&bytes)?;
        word.to_u128()
            .filter(|v| *v <= u64::MAX as u128)
            .map(|v| v as u64)
            .ok_or_else(|| HeraldError::Rpc("voting deadline does not fit in u64".to_string()))
    }

    async fn estimate_propose_gas(&self, call: &ValidatedCall) -> Result<u64> {
        let mut tx = json!({
            "to": self.governor.to_string(),
            "data": abi::encode_hex(&abi::encode_propose(call)),
        });
        if let Some(from) = &self.submitter {
            tx["from"] = json!(from.to_string());
        }
        let estimate: String = self.rpc.call("eth_estimateGas", json!([tx])).await?;
        from_quantity(&estimate)
    }

    async fn submit_proposal(&self, call: &ValidatedCall) -> Result<String> {
        let from = self.submitter.ok_or_else(|| {
            HeraldError::Config("a submitter address is required to send transactions".to_string())
        })?;
        let tx = json!({
            "from": from.to_string(),
            "to": self.governor.to_string(),
            "data": abi::encode_hex(&abi::encode_propose(call)),
        });
        let hash: String = self.rpc.call("eth_sendTransaction", json!([tx])).await?;
        Ok(hash)
    }
}

#[derive(Deserialize)]
struct LogEntry {
    data: String,
}

fn parse_block(block: &Value) -> Result<BlockInfo> {
    let number = block
        .get("number")
        .and_then(Value::as_str)
        .ok_or_else(|| HeraldError::Rpc("block has no number".to_string()))?;
    let timestamp = block
        .get("timestamp")
        .and_then(Value::as_str)
        .ok_or_else(|| HeraldError::Rpc("block has no timestamp".to_string()))?;
    Ok(BlockInfo {
        number: from_quantity(number)?,
        timestamp: from_quantity(timestamp)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn governor(server: &MockServer) -> HttpGovernor {
        HttpGovernor::new(
            JsonRpcClient::new(&server.base_url(), None, Duration::from_secs(5)),
            Address::parse("0x5d2c31ce16924c2a71d317e5bbfd5ce387854039").unwrap(),
            Some(Address::parse("0x00000000000000000000000000000000000000aa").unwrap()),
        )
    }

    #[tokio::test]
    async fn test_head_parses_number_and_timestamp() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("eth_getBlockByNumber");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": {"number": "0x78", "timestamp": "0x64000000"}
                }));
            })
            .await;

        let head = governor(&server).head().await.unwrap();
        assert_eq!(head.number, 0x78);
        assert_eq!(head.timestamp, 0x6400_0000);
    }

    #[tokio::test]
    async fn test_missing_block_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("eth_getBlockByNumber");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": null
                }));
            })
            .await;

        let err = governor(&server).block_timestamp(9999).await.unwrap_err();
        assert!(err.to_string().contains("not available"), "got: {}", err);
    }

    #[tokio::test]
    async fn test_proposal_created_decodes_and_skips_bad_logs() {
        // One well-formed event payload and one truncated one.
        let mut data = Vec::new();
        data.extend(Uint256::from_u64(42).to_be_bytes()); // id
        data.extend([0u8; 32]); // proposer
        for _ in 0..4 {
            data.extend([0u8; 32]);
        }
        data.extend(Uint256::from_u64(100).to_be_bytes()); // startBlock
        data.extend(Uint256::from_u64(200).to_be_bytes()); // endBlock
        data.extend(Uint256::from_u64(9 * 32).to_be_bytes()); // description offset
        data.extend(Uint256::from_u64(2).to_be_bytes());
        data.extend_from_slice(b"ok");
        data.extend([0u8; 30]);

        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("eth_getLogs");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": [
                        {"data": abi::encode_hex(&data)},
                        {"data": "0xdead"}
                    ]
                }));
            })
            .await;

        let events = governor(&server).proposal_created(0, 120).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, Uint256::from_u64(42));
        assert_eq!(events[0].description, "ok");
    }

    #[tokio::test]
    async fn test_voting_end_decodes_call_output() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("eth_call");
                then.status(200).json_body(serde_json::json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "result": abi::encode_hex(&Uint256::from_u64(1_700_000_000).to_be_bytes())
                }));
            })
            .await;

        let end = governor(&server)
            .voting_end(&Uint256::from_u64(1))
            .await
            .unwrap();
        assert_eq!(end, 1_700_000_000);
    }
}
