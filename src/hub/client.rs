//! HTTP client for the voting hub
//!
//! Reads go to `{base}/graphql` as a plain `{query, variables}` POST.
//! Writes go to `{base}/messages` wrapped in an envelope signed with the
//! relay credential: `{signer, signature, payload}`, where the signature
//! covers the canonical JSON bytes of the payload. The hub checks the
//! signer against the space's allowed authors; herald only has to sign
//! deterministically.

use std::time::Duration;

use ed25519_dalek::{Signer, SigningKey};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{ProposalDraft, VotingHub};
use crate::types::{HeraldError, HubProposal, ProposalState, Result};

const PROPOSALS_QUERY: &str = r#"
query Proposals($space: String!, $state: String!) {
  proposals(where: { space: $space, state: $state }) {
    id title body choices start end snapshot scores scores_total
  }
}"#;

pub struct HttpVotingHub {
    http: reqwest::Client,
    base_url: String,
    signer: Option<SigningKey>,
}

impl HttpVotingHub {
    /// `relay_key` is the 32-byte hex seed of the hub signing credential;
    /// it is only required for writes.
    pub fn new(base_url: &str, relay_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let signer = relay_key.map(parse_signing_key).transpose()?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("herald/0.1")
            .build()
            .unwrap_or_default();
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            signer,
        })
    }
}

#[async_trait::async_trait]
impl VotingHub for HttpVotingHub {
    async fn proposals(&self, space: &str, state: ProposalState) -> Result<Vec<HubProposal>> {
        let body = json!({
            "query": PROPOSALS_QUERY,
            "variables": {"space": space, "state": state.as_str()},
        });
        let response = self
            .http
            .post(format!("{}/graphql", self.base_url))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HeraldError::Hub(format!(
                "proposal query returned HTTP {}",
                status
            )));
        }

        let envelope: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| HeraldError::Hub(format!("proposal query returned malformed JSON: {}", e)))?;
        if let Some(error) = envelope.errors.first() {
            return Err(HeraldError::Hub(format!(
                "proposal query failed: {}",
                error.message
            )));
        }
        let proposals = envelope.data.map(|d| d.proposals).unwrap_or_default();
        debug!(space = space, state = state.as_str(), count = proposals.len(), "Fetched proposals");
        Ok(proposals)
    }

    async fn create_proposal(&self, draft: &ProposalDraft) -> Result<String> {
        let key = self.signer.as_ref().ok_or_else(|| {
            HeraldError::Config("a relay key is required to create hub proposals".to_string())
        })?;

        // serde_json's default map is ordered, so these bytes are the
        // canonical form both sides sign and verify.
        let payload = serde_json::to_value(draft)?;
        let canonical = serde_json::to_vec(&payload)?;
        let signature = key.sign(&canonical);

        let envelope = json!({
            "signer": hex::encode(key.verifying_key().to_bytes()),
            "signature": hex::encode(signature.to_bytes()),
            "payload": payload,
        });
        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .json(&envelope)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(HeraldError::Hub(format!(
                "proposal creation returned HTTP {}",
                status
            )));
        }

        let receipt: Receipt = response
            .json()
            .await
            .map_err(|e| HeraldError::Hub(format!("creation receipt is malformed: {}", e)))?;
        Ok(receipt.id)
    }
}

fn parse_signing_key(hex_seed: &str) -> Result<SigningKey> {
    let bytes = hex::decode(hex_seed.trim_start_matches("0x"))
        .map_err(|e| HeraldError::Config(format!("relay key is not valid hex: {}", e)))?;
    let seed: [u8; 32] = bytes
        .try_into()
        .map_err(|_| HeraldError::Config("relay key must be 32 bytes of hex".to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<ProposalsData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct ProposalsData {
    #[serde(default)]
    proposals: Vec<HubProposal>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Deserialize)]
struct Receipt {
    #[serde(default)]
    id: String,
}
