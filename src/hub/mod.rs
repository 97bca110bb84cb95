//! Voting hub access
//!
//! The hub hosts gas-free proposals and tallies token-weighted votes.
//! Herald reads proposals per space and state through the hub's GraphQL
//! endpoint and creates proposals through its signed-message endpoint.

pub mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{HubProposal, ProposalState, Result};

pub use client::HttpVotingHub;

/// Weighting strategy name attached to every ballot herald creates:
/// voting power is the balance of a designated token.
pub const WEIGHT_STRATEGY: &str = "token-balance-of";

/// A proposal to be created on the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalDraft {
    pub space: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub body: String,
    pub choices: Vec<String>,
    pub start: u64,
    pub end: u64,
    pub snapshot: u64,
    pub network: String,
    pub strategies: Vec<WeightStrategy>,
    pub app: String,
}

/// Voting-power strategy carried on a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightStrategy {
    pub name: String,
    pub params: StrategyParams,
}

/// Token whose balance weights the vote, and the chain it lives on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyParams {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(rename = "chainId")]
    pub chain_id: u64,
}

/// Read/write surface of the voting hub.
#[async_trait]
pub trait VotingHub: Send + Sync {
    /// Proposals in a space filtered by lifecycle state.
    async fn proposals(&self, space: &str, state: ProposalState) -> Result<Vec<HubProposal>>;

    /// Create a proposal. Returns the hub's receipt identifier.
    async fn create_proposal(&self, draft: &ProposalDraft) -> Result<String>;
}
