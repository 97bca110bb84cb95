//! Governor chain access
//!
//! Everything herald needs from the chain goes through the
//! `GovernorClient` trait: head block, block timestamps, the
//! proposal-creation event log, the voting deadline, gas estimation and
//! submission. The HTTP implementation speaks JSON-RPC; stages only see
//! the trait, which keeps them runnable against in-memory fakes.

pub mod abi;
pub mod governor;
pub mod rpc;

use async_trait::async_trait;

use crate::types::{Result, ValidatedCall};
use abi::Uint256;

pub use governor::HttpGovernor;
pub use rpc::JsonRpcClient;

/// Number and timestamp of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub timestamp: u64,
}

/// A decoded proposal-creation event from the governor's log.
#[derive(Debug, Clone, PartialEq)]
pub struct ProposalCreatedEvent {
    pub id: Uint256,
    pub start_block: u64,
    pub end_block: u64,
    pub description: String,
}

/// Read/write surface of the governor contract and its chain.
///
/// Reads are side-effect-free. The two writes (`submit_proposal` and,
/// indirectly, vote relay via the safe) are the only on-chain mutations
/// herald ever performs.
#[async_trait]
pub trait GovernorClient: Send + Sync {
    /// Current head block with its timestamp.
    async fn head(&self) -> Result<BlockInfo>;

    /// Timestamp of a specific block. Errors if the block does not exist
    /// (including blocks that have not been mined yet).
    async fn block_timestamp(&self, number: u64) -> Result<u64>;

    /// Proposal-creation events in the inclusive block range.
    async fn proposal_created(&self, from_block: u64, to_block: u64)
        -> Result<Vec<ProposalCreatedEvent>>;

    /// Unix timestamp at which on-chain voting for a proposal closes.
    async fn voting_end(&self, proposal_id: &Uint256) -> Result<u64>;

    /// Gas estimate for submitting the call as a new proposal.
    async fn estimate_propose_gas(&self, call: &ValidatedCall) -> Result<u64>;

    /// Submit the call as a new proposal. Returns the transaction hash.
    async fn submit_proposal(&self, call: &ValidatedCall) -> Result<String>;
}
