//! Relay stage: closed ballot outcomes become on-chain votes
//!
//! For each closed ballot the winning choice is cast as a vote on the
//! corresponding governor proposal, through the multi-signature service
//! that custodies the voting credential. Voting after the on-chain
//! window closes is rejected here, not just logged: the governor would
//! refuse it anyway, and the attempt would burn a transaction and a
//! round of safe approvals.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Outcome, StageProcessor};
use crate::chain::abi::{self, Address, Uint256};
use crate::chain::GovernorClient;
use crate::hub::VotingHub;
use crate::safe::SafeExecutor;
use crate::types::{HubProposal, ProposalState, Result, VoteTally};

#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Space whose closed ballots are relayed.
    pub space: String,
    /// Governor the votes are cast on.
    pub governor: Address,
}

pub struct RelayStage {
    hub: Arc<dyn VotingHub>,
    governor: Arc<dyn GovernorClient>,
    safe: Arc<dyn SafeExecutor>,
    config: RelayConfig,
}

impl RelayStage {
    pub fn new(
        hub: Arc<dyn VotingHub>,
        governor: Arc<dyn GovernorClient>,
        safe: Arc<dyn SafeExecutor>,
        config: RelayConfig,
    ) -> Self {
        Self {
            hub,
            governor,
            safe,
            config,
        }
    }
}

/// Pick the vote support value from a tally. The winning choice index
/// doubles as the governor's support encoding, so it has to fit a u8.
pub fn pick_support(tally: &VoteTally) -> std::result::Result<u8, String> {
    if tally.is_empty() {
        return Err("no votes cast".to_string());
    }
    if let Err(reason) = tally.check_consistency() {
        return Err(reason);
    }
    let choice = tally
        .winning_choice()
        .ok_or_else(|| "no votes cast".to_string())?;
    u8::try_from(choice).map_err(|_| format!("winning choice index {} exceeds u8", choice))
}

#[async_trait]
impl StageProcessor for RelayStage {
    type Item = HubProposal;

    fn name(&self) -> &'static str {
        "relay"
    }

    fn item_id(&self, item: &Self::Item) -> String {
        item.id.clone()
    }

    async fn fetch(&self) -> Result<Vec<Self::Item>> {
        self.hub
            .proposals(&self.config.space, ProposalState::Closed)
            .await
    }

    async fn process(&self, ballot: &Self::Item) -> Result<Outcome> {
        let support = match pick_support(&ballot.tally()) {
            Ok(support) => support,
            Err(reason) => return Ok(Outcome::Skipped(reason)),
        };

        let proposal_id = match Uint256::parse(&ballot.id) {
            Ok(id) => id,
            Err(e) => {
                return Ok(Outcome::Skipped(format!(
                    "ballot id is not a proposal id: {}",
                    e
                )))
            }
        };

        let now = self.governor.head().await?.timestamp;
        let end = self.governor.voting_end(&proposal_id).await?;
        if now >= end {
            return Ok(Outcome::Skipped(format!(
                "on-chain voting closed at {} (now {})",
                end, now
            )));
        }

        let data = abi::encode_cast_vote(&proposal_id, support);
        let tx = self
            .safe
            .create_transaction(&self.config.governor, &data, &Uint256::ZERO)
            .await?;
        let hash = self.safe.execute(&tx).await?;
        info!(proposal = %proposal_id, support = support, tx = %hash, "Vote relayed through the safe");
        Ok(Outcome::Acted)
    }
}
