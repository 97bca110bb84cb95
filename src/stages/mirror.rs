//! Mirror stage: new on-chain proposals become off-chain ballots
//!
//! Scans a bounded window of recent blocks for proposal-creation events
//! and opens a single-choice ballot on the hub for each one, anchored to
//! the same snapshot block so off-chain voting power reflects the
//! holdings the chain will care about.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Outcome, StageProcessor};
use crate::chain::{GovernorClient, ProposalCreatedEvent};
use crate::hub::{ProposalDraft, VotingHub, WeightStrategy};
use crate::types::Result;

/// Ballot choices for mirrored proposals.
pub const BALLOT_CHOICES: [&str; 3] = ["For", "Against", "Abstain"];

/// Off-chain voting closes this long before the on-chain deadline, so
/// the relay stage has a full day to land the vote before the chain
/// stops accepting it.
pub const BALLOT_CLOSE_MARGIN_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Hub space receiving the ballots.
    pub space: String,
    /// Network identifier the hub files the ballot under.
    pub network: String,
    /// Blocks scanned per run, ending at the chain head.
    pub block_range: u64,
    /// Voting-power strategy attached to every ballot.
    pub strategy: WeightStrategy,
}

pub struct MirrorStage {
    governor: Arc<dyn GovernorClient>,
    hub: Arc<dyn VotingHub>,
    config: MirrorConfig,
}

impl MirrorStage {
    pub fn new(
        governor: Arc<dyn GovernorClient>,
        hub: Arc<dyn VotingHub>,
        config: MirrorConfig,
    ) -> Self {
        Self {
            governor,
            hub,
            config,
        }
    }
}

/// Off-chain voting window derived from the on-chain one.
pub fn ballot_window(start_ts: u64, end_ts: u64) -> (u64, u64) {
    (start_ts, end_ts.saturating_sub(BALLOT_CLOSE_MARGIN_SECS))
}

#[async_trait]
impl StageProcessor for MirrorStage {
    type Item = ProposalCreatedEvent;

    fn name(&self) -> &'static str {
        "mirror"
    }

    fn item_id(&self, item: &Self::Item) -> String {
        item.id.to_string()
    }

    async fn fetch(&self) -> Result<Vec<Self::Item>> {
        let head = self.governor.head().await?;
        let from = head.number.saturating_sub(self.config.block_range);
        debug!(from_block = from, to_block = head.number, "Scanning for new proposals");
        self.governor.proposal_created(from, head.number).await
    }

    async fn process(&self, event: &Self::Item) -> Result<Outcome> {
        let start_ts = self.governor.block_timestamp(event.start_block).await?;
        let end_ts = self.governor.block_timestamp(event.end_block).await?;
        let (start, end) = ballot_window(start_ts, end_ts);
        debug!(
            start = %format_ts(start),
            end = %format_ts(end),
            snapshot = event.start_block,
            "Ballot window computed"
        );

        let draft = ProposalDraft {
            space: self.config.space.clone(),
            kind: "single-choice".to_string(),
            title: format!("Proposal #{}", event.id),
            body: event.description.clone(),
            choices: BALLOT_CHOICES.iter().map(|c| c.to_string()).collect(),
            start,
            end,
            snapshot: event.start_block,
            network: self.config.network.clone(),
            strategies: vec![self.config.strategy.clone()],
            app: "herald-mirror".to_string(),
        };
        self.hub.create_proposal(&draft).await?;
        Ok(Outcome::Acted)
    }
}

fn format_ts(ts: u64) -> String {
    chrono::DateTime::from_timestamp(ts as i64, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}
