//! Forward stage: pending drafts move into the main space
//!
//! Community members draft proposals in a staging space; every pending
//! draft is republished verbatim into the main space as an
//! Approve/Reject ballot. The seen-filter is the entire gate: a draft
//! is forwarded exactly once, whatever happens to it afterwards.

use std::sync::Arc;

use async_trait::async_trait;

use super::{Outcome, StageProcessor};
use crate::hub::{ProposalDraft, VotingHub, WeightStrategy};
use crate::types::{HubProposal, ProposalState, Result};

/// Ballot choices for forwarded drafts.
pub const FORWARD_CHOICES: [&str; 2] = ["Approve", "Reject"];

#[derive(Debug, Clone)]
pub struct ForwardConfig {
    /// Space the drafts are pulled from.
    pub source_space: String,
    /// Space the ballots are created in.
    pub target_space: String,
    /// Network identifier the hub files the ballot under.
    pub network: String,
    /// Voting-power strategy attached to every ballot.
    pub strategy: WeightStrategy,
}

pub struct ForwardStage {
    hub: Arc<dyn VotingHub>,
    config: ForwardConfig,
}

impl ForwardStage {
    pub fn new(hub: Arc<dyn VotingHub>, config: ForwardConfig) -> Self {
        Self { hub, config }
    }
}

#[async_trait]
impl StageProcessor for ForwardStage {
    type Item = HubProposal;

    fn name(&self) -> &'static str {
        "forward"
    }

    fn item_id(&self, item: &Self::Item) -> String {
        item.id.clone()
    }

    async fn fetch(&self) -> Result<Vec<Self::Item>> {
        self.hub
            .proposals(&self.config.source_space, ProposalState::Pending)
            .await
    }

    async fn process(&self, draft: &Self::Item) -> Result<Outcome> {
        // Title, body, timing and snapshot travel unchanged; only the
        // space, the choices and the app tag are herald's.
        let ballot = ProposalDraft {
            space: self.config.target_space.clone(),
            kind: "single-choice".to_string(),
            title: draft.title.clone(),
            body: draft.body.clone(),
            choices: FORWARD_CHOICES.iter().map(|c| c.to_string()).collect(),
            start: draft.start,
            end: draft.end,
            snapshot: draft.snapshot,
            network: self.config.network.clone(),
            strategies: vec![self.config.strategy.clone()],
            app: "herald-forward".to_string(),
        };
        self.hub.create_proposal(&ballot).await?;
        Ok(Outcome::Acted)
    }
}
