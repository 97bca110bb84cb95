//! Submit stage: approved off-chain results go on-chain
//!
//! Closed ballots in the main space carry their call parameters in the
//! proposal body. The gate short-circuits on the first failure, and
//! every rejection is terminal: an item that cannot be submitted today
//! will not look any different tomorrow.
//!
//! 1. no votes cast;
//! 2. reported total disagrees with the recomputed score sum;
//! 3. approval ratio below the pass threshold;
//! 4. body does not parse as a call bundle;
//! 5. bundle fails field validation;
//! 6. gas estimate above the ceiling.
//!
//! Only a proposal clearing all six steps reaches `eth_sendTransaction`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{Outcome, StageProcessor};
use crate::chain::GovernorClient;
use crate::hub::VotingHub;
use crate::types::{CallBundle, HubProposal, ProposalState, Result, ValidatedCall};

#[derive(Debug, Clone)]
pub struct SubmitConfig {
    /// Space whose closed proposals are candidates for submission.
    pub space: String,
    /// Approval ratio (first choice over total) required to submit.
    pub pass_threshold: f64,
    /// Gas estimates above this are rejected outright; a payload that
    /// expensive is malformed or malicious.
    pub gas_ceiling: u64,
}

pub struct SubmitStage {
    hub: Arc<dyn VotingHub>,
    governor: Arc<dyn GovernorClient>,
    config: SubmitConfig,
}

impl SubmitStage {
    pub fn new(
        hub: Arc<dyn VotingHub>,
        governor: Arc<dyn GovernorClient>,
        config: SubmitConfig,
    ) -> Self {
        Self {
            hub,
            governor,
            config,
        }
    }
}

/// Outcome of the I/O-free part of the gate.
#[derive(Debug)]
pub enum GateDecision {
    Proceed(ValidatedCall),
    Reject(String),
}

/// Steps 1-5 of the gate: tally checks, payload parse, field validation.
pub fn evaluate(proposal: &HubProposal, pass_threshold: f64) -> GateDecision {
    let tally = proposal.tally();
    if tally.is_empty() {
        return GateDecision::Reject("no votes cast".to_string());
    }
    if let Err(reason) = tally.check_consistency() {
        return GateDecision::Reject(reason);
    }
    let ratio = tally.approval_ratio();
    if ratio < pass_threshold {
        return GateDecision::Reject(format!(
            "approval {:.3} below threshold {}",
            ratio, pass_threshold
        ));
    }

    let bundle: CallBundle = match serde_json::from_str(&proposal.body) {
        Ok(bundle) => bundle,
        Err(e) => return GateDecision::Reject(format!("body is not a call bundle: {}", e)),
    };
    match bundle.validate() {
        Ok(call) => GateDecision::Proceed(call),
        Err(e) => GateDecision::Reject(e.to_string()),
    }
}

#[async_trait]
impl StageProcessor for SubmitStage {
    type Item = HubProposal;

    fn name(&self) -> &'static str {
        "submit"
    }

    fn item_id(&self, item: &Self::Item) -> String {
        item.id.clone()
    }

    async fn fetch(&self) -> Result<Vec<Self::Item>> {
        self.hub
            .proposals(&self.config.space, ProposalState::Closed)
            .await
    }

    async fn process(&self, proposal: &Self::Item) -> Result<Outcome> {
        let call = match evaluate(proposal, self.config.pass_threshold) {
            GateDecision::Reject(reason) => return Ok(Outcome::Skipped(reason)),
            GateDecision::Proceed(call) => call,
        };

        let gas = self.governor.estimate_propose_gas(&call).await?;
        if gas > self.config.gas_ceiling {
            return Ok(Outcome::Skipped(format!(
                "gas estimate {} above ceiling {}",
                gas, self.config.gas_ceiling
            )));
        }

        let tx = self.governor.submit_proposal(&call).await?;
        info!(tx = %tx, targets = call.targets.len(), "Proposal submitted on-chain");
        Ok(Outcome::Acted)
    }
}
