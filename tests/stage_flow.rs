//! End-to-end stage runs over in-memory adapters
//!
//! Each test drives a real stage through the real runner and store,
//! with the chain, hub and safe replaced by scripted fakes.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use herald::chain::abi::{Address, Uint256};
use herald::chain::{BlockInfo, GovernorClient, ProposalCreatedEvent};
use herald::hub::{ProposalDraft, StrategyParams, VotingHub, WeightStrategy, WEIGHT_STRATEGY};
use herald::safe::{SafeExecutor, SafeTx};
use herald::stages::{
    run_stage, ForwardConfig, ForwardStage, MirrorConfig, MirrorStage, RelayConfig, RelayStage,
    SubmitConfig, SubmitStage,
};
use herald::state::ProcessedStore;
use herald::types::{HeraldError, HubProposal, ProposalState, Result, ValidatedCall};

// ---------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------

struct FakeGovernor {
    head: BlockInfo,
    timestamps: HashMap<u64, u64>,
    events: Vec<ProposalCreatedEvent>,
    voting_end: u64,
    gas_estimate: u64,
    submitted: Mutex<Vec<ValidatedCall>>,
}

impl FakeGovernor {
    fn new() -> Self {
        Self {
            head: BlockInfo {
                number: 1_000,
                timestamp: 1_700_000_000,
            },
            timestamps: HashMap::new(),
            events: Vec::new(),
            voting_end: u64::MAX,
            gas_estimate: 500_000,
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GovernorClient for FakeGovernor {
    async fn head(&self) -> Result<BlockInfo> {
        Ok(self.head)
    }

    async fn block_timestamp(&self, number: u64) -> Result<u64> {
        self.timestamps
            .get(&number)
            .copied()
            .ok_or_else(|| HeraldError::Rpc(format!("block {} is not available yet", number)))
    }

    async fn proposal_created(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<ProposalCreatedEvent>> {
        assert!(from_block <= to_block);
        Ok(self.events.clone())
    }

    async fn voting_end(&self, _proposal_id: &Uint256) -> Result<u64> {
        Ok(self.voting_end)
    }

    async fn estimate_propose_gas(&self, _call: &ValidatedCall) -> Result<u64> {
        Ok(self.gas_estimate)
    }

    async fn submit_proposal(&self, call: &ValidatedCall) -> Result<String> {
        self.submitted.lock().unwrap().push(call.clone());
        Ok("0xsubmitted".to_string())
    }
}

struct FakeHub {
    proposals: Vec<HubProposal>,
    created: Mutex<Vec<ProposalDraft>>,
    fail_creates: bool,
}

impl FakeHub {
    fn new(proposals: Vec<HubProposal>) -> Self {
        Self {
            proposals,
            created: Mutex::new(Vec::new()),
            fail_creates: false,
        }
    }
}

#[async_trait]
impl VotingHub for FakeHub {
    async fn proposals(&self, _space: &str, _state: ProposalState) -> Result<Vec<HubProposal>> {
        Ok(self.proposals.clone())
    }

    async fn create_proposal(&self, draft: &ProposalDraft) -> Result<String> {
        if self.fail_creates {
            return Err(HeraldError::Hub("hub rejected the message".to_string()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(draft.clone());
        Ok(format!("receipt-{}", created.len()))
    }
}

#[derive(Default)]
struct FakeSafe {
    created: Mutex<Vec<(Address, Vec<u8>, Uint256)>>,
    executed: Mutex<Vec<String>>,
}

#[async_trait]
impl SafeExecutor for FakeSafe {
    async fn create_transaction(
        &self,
        to: &Address,
        data: &[u8],
        value: &Uint256,
    ) -> Result<SafeTx> {
        let mut created = self.created.lock().unwrap();
        created.push((*to, data.to_vec(), *value));
        Ok(SafeTx {
            id: format!("safe-tx-{}", created.len()),
        })
    }

    async fn execute(&self, tx: &SafeTx) -> Result<String> {
        self.executed.lock().unwrap().push(tx.id.clone());
        Ok("0xexecuted".to_string())
    }
}

// ---------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------

fn strategy() -> WeightStrategy {
    WeightStrategy {
        name: WEIGHT_STRATEGY.to_string(),
        params: StrategyParams {
            address: "0x614d7503a44e6fd67997f9945bb32d02e8c19431".to_string(),
            symbol: "VOTE".to_string(),
            decimals: 0,
            chain_id: 8453,
        },
    }
}

fn governor_address() -> Address {
    Address::parse("0x5d2c31ce16924c2a71d317e5bbfd5ce387854039").unwrap()
}

fn closed_ballot(id: &str, scores: Vec<f64>, total: f64, body: &str) -> HubProposal {
    HubProposal {
        id: id.to_string(),
        title: format!("Proposal #{}", id),
        body: body.to_string(),
        choices: vec!["For".to_string(), "Against".to_string(), "Abstain".to_string()],
        start: 100,
        end: 200,
        snapshot: 90,
        scores,
        scores_total: total,
    }
}

fn call_body() -> String {
    serde_json::json!({
        "targets": ["0x5d2c31ce16924c2a71d317e5bbfd5ce387854039"],
        "values": [0],
        "signatures": ["transfer(address,uint256)"],
        "calldatas": ["0xdeadbeef"],
        "description": "fund the grant"
    })
    .to_string()
}

fn store(dir: &tempfile::TempDir, stage: &str) -> ProcessedStore {
    ProcessedStore::load(dir.path().join(format!("{}.json", stage)))
}

// ---------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------

#[tokio::test]
async fn mirror_creates_ballot_with_shifted_window() {
    let mut governor = FakeGovernor::new();
    governor.events.push(ProposalCreatedEvent {
        id: Uint256::from_u64(7),
        start_block: 900,
        end_block: 950,
        description: "upgrade the treasury".to_string(),
    });
    governor.timestamps.insert(900, 1_000);
    governor.timestamps.insert(950, 1_000_000);
    let governor = Arc::new(governor);
    let hub = Arc::new(FakeHub::new(vec![]));

    let stage = MirrorStage::new(
        governor.clone(),
        hub.clone(),
        MirrorConfig {
            space: "assembly".to_string(),
            network: "1".to_string(),
            block_range: 120,
            strategy: strategy(),
        },
    );
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "mirror");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.acted, 1);

    let created = hub.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    let ballot = &created[0];
    assert_eq!(ballot.space, "assembly");
    assert_eq!(ballot.title, "Proposal #7");
    assert_eq!(ballot.body, "upgrade the treasury");
    assert_eq!(ballot.choices, vec!["For", "Against", "Abstain"]);
    assert_eq!(ballot.start, 1_000);
    assert_eq!(ballot.end, 1_000_000 - 86_400);
    assert_eq!(ballot.snapshot, 900);
    assert_eq!(ballot.app, "herald-mirror");

    assert!(st.contains("7"));
}

#[tokio::test]
async fn mirror_rerun_does_not_touch_the_hub_again() {
    let mut governor = FakeGovernor::new();
    governor.events.push(ProposalCreatedEvent {
        id: Uint256::from_u64(7),
        start_block: 900,
        end_block: 950,
        description: "d".to_string(),
    });
    governor.timestamps.insert(900, 1_000);
    governor.timestamps.insert(950, 1_000_000);
    let governor = Arc::new(governor);
    let hub = Arc::new(FakeHub::new(vec![]));

    let stage = MirrorStage::new(
        governor.clone(),
        hub.clone(),
        MirrorConfig {
            space: "assembly".to_string(),
            network: "1".to_string(),
            block_range: 120,
            strategy: strategy(),
        },
    );
    let dir = tempfile::tempdir().unwrap();

    let mut st = store(&dir, "mirror");
    run_stage(&stage, &mut st).await.unwrap();

    // Second scheduled invocation over the same window.
    let mut st = store(&dir, "mirror");
    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.already_done, 1);
    assert_eq!(report.acted, 0);
    assert_eq!(hub.created.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn mirror_missing_block_fails_item_but_marks_it_done() {
    let mut governor = FakeGovernor::new();
    governor.events.push(ProposalCreatedEvent {
        id: Uint256::from_u64(9),
        start_block: 2_000, // not mined yet
        end_block: 2_050,
        description: "d".to_string(),
    });
    let governor = Arc::new(governor);
    let hub = Arc::new(FakeHub::new(vec![]));

    let stage = MirrorStage::new(
        governor.clone(),
        hub.clone(),
        MirrorConfig {
            space: "assembly".to_string(),
            network: "1".to_string(),
            block_range: 120,
            strategy: strategy(),
        },
    );
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "mirror");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(st.contains("9"));
    assert!(hub.created.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------
// Forward
// ---------------------------------------------------------------------

#[tokio::test]
async fn forward_copies_draft_verbatim_into_main_space() {
    let draft = HubProposal {
        id: "draft-1".to_string(),
        title: "Plant trees".to_string(),
        body: "we should plant trees".to_string(),
        choices: vec![],
        start: 5_000,
        end: 9_000,
        snapshot: 4_500,
        scores: vec![],
        scores_total: 0.0,
    };
    let hub = Arc::new(FakeHub::new(vec![draft]));

    let stage = ForwardStage::new(
        hub.clone(),
        ForwardConfig {
            source_space: "drafts".to_string(),
            target_space: "main".to_string(),
            network: "1".to_string(),
            strategy: strategy(),
        },
    );
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "forward");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.acted, 1);

    let created = hub.created.lock().unwrap();
    let ballot = &created[0];
    assert_eq!(ballot.space, "main");
    assert_eq!(ballot.title, "Plant trees");
    assert_eq!(ballot.body, "we should plant trees");
    assert_eq!(ballot.choices, vec!["Approve", "Reject"]);
    assert_eq!(ballot.start, 5_000);
    assert_eq!(ballot.end, 9_000);
    assert_eq!(ballot.snapshot, 4_500);
    assert_eq!(ballot.app, "herald-forward");
}

#[tokio::test]
async fn forward_failure_is_terminal() {
    let draft = HubProposal {
        id: "draft-2".to_string(),
        title: "t".to_string(),
        body: "b".to_string(),
        choices: vec![],
        start: 1,
        end: 2,
        snapshot: 1,
        scores: vec![],
        scores_total: 0.0,
    };
    let mut hub = FakeHub::new(vec![draft]);
    hub.fail_creates = true;
    let hub = Arc::new(hub);

    let stage = ForwardStage::new(
        hub.clone(),
        ForwardConfig {
            source_space: "drafts".to_string(),
            target_space: "main".to_string(),
            network: "1".to_string(),
            strategy: strategy(),
        },
    );
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "forward");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(st.contains("draft-2"));

    // The next run must not retry the failed draft.
    let mut st = store(&dir, "forward");
    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.already_done, 1);
    assert_eq!(report.failed, 0);
}

// ---------------------------------------------------------------------
// Submit
// ---------------------------------------------------------------------

fn submit_stage(
    hub: Arc<FakeHub>,
    governor: Arc<FakeGovernor>,
) -> SubmitStage {
    SubmitStage::new(
        hub,
        governor,
        SubmitConfig {
            space: "main".to_string(),
            pass_threshold: 0.5,
            gas_ceiling: 10_000_000,
        },
    )
}

#[tokio::test]
async fn submit_sends_approved_proposal_on_chain() {
    let ballot = closed_ballot("b1", vec![80.0, 20.0, 0.0], 100.0, &call_body());
    let hub = Arc::new(FakeHub::new(vec![ballot]));
    let governor = Arc::new(FakeGovernor::new());

    let stage = submit_stage(hub, governor.clone());
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "submit");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.acted, 1);

    let submitted = governor.submitted.lock().unwrap();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].description, "fund the grant");
    assert!(st.contains("b1"));
}

#[tokio::test]
async fn submit_records_rejections_without_touching_the_chain() {
    let ballots = vec![
        closed_ballot("no-votes", vec![], 0.0, &call_body()),
        closed_ballot("below", vec![40.0, 60.0, 0.0], 100.0, &call_body()),
        closed_ballot("prose", vec![90.0, 10.0, 0.0], 100.0, "just words"),
        closed_ballot("inconsistent", vec![10.0, 10.0, 0.0], 45.0, &call_body()),
    ];
    let hub = Arc::new(FakeHub::new(ballots));
    let governor = Arc::new(FakeGovernor::new());

    let stage = submit_stage(hub, governor.clone());
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "submit");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.skipped, 4);
    assert_eq!(report.acted, 0);
    assert!(governor.submitted.lock().unwrap().is_empty());
    for id in ["no-votes", "below", "prose", "inconsistent"] {
        assert!(st.contains(id), "{} should be recorded", id);
    }
}

#[tokio::test]
async fn submit_rejects_gas_above_ceiling() {
    let ballot = closed_ballot("pricey", vec![80.0, 20.0, 0.0], 100.0, &call_body());
    let hub = Arc::new(FakeHub::new(vec![ballot]));
    let mut governor = FakeGovernor::new();
    governor.gas_estimate = 20_000_000;
    let governor = Arc::new(governor);

    let stage = submit_stage(hub, governor.clone());
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "submit");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(governor.submitted.lock().unwrap().is_empty());
    assert!(st.contains("pricey"));
}

// ---------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------

fn relay_stage(
    hub: Arc<FakeHub>,
    governor: Arc<FakeGovernor>,
    safe: Arc<FakeSafe>,
) -> RelayStage {
    RelayStage::new(
        hub,
        governor,
        safe,
        RelayConfig {
            space: "assembly".to_string(),
            governor: governor_address(),
        },
    )
}

#[tokio::test]
async fn relay_votes_for_the_winning_choice() {
    let ballot = closed_ballot("3", vec![30.0, 10.0, 5.0], 45.0, "");
    let hub = Arc::new(FakeHub::new(vec![ballot]));
    let governor = Arc::new(FakeGovernor::new());
    let safe = Arc::new(FakeSafe::default());

    let stage = relay_stage(hub, governor, safe.clone());
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "relay");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.acted, 1);

    let created = safe.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    let (to, data, value) = &created[0];
    assert_eq!(*to, governor_address());
    assert_eq!(*value, Uint256::ZERO);
    // castVote(3, 0): selector, proposal id word, support word
    assert_eq!(&data[..4], &[0x56, 0x78, 0x13, 0x88]);
    assert_eq!(data[4..36], Uint256::from_u64(3).to_be_bytes());
    assert_eq!(data[36..68], Uint256::from_u64(0).to_be_bytes());

    assert_eq!(safe.executed.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn relay_skips_when_onchain_voting_closed() {
    let ballot = closed_ballot("3", vec![30.0, 10.0, 5.0], 45.0, "");
    let hub = Arc::new(FakeHub::new(vec![ballot]));
    let mut governor = FakeGovernor::new();
    governor.voting_end = governor.head.timestamp; // now >= end
    let governor = Arc::new(governor);
    let safe = Arc::new(FakeSafe::default());

    let stage = relay_stage(hub, governor, safe.clone());
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "relay");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(safe.created.lock().unwrap().is_empty());
    assert!(st.contains("3"));
}

#[tokio::test]
async fn relay_skips_empty_tally_without_calling_the_safe() {
    let ballot = closed_ballot("4", vec![], 0.0, "");
    let hub = Arc::new(FakeHub::new(vec![ballot]));
    let governor = Arc::new(FakeGovernor::new());
    let safe = Arc::new(FakeSafe::default());

    let stage = relay_stage(hub, governor, safe.clone());
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "relay");

    let report = run_stage(&stage, &mut st).await.unwrap();
    assert_eq!(report.skipped, 1);
    assert!(safe.created.lock().unwrap().is_empty());
}

#[tokio::test]
async fn relay_accepts_hex_ballot_ids() {
    let ballot = closed_ballot("0x2a", vec![10.0, 2.0], 12.0, "");
    let hub = Arc::new(FakeHub::new(vec![ballot]));
    let governor = Arc::new(FakeGovernor::new());
    let safe = Arc::new(FakeSafe::default());

    let stage = relay_stage(hub, governor, safe.clone());
    let dir = tempfile::tempdir().unwrap();
    let mut st = store(&dir, "relay");

    run_stage(&stage, &mut st).await.unwrap();
    let created = safe.created.lock().unwrap();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].1[4..36], Uint256::from_u64(42).to_be_bytes());
}
