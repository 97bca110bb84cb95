//! Stage processors and the shared runner
//!
//! All four pipeline stages share one shape: fetch candidate items from
//! a source, drop the ones already decided, run each survivor through a
//! gate and (maybe) a sink, and record the decision. A run is
//! single-threaded and strictly sequential: one in-flight on-chain
//! action at a time keeps nonces and safe-queue ordering predictable.
//!
//! Per run: `load state -> fetch -> {seen-filter -> decide -> act ->
//! record}* -> done`. The processed set is persisted after every item,
//! so a crash mid-run loses at most the in-flight item's marker and the
//! sinks must tolerate re-delivery.
//!
//! Failure policy: a fetch failure aborts the run (nothing sensible can
//! happen without the item list), while an item failure is logged and
//! the item is still marked done. Retrying a deterministically failing
//! action every minute would block nothing and fix nothing; the cost is
//! that a transient failure is never retried either.

pub mod forward;
pub mod mirror;
pub mod relay;
pub mod submit;

use async_trait::async_trait;
use tracing::{error, info};

use crate::state::ProcessedStore;
use crate::types::Result;

pub use forward::{ForwardConfig, ForwardStage};
pub use mirror::{MirrorConfig, MirrorStage};
pub use relay::{RelayConfig, RelayStage};
pub use submit::{SubmitConfig, SubmitStage};

/// Final decision for one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The sink action ran.
    Acted,
    /// The gate rejected the item; recorded so it is never revisited.
    Skipped(String),
}

/// Counters for one stage run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    pub fetched: usize,
    pub already_done: usize,
    pub acted: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// One pipeline stage: a source, a gate and a sink behind a uniform
/// interface the runner can drive.
#[async_trait]
pub trait StageProcessor: Send + Sync {
    type Item: Send + Sync;

    fn name(&self) -> &'static str;

    /// Identifier of an item, unique within this stage's source.
    fn item_id(&self, item: &Self::Item) -> String;

    /// Pull the candidate items for this run. Read-only; a failure here
    /// aborts the run.
    async fn fetch(&self) -> Result<Vec<Self::Item>>;

    /// Decide and, if the gate passes, act on one item.
    async fn process(&self, item: &Self::Item) -> Result<Outcome>;
}

/// Drive one stage to completion.
pub async fn run_stage<S: StageProcessor>(
    stage: &S,
    store: &mut ProcessedStore,
) -> Result<StageReport> {
    let items = stage.fetch().await?;
    let mut report = StageReport {
        fetched: items.len(),
        ..Default::default()
    };
    info!(stage = stage.name(), fetched = items.len(), "Fetched candidate items");

    for item in &items {
        let id = stage.item_id(item);
        if store.contains(&id) {
            report.already_done += 1;
            continue;
        }

        match stage.process(item).await {
            Ok(Outcome::Acted) => {
                info!(stage = stage.name(), item = %id, "Item processed");
                report.acted += 1;
            }
            Ok(Outcome::Skipped(reason)) => {
                info!(stage = stage.name(), item = %id, reason = %reason, "Item skipped");
                report.skipped += 1;
            }
            Err(e) => {
                error!(stage = stage.name(), item = %id, error = %e, "Item failed");
                report.failed += 1;
            }
        }

        // Done means decided, not necessarily succeeded: failures are
        // terminal skips.
        store.mark_done(&id);
        store.persist()?;
    }

    info!(
        stage = stage.name(),
        acted = report.acted,
        skipped = report.skipped,
        failed = report.failed,
        already_done = report.already_done,
        "Stage run complete"
    );
    Ok(report)
}
