//! Herald - bridge between an on-chain governor and an off-chain voting hub
//!
//! Four independently scheduled stages move proposals through the
//! pipeline: mirror (chain -> hub ballot), forward (draft space -> main
//! space), submit (approved result -> chain) and relay (ballot outcome
//! -> on-chain vote via a multi-signature service). Each invocation runs
//! one stage to completion; the only state between runs is a per-stage
//! processed-set file.

pub mod chain;
pub mod config;
pub mod hub;
pub mod safe;
pub mod stages;
pub mod state;
pub mod types;

pub use config::{Args, StageCmd};
pub use types::{HeraldError, Result};
