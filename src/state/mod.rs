//! Idempotency state for stage runs
//!
//! Every stage owns exactly one processed-set: the identifiers it has
//! already made a final decision on. The set survives between runs in a
//! JSON file; everything else about a run is ephemeral.

pub mod store;

pub use store::ProcessedStore;
