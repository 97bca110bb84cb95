//! Processed-set store
//!
//! A flat JSON array of item identifiers, one file per stage. Loading is
//! deliberately tolerant: a missing or malformed file means "nothing
//! processed yet": a first run and a corrupted file look the same, and
//! the stages are built to survive re-delivery. Persisting rewrites the
//! whole set through a temp file and a rename, so a concurrent reader
//! never observes a partial write.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::types::{HeraldError, Result};

pub struct ProcessedStore {
    path: PathBuf,
    seen: HashSet<String>,
}

impl ProcessedStore {
    /// Load the set from disk. Never fails: unreadable or unparsable
    /// backing data yields an empty set.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let seen = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<String>>(&bytes) {
                Ok(ids) => {
                    debug!(path = %path.display(), entries = ids.len(), "Loaded processed set");
                    ids.into_iter().collect()
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "State file malformed, starting from an empty set"
                    );
                    HashSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No state file yet, starting empty");
                HashSet::new()
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "State file unreadable, starting from an empty set"
                );
                HashSet::new()
            }
        };
        Self { path, seen }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Record a final decision for an item. Returns false if it was
    /// already recorded.
    pub fn mark_done(&mut self, id: &str) -> bool {
        self.seen.insert(id.to_string())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Write the complete current set to disk atomically.
    pub fn persist(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }

        let mut ids: Vec<&String> = self.seen.iter().collect();
        ids.sort();
        let bytes = serde_json::to_vec_pretty(&ids)
            .map_err(|e| HeraldError::State(format!("failed to serialize processed set: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), entries = self.seen.len(), "Persisted processed set");
        Ok(())
    }
}
