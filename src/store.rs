//! Commit-keyed storage for coverage snapshots.
//!
//! The engine only needs two operations: record a blob against a commit, and
//! find the nearest recorded blob at or before a starting commit. How the
//! history is walked is up to the backend (git notes, SQLite).

use tracing::{info, warn};

use crate::error::{HistoryAbsent, Result};
use crate::model::CoverageSnapshot;
use crate::snapshot::{self, HISTORY_MARKER};

/// A blob found in the store, with the commit it was recorded against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub commit_id: String,
    pub blob: String,
}

pub trait SnapshotStore {
    /// Record `blob` against `commit_id`, replacing any earlier blob for it.
    fn put(&self, commit_id: &str, blob: &str) -> Result<()>;

    /// Walk backward from `start_ref` (inclusive) and return the nearest
    /// blob containing `marker`. `Ok(None)` means nothing qualified.
    fn find_preceding_matching(&self, start_ref: &str, marker: &str) -> Result<Option<StoredBlob>>;
}

/// Look up the snapshot preceding `base_ref`. Every failure mode degrades to
/// a [`HistoryAbsent`] reason.
pub fn fetch_prior(
    store: &dyn SnapshotStore,
    base_ref: Option<&str>,
) -> std::result::Result<CoverageSnapshot, HistoryAbsent> {
    let base_ref = base_ref.ok_or(HistoryAbsent::NoBaseRef)?;

    let found = store
        .find_preceding_matching(base_ref, HISTORY_MARKER)
        .map_err(|e| HistoryAbsent::StoreFailed(e.to_string()))?
        .ok_or(HistoryAbsent::NotFound)?;

    info!(commit = %found.commit_id, "prior coverage data: {}", found.blob.trim());

    let mut prior =
        snapshot::decode(&found.blob).map_err(|e| HistoryAbsent::Undecodable(e.to_string()))?;
    prior.commit_id = Some(found.commit_id);
    Ok(prior)
}

/// [`fetch_prior`], logging why history is missing and flattening to an
/// `Option`.
pub fn load_prior(store: &dyn SnapshotStore, base_ref: Option<&str>) -> Option<CoverageSnapshot> {
    match fetch_prior(store, base_ref) {
        Ok(prior) => {
            info!(
                "Previous coverage: {}% as of {}",
                prior.global_pct,
                prior.commit_id.as_deref().unwrap_or("unknown")
            );
            Some(prior)
        }
        Err(reason @ HistoryAbsent::StoreFailed(_)) => {
            warn!("{reason}");
            None
        }
        Err(reason) => {
            info!("{reason}");
            None
        }
    }
}
