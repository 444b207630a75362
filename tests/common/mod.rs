#![allow(dead_code)]

use std::path::PathBuf;

use covtrend::aggregate::{aggregate_profile, Aggregate};
use covtrend::db::SqliteStore;
use covtrend::ignore::IgnoreFilter;
use tempfile::TempDir;

/// Create a fresh history database, returning the store, dir handle, and db path.
/// The caller must hold onto `TempDir` to keep the temp directory alive.
pub fn setup_store() -> (SqliteStore, TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("history.db");
    let store = SqliteStore::open(&db_path).unwrap();
    (store, dir, db_path)
}

/// Aggregate an in-memory profile with the given ignore patterns.
pub fn aggregate(profile: &str, patterns: &[&str]) -> Aggregate {
    let filter = IgnoreFilter::new(patterns).unwrap();
    aggregate_profile(profile.as_bytes(), &filter).unwrap()
}

pub fn fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read_to_string(path).unwrap()
}
