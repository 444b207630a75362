//! Versioned JSON encoding of a [`CoverageSnapshot`].
//!
//! Layout (version 1):
//!
//! ```json
//! {"go-coverage-action-fmt":1,"coverage_pct":72.5,"pkg_stats":{"example.com/a":[50.0]},"skipped_count":0}
//! ```
//!
//! Per-package values are arrays whose first element is the percentage. The
//! commit id is not part of the blob; the store key supplies it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CovtrendError, Result};
use crate::model::CoverageSnapshot;

pub const FORMAT_VERSION: u32 = 1;

/// Text every stored snapshot contains; history lookups search for it.
pub const HISTORY_MARKER: &str = "coverage_pct";

#[derive(Serialize, Deserialize)]
struct SnapshotV1 {
    #[serde(rename = "go-coverage-action-fmt")]
    fmt: u32,
    coverage_pct: f64,
    pkg_stats: BTreeMap<String, Vec<f64>>,
    #[serde(default)]
    skipped_count: u64,
}

#[derive(Deserialize)]
struct VersionProbe {
    #[serde(rename = "go-coverage-action-fmt")]
    fmt: Option<u64>,
}

pub fn encode(snapshot: &CoverageSnapshot) -> Result<String> {
    let wire = SnapshotV1 {
        fmt: FORMAT_VERSION,
        coverage_pct: snapshot.global_pct,
        pkg_stats: snapshot
            .per_package
            .iter()
            .map(|(name, pct)| (name.clone(), vec![*pct]))
            .collect(),
        skipped_count: snapshot.skipped_count,
    };
    Ok(serde_json::to_string(&wire)?)
}

/// Decode a stored blob. Blobs without a version tag, or with a version
/// this build does not know, are rejected rather than guessed at.
pub fn decode(blob: &str) -> Result<CoverageSnapshot> {
    let probe: VersionProbe = serde_json::from_str(blob.trim())
        .map_err(|e| CovtrendError::Decode(format!("not a snapshot object: {e}")))?;
    match probe.fmt {
        None => return Err(CovtrendError::Decode("missing format version".to_string())),
        Some(v) if v != u64::from(FORMAT_VERSION) => {
            return Err(CovtrendError::Decode(format!(
                "unsupported format version {v} (expected {FORMAT_VERSION})"
            )));
        }
        Some(_) => {}
    }

    let wire: SnapshotV1 = serde_json::from_str(blob.trim())
        .map_err(|e| CovtrendError::Decode(e.to_string()))?;

    Ok(CoverageSnapshot {
        format_version: wire.fmt,
        global_pct: wire.coverage_pct,
        per_package: wire
            .pkg_stats
            .into_iter()
            .map(|(name, stats)| {
                let pct = stats.first().copied().unwrap_or(0.0);
                (name, pct)
            })
            .collect(),
        skipped_count: wire.skipped_count,
        commit_id: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CoverageSnapshot {
        CoverageSnapshot {
            format_version: FORMAT_VERSION,
            global_pct: 66.66666666666667,
            per_package: BTreeMap::from([
                ("example.com/b".to_string(), 100.0),
                ("example.com/a".to_string(), 33.333333333333336),
            ]),
            skipped_count: 2,
            commit_id: Some("abc".to_string()),
        }
    }

    #[test]
    fn test_encode_layout() {
        let blob = encode(&sample()).unwrap();
        assert_eq!(
            blob,
            r#"{"go-coverage-action-fmt":1,"coverage_pct":66.66666666666667,"pkg_stats":{"example.com/a":[33.333333333333336],"example.com/b":[100.0]},"skipped_count":2}"#
        );
        assert!(blob.contains(HISTORY_MARKER));
    }

    #[test]
    fn test_round_trip() {
        let blob = encode(&sample()).unwrap();
        let decoded = decode(&blob).unwrap();
        assert_eq!(decoded.commit_id, None);
        assert_eq!(decoded.per_package, sample().per_package);
        assert_eq!(encode(&decoded).unwrap(), blob);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let err = decode(r#"{"go-coverage-action-fmt":2,"coverage_pct":1.0,"pkg_stats":{}}"#).unwrap_err();
        assert!(matches!(err, CovtrendError::Decode(_)));
        assert!(err.to_string().contains("unsupported format version 2"));
    }

    #[test]
    fn test_decode_rejects_unversioned() {
        let err = decode(r#"{"coverage_pct":1.0,"pkg_stats":{}}"#).unwrap_err();
        assert!(err.to_string().contains("missing format version"));
    }

    #[test]
    fn test_decode_existing_gocoverage_note() {
        let snapshot = decode(
            r#"{"go-coverage-action-fmt":1,"coverage_pct":72.5,"pkg_stats":{"a":[72.5]},"skipped_count":0}"#,
        )
        .unwrap();
        assert_eq!(snapshot.format_version, 1);
        assert_eq!(snapshot.global_pct, 72.5);
        assert_eq!(snapshot.per_package["a"], 72.5);
    }

    #[test]
    fn test_decode_rejects_bare_fmt_key() {
        let err = decode(r#"{"fmt":1,"coverage_pct":1.0,"pkg_stats":{}}"#).unwrap_err();
        assert!(err.to_string().contains("missing format version"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode("not json").is_err());
        assert!(decode("").is_err());
        assert!(decode("[1,2]").is_err());
    }

    #[test]
    fn test_decode_tolerates_extra_stats_and_missing_skip_count() {
        let snapshot =
            decode(r#"{"go-coverage-action-fmt":1,"coverage_pct":10.0,"pkg_stats":{"a":[10.0,3,4],"b":[]}}"#)
                .unwrap();
        assert_eq!(snapshot.per_package["a"], 10.0);
        assert_eq!(snapshot.per_package["b"], 0.0);
        assert_eq!(snapshot.skipped_count, 0);
    }

    #[test]
    fn test_decode_trims_trailing_newline() {
        let blob = format!("{}\n", encode(&sample()).unwrap());
        assert!(decode(&blob).is_ok());
    }
}
