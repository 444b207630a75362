//! Comparison of two coverage snapshots.

use std::collections::{BTreeMap, BTreeSet};

use crate::model::{CoverageSnapshot, DeltaEntry};

/// Smallest per-package change, in percentage points, that is reported.
pub const NOISE_FLOOR: f64 = 0.1;

/// Packages whose coverage changed by at least [`NOISE_FLOOR`], in lexical
/// order. A package missing on one side counts as 0% there.
pub fn package_delta(
    prior: &BTreeMap<String, f64>,
    current: &BTreeMap<String, f64>,
) -> Vec<DeltaEntry> {
    let names: BTreeSet<&String> = prior.keys().chain(current.keys()).collect();

    names
        .into_iter()
        .filter_map(|name| {
            let prior_pct = prior.get(name).copied().unwrap_or(0.0);
            let new_pct = current.get(name).copied().unwrap_or(0.0);
            if (prior_pct - new_pct).abs() >= NOISE_FLOOR {
                Some(DeltaEntry {
                    package: name.clone(),
                    prior_pct,
                    new_pct,
                })
            } else {
                None
            }
        })
        .collect()
}

/// Outcome of comparing the current snapshot against history.
///
/// `NoHistory` is not the same thing as a zero delta and is rendered
/// differently.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    NoHistory,
    Against {
        prior_commit: Option<String>,
        prior_pct: f64,
        /// `current − prior`, signed and never thresholded.
        global_delta: f64,
        packages: Vec<DeltaEntry>,
    },
}

impl Comparison {
    pub fn compare(prior: Option<&CoverageSnapshot>, current: &CoverageSnapshot) -> Self {
        match prior {
            None => Comparison::NoHistory,
            Some(prior) => Comparison::Against {
                prior_commit: prior.commit_id.clone(),
                prior_pct: prior.global_pct,
                global_delta: current.global_pct - prior.global_pct,
                packages: package_delta(&prior.per_package, &current.per_package),
            },
        }
    }

    pub fn global_delta(&self) -> Option<f64> {
        match self {
            Comparison::NoHistory => None,
            Comparison::Against { global_delta, .. } => Some(*global_delta),
        }
    }

    pub fn prior_pct(&self) -> Option<f64> {
        match self {
            Comparison::NoHistory => None,
            Comparison::Against { prior_pct, .. } => Some(*prior_pct),
        }
    }

    pub fn prior_commit(&self) -> Option<&str> {
        match self {
            Comparison::NoHistory => None,
            Comparison::Against { prior_commit, .. } => prior_commit.as_deref(),
        }
    }
}

/// Signed delta as logged, e.g. `+1.25`, `-0.5`, `0`.
pub fn format_signed(delta: f64) -> String {
    if delta == 0.0 {
        "0".to_string()
    } else if delta > 0.0 {
        format!("+{delta}")
    } else {
        format!("{delta}")
    }
}
