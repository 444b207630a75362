//! In-memory representation of a Go coverage profile and of the figures
//! derived from it. The parser produces `StatementRecord`s, the aggregator
//! folds them into `LedgerEntry`s and `Accumulator`s, and the result is
//! frozen into a `CoverageSnapshot` for storage and comparison.

use std::collections::BTreeMap;

/// Compute a coverage percentage, returning 0.0 when the total is zero.
#[must_use]
pub fn percent(covered: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

/// How hit counts in a profile are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CoverMode {
    /// Each block was executed or not; counts are 0 or 1.
    #[default]
    Set,
    /// Exact execution counts.
    Count,
    /// Exact execution counts, safe under concurrent tests.
    Atomic,
}

impl CoverMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverMode::Set => "set",
            CoverMode::Count => "count",
            CoverMode::Atomic => "atomic",
        }
    }

    /// Recognize a mode token as written after `mode:` in a profile.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "set" => Some(CoverMode::Set),
            "count" => Some(CoverMode::Count),
            "atomic" => Some(CoverMode::Atomic),
            _ => None,
        }
    }
}

impl std::fmt::Display for CoverMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One statement line of a profile: `<id> <stmtCount> <hitCount>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementRecord {
    /// `<file>:<startLine>.<startCol>,<endLine>.<endCol>`, compared verbatim.
    pub id: String,
    pub stmt_count: u64,
    pub hit_count: u64,
}

impl StatementRecord {
    /// The source file the statement belongs to.
    pub fn file(&self) -> &str {
        file_of(&self.id)
    }

    /// The package (directory) the statement belongs to.
    pub fn package(&self) -> &str {
        package_of(&self.id)
    }
}

/// File portion of a statement id. Anchors on the last `:` so paths that
/// contain colons stay intact.
pub fn file_of(id: &str) -> &str {
    match id.rfind(':') {
        Some(pos) => &id[..pos],
        None => id,
    }
}

/// Directory component of a statement id's file, or `.` for a bare file.
pub fn package_of(id: &str) -> &str {
    match file_of(id).rfind('/') {
        Some(pos) => &id[..pos],
        None => ".",
    }
}

/// Deduplicated state for one statement id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Statement count from the first sighting; later sightings never change it.
    pub weight: u64,
    /// Sum of hit counts across every sighting.
    pub cumulative_hits: u64,
    /// Set on the first sighting with a non-zero hit count, never cleared.
    pub covered: bool,
}

/// Running statement totals for a package or for the whole profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Accumulator {
    pub total_weight: u64,
    pub covered_weight: u64,
}

impl Accumulator {
    #[must_use]
    pub fn pct(&self) -> f64 {
        percent(self.covered_weight, self.total_weight)
    }
}

/// Computed coverage figures for one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct CoverageSnapshot {
    pub format_version: u32,
    pub global_pct: f64,
    pub per_package: BTreeMap<String, f64>,
    pub skipped_count: u64,
    /// Commit the snapshot was recorded against. Not part of the stored
    /// blob; the store key supplies it.
    pub commit_id: Option<String>,
}

impl CoverageSnapshot {
    /// Packages whose coverage is exactly zero, in lexical order.
    pub fn uncovered_packages(&self) -> Vec<&str> {
        self.per_package
            .iter()
            .filter(|(_, pct)| **pct == 0.0)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// A package whose coverage moved by at least the noise floor.
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaEntry {
    pub package: String,
    pub prior_pct: f64,
    pub new_pct: f64,
}

impl DeltaEntry {
    #[must_use]
    pub fn improved(&self) -> bool {
        self.new_pct >= self.prior_pct
    }
}
