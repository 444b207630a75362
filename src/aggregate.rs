//! Deduplicating aggregation of profile statements into per-package and
//! global totals.
//!
//! A statement id can be reported more than once in a single profile. Each
//! distinct id contributes its weight to the totals exactly once, on first
//! sight, and contributes to the covered totals exactly once, the first time
//! any sighting has a non-zero hit count. Hit counts are summed across all
//! sightings for the merged profile. Together these make the figures
//! independent of record order and of duplication.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, Write};

use tracing::{info, warn};

use crate::error::Result;
use crate::ignore::IgnoreFilter;
use crate::model::{
    file_of, package_of, Accumulator, CoverMode, CoverageSnapshot, LedgerEntry, StatementRecord,
};
use crate::parser::ProfileReader;
use crate::snapshot::FORMAT_VERSION;
use crate::writer;

/// Single-pass aggregation state. Owned by one aggregation run.
#[derive(Debug, Default)]
pub struct Aggregator {
    ledger: BTreeMap<String, LedgerEntry>,
    packages: BTreeMap<String, Accumulator>,
    global: Accumulator,
    skipped_files: BTreeSet<String>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one admitted record into the ledger and totals.
    pub fn add(&mut self, record: &StatementRecord) {
        let package = self
            .packages
            .entry(package_of(&record.id).to_string())
            .or_default();

        let global = &mut self.global;
        let entry = self.ledger.entry(record.id.clone()).or_insert_with(|| {
            package.total_weight = package.total_weight.saturating_add(record.stmt_count);
            global.total_weight = global.total_weight.saturating_add(record.stmt_count);
            LedgerEntry {
                weight: record.stmt_count,
                cumulative_hits: 0,
                covered: false,
            }
        });

        entry.cumulative_hits = entry.cumulative_hits.saturating_add(record.hit_count);

        if record.hit_count > 0 && !entry.covered {
            entry.covered = true;
            package.covered_weight = package.covered_weight.saturating_add(entry.weight);
            global.covered_weight = global.covered_weight.saturating_add(entry.weight);
        }
    }

    /// Record that a statement was suppressed by an ignore pattern. Returns
    /// true the first time a given file is skipped.
    pub fn skip(&mut self, record: &StatementRecord) -> bool {
        let file = file_of(&record.id);
        if self.skipped_files.contains(file) {
            return false;
        }
        self.skipped_files.insert(file.to_string())
    }

    /// Route a record through the filter: suppressed records only count
    /// towards the skipped-file total.
    pub fn ingest(&mut self, record: &StatementRecord, filter: &IgnoreFilter) {
        if filter.is_ignored(record.file()) {
            if self.skip(record) {
                info!("Skipping {}", record.file());
            }
        } else {
            self.add(record);
        }
    }

    pub fn finish(self, mode: CoverMode) -> Aggregate {
        info!(
            "Totals stmts={} covered={}, pct={}",
            self.global.total_weight,
            self.global.covered_weight,
            self.global.pct()
        );
        Aggregate {
            mode,
            ledger: self.ledger,
            packages: self.packages,
            global: self.global,
            skipped_files: self.skipped_files.len() as u64,
        }
    }
}

/// Stream a profile through the filter and aggregator in one pass.
pub fn aggregate_profile<R: BufRead>(reader: R, filter: &IgnoreFilter) -> Result<Aggregate> {
    info!("Ignoring {} filename patterns", filter.len());
    let mut profile = ProfileReader::new(reader);
    let mut aggregator = Aggregator::new();
    for record in profile.by_ref() {
        aggregator.ingest(&record?, filter);
    }
    if profile.declared_mode().is_none() {
        warn!("profile has no mode line, assuming {}", profile.mode());
    }
    Ok(aggregator.finish(profile.mode()))
}

/// Final result of an aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub mode: CoverMode,
    pub ledger: BTreeMap<String, LedgerEntry>,
    pub packages: BTreeMap<String, Accumulator>,
    pub global: Accumulator,
    /// Number of distinct files suppressed by ignore patterns.
    pub skipped_files: u64,
}

impl Aggregate {
    pub fn global_pct(&self) -> f64 {
        self.global.pct()
    }

    pub fn package_pcts(&self) -> BTreeMap<String, f64> {
        self.packages
            .iter()
            .map(|(name, acc)| (name.clone(), acc.pct()))
            .collect()
    }

    pub fn package_count(&self) -> usize {
        self.packages.len()
    }

    /// Packages in which no statement was ever executed.
    pub fn uncovered_package_count(&self) -> usize {
        self.packages
            .values()
            .filter(|acc| acc.covered_weight == 0)
            .count()
    }

    pub fn snapshot(&self, commit_id: Option<&str>) -> CoverageSnapshot {
        CoverageSnapshot {
            format_version: FORMAT_VERSION,
            global_pct: self.global_pct(),
            per_package: self.package_pcts(),
            skipped_count: self.skipped_files,
            commit_id: commit_id.map(str::to_owned),
        }
    }

    /// Write the deduplicated ledger as a canonical profile.
    pub fn write_merged<W: Write>(&self, out: W) -> Result<()> {
        writer::write_profile(out, self.mode, &self.ledger)
    }
}
