//! Canonical serialization of a deduplicated statement ledger.
//!
//! Output has the same grammar as the input profile: a mode header followed
//! by one line per distinct statement id in lexical order. Identical ledgers
//! always produce identical bytes.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::info;

use crate::error::Result;
use crate::model::{CoverMode, LedgerEntry};

/// Hit count as written to the merged profile. In `set` mode any
/// execution is reported as 1.
pub fn reported_hits(mode: CoverMode, entry: &LedgerEntry) -> u64 {
    match mode {
        CoverMode::Set => entry.cumulative_hits.min(1),
        CoverMode::Count | CoverMode::Atomic => entry.cumulative_hits,
    }
}

pub fn write_profile<W: Write>(
    mut out: W,
    mode: CoverMode,
    ledger: &BTreeMap<String, LedgerEntry>,
) -> Result<()> {
    info!("Writing {} keys", ledger.len());
    writeln!(out, "mode: {mode}")?;
    for (id, entry) in ledger {
        writeln!(out, "{id} {} {}", entry.weight, reported_hits(mode, entry))?;
    }
    out.flush()?;
    Ok(())
}

/// Render a merged profile into a `String`.
pub fn render_profile(mode: CoverMode, ledger: &BTreeMap<String, LedgerEntry>) -> Result<String> {
    let mut buf = Vec::new();
    write_profile(&mut buf, mode, ledger)?;
    String::from_utf8(buf).map_err(|e| crate::error::CovtrendError::Other(e.to_string()))
}
