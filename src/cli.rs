//! Command handler functions for the covtrend CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write as _};
use std::path::Path;

use anyhow::{Context, Result};
use clap::ValueEnum;
use rusqlite::Connection;

use crate::aggregate::aggregate_profile;
use crate::db;
use crate::delta::Comparison;
use crate::ignore::IgnoreFilter;
use crate::report::{self, CoverageReport, MarkdownFormatter, TextFormatter};
use crate::runner::{GoToolchain, SystemExec};
use crate::snapshot;

/// Output style for the `compare` command.
#[derive(Clone, ValueEnum)]
pub enum Style {
    Text,
    Markdown,
}

/// Aggregate an existing profile without running tests.
pub fn cmd_aggregate(
    profile: &Path,
    output: Option<&Path>,
    ignore_patterns: &[String],
    snapshot_out: Option<&Path>,
    commit: Option<&str>,
) -> Result<String> {
    let filter = IgnoreFilter::new(ignore_patterns)?;
    let file = File::open(profile)
        .with_context(|| format!("Failed to open {}", profile.display()))?;
    let aggregate = aggregate_profile(BufReader::new(file), &filter)?;

    if let Some(path) = output {
        let mut out = BufWriter::new(
            File::create(path).with_context(|| format!("Failed to create {}", path.display()))?,
        );
        aggregate.write_merged(&mut out)?;
        out.flush()?;
    }

    if let Some(path) = snapshot_out {
        let blob = snapshot::encode(&aggregate.snapshot(commit))?;
        std::fs::write(path, blob)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let mut out = String::new();
    writeln!(out, "Mode:       {}", aggregate.mode).unwrap();
    writeln!(
        out,
        "Packages:   {} ({} with zero coverage)",
        aggregate.package_count(),
        aggregate.uncovered_package_count()
    )
    .unwrap();
    writeln!(
        out,
        "Statements: {}/{} ({:.1}%)",
        aggregate.global.covered_weight,
        aggregate.global.total_weight,
        aggregate.global_pct()
    )
    .unwrap();
    if aggregate.skipped_files > 0 {
        writeln!(out, "Ignored:    {} files", aggregate.skipped_files).unwrap();
    }

    writeln!(out).unwrap();
    writeln!(out, "{:<60} {:>8} {:>8} {:>8}", "PACKAGE", "STMTS", "COVERED", "RATE").unwrap();
    writeln!(out, "{}", "-".repeat(88)).unwrap();
    for (name, acc) in &aggregate.packages {
        writeln!(
            out,
            "{:<60} {:>8} {:>8} {:>7.1}%",
            name,
            acc.total_weight,
            acc.covered_weight,
            acc.pct()
        )
        .unwrap();
    }

    Ok(out)
}

/// Render a report for two stored snapshot blobs.
#[allow(clippy::too_many_arguments)]
pub fn cmd_compare(
    current: &Path,
    prior: Option<&Path>,
    prior_commit: Option<&str>,
    commit: Option<&str>,
    threshold: f64,
    notes_ref: &str,
    report_url: Option<&str>,
    style: &Style,
) -> Result<String> {
    let current_blob = std::fs::read_to_string(current)
        .with_context(|| format!("Failed to read {}", current.display()))?;
    let mut current = snapshot::decode(&current_blob)
        .with_context(|| format!("Invalid snapshot in {}", current.display()))?;
    current.commit_id = commit.map(str::to_owned);

    let prior = match prior {
        Some(path) => {
            let blob = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let mut prior = snapshot::decode(&blob)
                .with_context(|| format!("Invalid snapshot in {}", path.display()))?;
            prior.commit_id = prior_commit.map(str::to_owned);
            Some(prior)
        }
        None => None,
    };

    let report = CoverageReport {
        commit: commit.map(str::to_owned),
        comparison: Comparison::compare(prior.as_ref(), &current),
        current,
        threshold,
        report_url: report_url.map(str::to_owned),
    };

    Ok(match style {
        Style::Text => report.format(&TextFormatter),
        Style::Markdown => report.format(&MarkdownFormatter {
            marker: report::comment_marker(notes_ref),
        }),
    })
}

/// Total coverage as computed by `go tool cover -func`.
pub fn cmd_total(profile: &Path, working_dir: &Path) -> Result<String> {
    let go = GoToolchain::new(SystemExec::new(working_dir));
    let total = go
        .func_total(profile)
        .context("Failed to summarize coverage profile")?;
    Ok(format!("{total:.1}%\n"))
}

/// Recorded snapshots in a history database, oldest first.
pub fn cmd_history(conn: &Connection) -> Result<String> {
    let rows = db::list_snapshots(conn)?;
    if rows.is_empty() {
        return Ok("No coverage history recorded.\n".to_string());
    }
    let mut out = String::new();
    writeln!(out, "{:<42} {:<26} {:>8}", "COMMIT", "RECORDED", "COVERAGE").unwrap();
    writeln!(out, "{}", "-".repeat(78)).unwrap();
    for row in &rows {
        let pct = match snapshot::decode(&row.blob) {
            Ok(s) => format!("{:.1}%", s.global_pct),
            Err(_) => "-".to_string(),
        };
        writeln!(out, "{:<42} {:<26} {:>8}", row.commit_id, row.created_at, pct).unwrap();
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SnapshotStore;

    const PROFILE: &str = "mode: count\n\
        example.com/a/a.go:1.1,2.2 2 3\n\
        example.com/a/a.go:1.1,2.2 2 1\n\
        example.com/a/a.go:3.1,4.2 2 0\n\
        example.com/b/b.go:1.1,2.2 4 0\n\
        example.com/b/b_mock.go:1.1,2.2 4 0\n";

    #[test]
    fn test_cmd_aggregate() {
        let dir = tempfile::tempdir().unwrap();
        let profile = dir.path().join("go.cov");
        let merged = dir.path().join("merged.cov");
        let snap = dir.path().join("snapshot.json");
        std::fs::write(&profile, PROFILE).unwrap();

        let out = cmd_aggregate(
            &profile,
            Some(&merged),
            &["_mock\\.go$".to_string()],
            Some(&snap),
            Some("abc"),
        )
        .unwrap();

        assert!(out.contains("Mode:       count"));
        assert!(out.contains("Packages:   2 (1 with zero coverage)"));
        assert!(out.contains("Statements: 2/8 (25.0%)"));
        assert!(out.contains("Ignored:    1 files"));

        assert_eq!(
            std::fs::read_to_string(&merged).unwrap(),
            "mode: count\n\
             example.com/a/a.go:1.1,2.2 2 4\n\
             example.com/a/a.go:3.1,4.2 2 0\n\
             example.com/b/b.go:1.1,2.2 4 0\n"
        );
        let stored = snapshot::decode(&std::fs::read_to_string(&snap).unwrap()).unwrap();
        assert_eq!(stored.global_pct, 25.0);
        assert_eq!(stored.skipped_count, 1);
    }

    #[test]
    fn test_cmd_aggregate_missing_file() {
        let err = cmd_aggregate(Path::new("/nonexistent/go.cov"), None, &[], None, None).unwrap_err();
        assert!(err.to_string().contains("Failed to open"));
    }

    #[test]
    fn test_cmd_compare() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("current.json");
        let prior = dir.path().join("prior.json");
        std::fs::write(
            &current,
            r#"{"go-coverage-action-fmt":1,"coverage_pct":60.0,"pkg_stats":{"a":[60.0]},"skipped_count":0}"#,
        )
        .unwrap();
        std::fs::write(
            &prior,
            r#"{"go-coverage-action-fmt":1,"coverage_pct":50.0,"pkg_stats":{"a":[50.0]},"skipped_count":0}"#,
        )
        .unwrap();

        let md = cmd_compare(
            &current,
            Some(&prior),
            Some("old"),
            Some("new"),
            0.0,
            "gocoverage",
            None,
            &Style::Markdown,
        )
        .unwrap();
        assert!(md.starts_with(
            "<!-- gocoverage -->:arrow_up: Test coverage increased from 50.0% to 60.0% compared to old."
        ));

        let text = cmd_compare(&current, None, None, None, 70.0, "gocoverage", None, &Style::Text)
            .unwrap();
        assert!(text.contains("Previous: none"));
        assert!(text.contains("(NOT met)"));
    }

    #[test]
    fn test_cmd_compare_rejects_unversioned_blob() {
        let dir = tempfile::tempdir().unwrap();
        let current = dir.path().join("current.json");
        std::fs::write(&current, r#"{"coverage_pct":60.0,"pkg_stats":{}}"#).unwrap();
        let err = cmd_compare(&current, None, None, None, 0.0, "g", None, &Style::Text).unwrap_err();
        assert!(err.to_string().contains("Invalid snapshot"));
    }

    #[test]
    fn test_cmd_history() {
        let store = db::SqliteStore::new(Connection::open_in_memory().unwrap()).unwrap();
        assert_eq!(
            cmd_history(store.connection()).unwrap(),
            "No coverage history recorded.\n"
        );

        store
            .put("c1", r#"{"go-coverage-action-fmt":1,"coverage_pct":42.5,"pkg_stats":{},"skipped_count":0}"#)
            .unwrap();
        store.put("c2", "garbage").unwrap();
        let out = cmd_history(store.connection()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[2].starts_with("c1 "));
        assert!(lines[2].ends_with("42.5%"));
        assert!(lines[3].ends_with('-'));
    }
}
