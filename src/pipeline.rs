//! One full run: test, aggregate, record, compare, report.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};

use tracing::{info, warn};

use crate::aggregate::{aggregate_profile, Aggregate};
use crate::config::RunConfig;
use crate::db::SqliteStore;
use crate::delta::{format_signed, Comparison};
use crate::error::{CovtrendError, Result};
use crate::github::Context;
use crate::model::CoverageSnapshot;
use crate::notes::GitNotesStore;
use crate::outputs::{append_step_summary, Outputs};
use crate::report::{CoverageReport, MarkdownFormatter, ReportFormatter, TextFormatter};
use crate::runner::{Exec, GoToolchain, SystemExec};
use crate::snapshot;
use crate::store::{load_prior, SnapshotStore};

const GIT_IDENTITY: &str = "covtrend";

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub aggregate: Aggregate,
    pub report: CoverageReport,
    pub outputs: Outputs,
    /// The rendered comment, marker included.
    pub markdown: String,
}

impl RunOutcome {
    /// Message for a missed threshold, if it was missed.
    pub fn threshold_violation(&self) -> Option<String> {
        if self.report.meets_threshold() {
            return None;
        }
        Some(format!(
            "Code coverage of {:.1}% falls below minimum required coverage of {}%",
            self.report.current.global_pct, self.report.threshold
        ))
    }
}

/// Run against the real toolchain and the configured history store, then
/// publish outputs, the job summary and the pull request comment.
pub fn run(config: &RunConfig, ctx: &Context) -> Result<RunOutcome> {
    let wants_comment = config.add_comment && ctx.is_pull_request();
    if wants_comment {
        ctx.check_comment_access()?;
    }

    let exec = SystemExec::new(&config.working_dir)
        .with_env("GIT_AUTHOR_NAME", GIT_IDENTITY)
        .with_env("GIT_AUTHOR_EMAIL", "covtrend@users.noreply.github.com")
        .with_env("GIT_COMMITTER_NAME", GIT_IDENTITY)
        .with_env("GIT_COMMITTER_EMAIL", "covtrend@users.noreply.github.com");

    let outcome = match &config.history_db {
        Some(path) => {
            info!("Using coverage history database {}", path.display());
            let store = SqliteStore::open(path)?;
            run_with(config, ctx, &exec, &store)?
        }
        None => {
            let store = GitNotesStore::new(&exec, &config.notes_ref);
            run_with(config, ctx, &exec, &store)?
        }
    };

    outcome.outputs.publish()?;
    append_step_summary(&outcome.markdown)?;

    if wants_comment {
        let marker = MarkdownFormatter::for_notes_ref(&config.notes_ref).marker;
        if let Err(e) = ctx.post_comment(&marker, &outcome.markdown) {
            warn!("{e}");
        }
    }

    Ok(outcome)
}

/// The run itself, with process execution and history injected.
pub fn run_with<E: Exec>(
    config: &RunConfig,
    ctx: &Context,
    exec: &E,
    store: &dyn SnapshotStore,
) -> Result<RunOutcome> {
    fs::create_dir_all(&config.temp_dir)?;
    let go = GoToolchain::new(exec);
    info!("{}", go.version()?.trim());

    let profile_path = config.profile_path();
    go.test(
        &config.test_args,
        config.cover_mode,
        config.cover_pkg.as_deref(),
        &profile_path,
    )?;

    let profile = File::open(&profile_path).map_err(|e| {
        CovtrendError::Format(format!("cannot read {}: {e}", profile_path.display()))
    })?;
    let aggregate = aggregate_profile(BufReader::new(profile), &config.ignore)?;

    let aggregate_path = config.aggregate_path();
    let mut merged = BufWriter::new(File::create(&aggregate_path)?);
    aggregate.write_merged(&mut merged)?;
    merged.flush()?;

    go.html_report(&profile_path, &config.report_path)?;

    let commit = ctx.sha.clone();
    let current = aggregate.snapshot(commit.as_deref());

    // Look up history before recording, so this commit never compares
    // against itself.
    let prior = load_prior(store, ctx.base_ref());
    record(store, commit.as_deref(), &current)?;

    let comparison = Comparison::compare(prior.as_ref(), &current);
    if let Some(delta) = comparison.global_delta() {
        info!("Coverage delta: {}%", format_signed(delta));
    }

    let report = CoverageReport {
        commit,
        current,
        comparison,
        threshold: config.threshold,
        report_url: config.report_url.clone(),
    };
    info!("\n{}", report.format(&TextFormatter).trim_end());

    let mut outputs = Outputs::from_report(&report);
    outputs.set("gocov-pathname", profile_path.display());
    outputs.set("gocov-agg-pathname", aggregate_path.display());
    outputs.set("report-pathname", config.report_path.display());

    let markdown = MarkdownFormatter::for_notes_ref(&config.notes_ref).format(&report);

    Ok(RunOutcome {
        aggregate,
        report,
        outputs,
        markdown,
    })
}

/// Store the current snapshot. A failed write is reported but does not
/// fail the run.
fn record(
    store: &dyn SnapshotStore,
    commit: Option<&str>,
    current: &CoverageSnapshot,
) -> Result<()> {
    let Some(commit) = commit else {
        info!("No commit sha available, coverage not recorded");
        return Ok(());
    };
    let blob = snapshot::encode(current)?;
    match store.put(commit, &blob) {
        Ok(()) => info!("Recorded coverage for {commit}"),
        Err(e) => warn!("Failed to record coverage for {commit}: {e}"),
    }
    Ok(())
}
