//! Run configuration. Every flag doubles as a GitHub Actions input
//! (`INPUT_<NAME>`), so the same binary works as an action step and locally.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};

use crate::error::{CovtrendError, Result};
use crate::ignore::IgnoreFilter;
use crate::model::CoverMode;

/// When a missed coverage threshold fails the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FailPolicy {
    Always,
    #[default]
    OnlyPullRequests,
    Never,
}

impl FailPolicy {
    /// Whether a threshold violation is fatal for this event.
    pub fn applies(&self, is_pull_request: bool) -> bool {
        match self {
            FailPolicy::Always => true,
            FailPolicy::OnlyPullRequests => is_pull_request,
            FailPolicy::Never => false,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Directory containing the Go module to test.
    #[arg(long, env = "INPUT_WORKING-DIRECTORY", default_value = ".")]
    pub working_directory: PathBuf,

    /// Coverage mode passed to `go test -covermode`.
    #[arg(long, env = "INPUT_COVER-MODE", value_enum, default_value_t = CoverMode::Count)]
    pub cover_mode: CoverMode,

    /// Packages to instrument (`go test -coverpkg`).
    #[arg(long, env = "INPUT_COVER-PKG")]
    pub cover_pkg: Option<String>,

    /// Extra `go test` arguments as a JSON array of strings.
    #[arg(long, env = "INPUT_TEST-ARGS", default_value = "[]")]
    pub test_args: String,

    /// Regex matched against file paths; matching files are left out.
    #[arg(long = "ignore-pattern", env = "INPUT_IGNORE-PATTERN", value_delimiter = '\n')]
    pub ignore_patterns: Vec<String>,

    /// Minimum acceptable global coverage, in percent.
    #[arg(long, env = "INPUT_COVERAGE-THRESHOLD", default_value_t = 0.0)]
    pub coverage_threshold: f64,

    /// Link to a hosted HTML report, included in the comment.
    #[arg(long, env = "INPUT_REPORT-URL")]
    pub report_url: Option<String>,

    /// Where to write the HTML report. Relative paths land in the temp dir.
    #[arg(long, env = "INPUT_REPORT-FILENAME", default_value = "go-coverage.html")]
    pub report_filename: PathBuf,

    /// Name of the git notes ref holding coverage history.
    #[arg(long, env = "INPUT_NOTES-REF", default_value = "gocoverage")]
    pub notes_ref: String,

    /// When to fail if coverage is below the threshold.
    #[arg(long, env = "INPUT_FAIL-COVERAGE", value_enum, default_value_t = FailPolicy::OnlyPullRequests)]
    pub fail_coverage: FailPolicy,

    /// Post or update a comment on the pull request.
    #[arg(long, env = "INPUT_ADD-COMMENT", default_value_t = true, action = clap::ArgAction::Set)]
    pub add_comment: bool,

    /// Scratch directory for profiles and reports.
    #[arg(long, env = "RUNNER_TEMP")]
    pub temp_dir: Option<PathBuf>,

    /// Keep history in this SQLite database instead of git notes.
    #[arg(long, env = "INPUT_HISTORY-DB")]
    pub history_db: Option<PathBuf>,

    /// Token for the GitHub API; falls back to GITHUB_TOKEN.
    #[arg(long, env = "INPUT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Validated, immutable settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub working_dir: PathBuf,
    pub cover_mode: CoverMode,
    pub cover_pkg: Option<String>,
    pub test_args: Vec<String>,
    pub ignore: IgnoreFilter,
    pub threshold: f64,
    pub report_url: Option<String>,
    pub report_path: PathBuf,
    pub temp_dir: PathBuf,
    pub notes_ref: String,
    pub fail_policy: FailPolicy,
    pub add_comment: bool,
    pub history_db: Option<PathBuf>,
    pub token: Option<String>,
}

impl RunConfig {
    pub fn from_args(args: RunArgs) -> Result<Self> {
        let test_args = decode_test_args(&args.test_args)?;
        let ignore = IgnoreFilter::new(args.ignore_patterns.as_slice())?;
        if !args.coverage_threshold.is_finite() {
            return Err(CovtrendError::Config(format!(
                "coverage threshold must be a number, got {}",
                args.coverage_threshold
            )));
        }
        if args.notes_ref.trim().is_empty() {
            return Err(CovtrendError::Config("notes ref must not be empty".into()));
        }

        let temp_dir = args.temp_dir.unwrap_or_else(std::env::temp_dir);
        let report_path = resolve_in(&temp_dir, &args.report_filename);

        Ok(Self {
            working_dir: args.working_directory,
            cover_mode: args.cover_mode,
            cover_pkg: args.cover_pkg.filter(|p| !p.trim().is_empty()),
            test_args,
            ignore,
            threshold: args.coverage_threshold,
            report_url: args.report_url.filter(|u| !u.trim().is_empty()),
            report_path,
            temp_dir,
            notes_ref: args.notes_ref.trim().to_string(),
            fail_policy: args.fail_coverage,
            add_comment: args.add_comment,
            history_db: args.history_db,
            token: args.token.filter(|t| !t.is_empty()),
        })
    }

    /// Raw profile written by `go test`.
    pub fn profile_path(&self) -> PathBuf {
        self.temp_dir.join("go.cov")
    }

    /// Deduplicated profile written after aggregation.
    pub fn aggregate_path(&self) -> PathBuf {
        self.temp_dir.join("go-aggregate.cov")
    }
}

fn resolve_in(dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        dir.join(path)
    }
}

/// Decode the `test-args` input, which must be a JSON array of strings.
pub fn decode_test_args(raw: &str) -> Result<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| {
        CovtrendError::Config(format!(
            "test-args must be a JSON array of strings, got {raw:?}: {e}"
        ))
    })
}
