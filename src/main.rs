use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use covtrend::cli::{self, Style};
use covtrend::config::{RunArgs, RunConfig};
use covtrend::{db, github, pipeline};

/// covtrend: Go test coverage with commit-to-commit deltas.
#[derive(Parser)]
#[command(name = "covtrend", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the tests, record coverage, compare against history and report.
    Run(RunArgs),

    /// Aggregate an existing coverage profile without running tests.
    Aggregate {
        /// Profile written by `go test -coverprofile`.
        #[arg(long)]
        profile: PathBuf,

        /// Write the deduplicated profile here.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Regex matched against file paths; matching files are left out.
        #[arg(long = "ignore-pattern")]
        ignore_patterns: Vec<String>,

        /// Write the encoded snapshot here.
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Commit the snapshot belongs to.
        #[arg(long)]
        commit: Option<String>,
    },

    /// Render a report comparing two encoded snapshots.
    Compare {
        /// Snapshot for the current commit.
        #[arg(long)]
        current: PathBuf,

        /// Snapshot to compare against. If omitted, there is no history.
        #[arg(long)]
        prior: Option<PathBuf>,

        #[arg(long)]
        prior_commit: Option<String>,

        #[arg(long)]
        commit: Option<String>,

        /// Minimum acceptable coverage, in percent.
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,

        /// History ref name used in the comment marker.
        #[arg(long, default_value = "gocoverage")]
        notes_ref: String,

        #[arg(long)]
        report_url: Option<String>,

        /// Output style.
        #[arg(long, value_enum, default_value = "markdown")]
        style: Style,
    },

    /// Print total coverage as computed by `go tool cover -func`.
    Total {
        #[arg(long)]
        profile: PathBuf,

        /// Directory of the Go module the profile belongs to.
        #[arg(long, default_value = ".")]
        working_directory: PathBuf,
    },

    /// List snapshots recorded in a history database.
    History {
        /// Path to the SQLite history database.
        #[arg(long, default_value = ".covtrend.db")]
        db: PathBuf,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => cmd_run(args),
        Commands::Aggregate {
            profile,
            output,
            ignore_patterns,
            snapshot,
            commit,
        } => {
            let out = cli::cmd_aggregate(
                &profile,
                output.as_deref(),
                &ignore_patterns,
                snapshot.as_deref(),
                commit.as_deref(),
            )?;
            print!("{out}");
            Ok(())
        }
        Commands::Compare {
            current,
            prior,
            prior_commit,
            commit,
            threshold,
            notes_ref,
            report_url,
            style,
        } => {
            let out = cli::cmd_compare(
                &current,
                prior.as_deref(),
                prior_commit.as_deref(),
                commit.as_deref(),
                threshold,
                &notes_ref,
                report_url.as_deref(),
                &style,
            )?;
            print!("{out}");
            Ok(())
        }
        Commands::Total {
            profile,
            working_directory,
        } => {
            print!("{}", cli::cmd_total(&profile, &working_directory)?);
            Ok(())
        }
        Commands::History { db: path } => {
            let conn = db::open(&path).context("Failed to open history database")?;
            db::init_schema(&conn).context("Failed to initialize schema")?;
            print!("{}", cli::cmd_history(&conn)?);
            Ok(())
        }
    }
}

fn cmd_run(args: RunArgs) -> Result<()> {
    let config = RunConfig::from_args(args).context("Invalid configuration")?;
    let ctx = github::Context::from_env()
        .context("Failed to read GitHub context")?
        .with_token(config.token.clone());

    let outcome = pipeline::run(&config, &ctx)?;

    if let Some(message) = outcome.threshold_violation() {
        if config.fail_policy.applies(ctx.is_pull_request()) {
            error!("{message}");
            bail!(message);
        }
        warn!("{message}");
    }
    Ok(())
}
