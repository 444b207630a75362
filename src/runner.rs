//! External process execution: the Go toolchain and anything else the run
//! shells out to. The aggregation core never calls these directly; it only
//! consumes the profile they produce.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};

use crate::error::{CovtrendError, Result};
use crate::model::CoverMode;

/// Run a program to completion and capture its standard output.
pub trait Exec {
    fn execute(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<String>;
}

impl<E: Exec + ?Sized> Exec for &E {
    fn execute(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<String> {
        (**self).execute(program, args, stdin)
    }
}

/// Runs real processes in a fixed working directory.
#[derive(Debug, Clone)]
pub struct SystemExec {
    working_dir: PathBuf,
    env: Vec<(String, String)>,
}

impl SystemExec {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            env: Vec::new(),
        }
    }

    /// Add an environment variable for every spawned process.
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }
}

impl Exec for SystemExec {
    fn execute(&self, program: &str, args: &[String], stdin: Option<&str>) -> Result<String> {
        info!("$ {} {}", program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.working_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            });
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            CovtrendError::Other(format!("failed to run {program}: {e}"))
        })?;
        if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(input.as_bytes())?;
        }
        let output = child.wait_with_output()?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        if !stderr.trim().is_empty() {
            debug!(program, "{}", stderr.trim_end());
        }

        if !output.status.success() {
            return Err(CovtrendError::Command {
                program: program.to_string(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        Ok(stdout)
    }
}

/// `go test` and `go tool cover`.
pub struct GoToolchain<E> {
    exec: E,
}

impl<E: Exec> GoToolchain<E> {
    pub fn new(exec: E) -> Self {
        Self { exec }
    }

    pub fn version(&self) -> Result<String> {
        self.exec.execute("go", &["version".to_string()], None)
    }

    /// Run the test suite writing a coverage profile to `profile`.
    pub fn test(
        &self,
        test_args: &[String],
        mode: CoverMode,
        cover_pkg: Option<&str>,
        profile: &Path,
    ) -> Result<String> {
        let args = test_command_args(test_args, mode, cover_pkg, profile);
        let output = self.exec.execute("go", &args, None)?;
        info!("{}", output.trim_end());
        Ok(output)
    }

    /// Render the HTML coverage report.
    pub fn html_report(&self, profile: &Path, out: &Path) -> Result<()> {
        let args = vec![
            "tool".to_string(),
            "cover".to_string(),
            "-html".to_string(),
            profile.display().to_string(),
            "-o".to_string(),
            out.display().to_string(),
        ];
        self.exec.execute("go", &args, None)?;
        info!("Generated {}", out.display());
        Ok(())
    }

    /// Total coverage as summarized by `go tool cover -func`.
    pub fn func_total(&self, profile: &Path) -> Result<f64> {
        let args = vec![
            "tool".to_string(),
            "cover".to_string(),
            format!("-func={}", profile.display()),
        ];
        let output = self.exec.execute("go", &args, None)?;
        parse_func_total(&output)
    }
}

pub fn test_command_args(
    test_args: &[String],
    mode: CoverMode,
    cover_pkg: Option<&str>,
    profile: &Path,
) -> Vec<String> {
    let mut args = vec!["test".to_string()];
    args.extend(test_args.iter().cloned());
    args.push("-covermode".to_string());
    args.push(mode.to_string());
    args.push("-coverprofile".to_string());
    args.push(profile.display().to_string());
    if let Some(pkg) = cover_pkg.filter(|p| !p.is_empty()) {
        args.push("-coverpkg".to_string());
        args.push(pkg.to_string());
    }
    args.push("./...".to_string());
    args
}

/// Extract the percentage from the `total:` line of `go tool cover -func`
/// output, e.g. `total:\t(statements)\t72.3%`.
pub fn parse_func_total(output: &str) -> Result<f64> {
    let line = output
        .lines()
        .rev()
        .find(|l| l.trim_start().starts_with("total:"))
        .ok_or_else(|| CovtrendError::Format("no total line in coverage summary".to_string()))?;

    let pct = line
        .split_whitespace()
        .last()
        .and_then(|field| field.strip_suffix('%'))
        .ok_or_else(|| CovtrendError::Format(format!("malformed total line: {line}")))?;

    pct.parse::<f64>()
        .map_err(|e| CovtrendError::Format(format!("bad coverage percentage '{pct}': {e}")))
}
