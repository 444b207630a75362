//! Step outputs (`key=value` lines) and the job summary.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::delta::Comparison;
use crate::error::Result;
use crate::report::CoverageReport;

/// Ordered step outputs. Keys that do not apply are left out entirely
/// rather than written empty.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outputs {
    entries: Vec<(&'static str, String)>,
}

impl Outputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &'static str, value: impl ToString) {
        let value = value.to_string();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Coverage figures from a finished report.
    pub fn from_report(report: &CoverageReport) -> Self {
        let mut outputs = Outputs::new();
        outputs.set("coverage-pct", report.current.global_pct);
        outputs.set("package-count", report.package_count());
        outputs.set("uncovered-packages", report.uncovered_packages().len());
        if let Comparison::Against {
            prior_commit,
            prior_pct,
            global_delta,
            ..
        } = &report.comparison
        {
            outputs.set("coverage-delta", global_delta);
            outputs.set("coverage-last-pct", prior_pct);
            if let Some(sha) = prior_commit {
                outputs.set("coverage-last-sha", sha);
            }
        }
        outputs.set("meets-threshold", report.meets_threshold());
        outputs
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.iter() {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Write to `$GITHUB_OUTPUT` when set, otherwise to stdout.
    pub fn publish(&self) -> Result<()> {
        match std::env::var_os("GITHUB_OUTPUT").filter(|p| !p.is_empty()) {
            Some(path) => self.append_to(Path::new(&path)),
            None => {
                print!("{}", self.render());
                Ok(())
            }
        }
    }

    pub fn append_to(&self, path: &Path) -> Result<()> {
        debug!("writing {} outputs to {}", self.entries.len(), path.display());
        append(path, &self.render())
    }
}

/// Append rendered markdown to `$GITHUB_STEP_SUMMARY` when set.
pub fn append_step_summary(markdown: &str) -> Result<()> {
    if let Some(path) = std::env::var_os("GITHUB_STEP_SUMMARY").filter(|p| !p.is_empty()) {
        append(Path::new(&path), markdown)?;
    }
    Ok(())
}

fn append(path: &Path, text: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(text.as_bytes())?;
    if !text.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    Ok(())
}
