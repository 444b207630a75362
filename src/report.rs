//! Rendering of coverage results for people: a markdown comment for pull
//! requests and job summaries, and a plain-text summary for the console.

use std::fmt::Write;

use crate::delta::Comparison;
use crate::model::{CoverageSnapshot, DeltaEntry};

const PACKAGE_HEADER: &str = "Package Name";

/// Everything a formatter needs, already computed.
#[derive(Debug, Clone)]
pub struct CoverageReport {
    /// Commit the current figures belong to.
    pub commit: Option<String>,
    pub current: CoverageSnapshot,
    pub comparison: Comparison,
    /// Minimum acceptable global coverage, in percent.
    pub threshold: f64,
    /// Link to an externally hosted HTML report.
    pub report_url: Option<String>,
}

impl CoverageReport {
    #[must_use]
    pub fn meets_threshold(&self) -> bool {
        self.current.global_pct >= self.threshold
    }

    pub fn package_count(&self) -> usize {
        self.current.per_package.len()
    }

    pub fn uncovered_packages(&self) -> Vec<&str> {
        self.current.uncovered_packages()
    }

    /// Format using a specific formatter.
    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }
}

/// Trait for formatting coverage reports.
pub trait ReportFormatter {
    /// Format the report to a string.
    fn format(&self, report: &CoverageReport) -> String;
}

/// Markdown formatter for PR comments and job summaries.
pub struct MarkdownFormatter {
    /// Hidden token that lets a later run find and replace this comment.
    pub marker: String,
}

impl MarkdownFormatter {
    /// Marker derived from the history ref name, e.g. `<!-- gocoverage -->`.
    pub fn for_notes_ref(notes_ref: &str) -> Self {
        Self {
            marker: comment_marker(notes_ref),
        }
    }
}

pub fn comment_marker(notes_ref: &str) -> String {
    format!("<!-- {notes_ref} -->")
}

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &CoverageReport) -> String {
        let mut md = String::new();
        md.push_str(&self.marker);
        write_headline(&mut md, report);
        md.push('\n');

        let uncovered = report.uncovered_packages();
        if !uncovered.is_empty() {
            let zero = uncovered.len();
            let total = report.package_count();
            writeln!(
                md,
                "\n<details><summary>:warning: {zero} of {total} packages have zero coverage.</summary>\n"
            )
            .unwrap();
            for name in &uncovered {
                writeln!(md, "* {name}").unwrap();
            }
            md.push_str("\n</details>\n");
        }

        if !report.meets_threshold() {
            let threshold = report.threshold;
            writeln!(
                md,
                "\n:no_entry: Coverage does not meet minimum requirement of {threshold:.1}%."
            )
            .unwrap();
        }

        if let Some(url) = report.report_url.as_deref().filter(|u| !u.is_empty()) {
            writeln!(md, "\n[View full coverage report]({url})").unwrap();
        }

        if let Comparison::Against { packages, .. } = &report.comparison {
            if packages.is_empty() {
                md.push_str("\nNo change in coverage for any package.\n");
            } else {
                md.push_str("\nUpdated Package Coverages:\n\n");
                write_delta_table(&mut md, packages);
            }
        }

        md.push_str("\n<details><summary>View coverage for all packages</summary>\n\n");
        write_package_table(&mut md, &report.current);
        md.push_str("</details>\n");

        md
    }
}

fn write_headline(md: &mut String, report: &CoverageReport) {
    let current = report.current.global_pct;
    match &report.comparison {
        Comparison::NoHistory => {
            write!(md, ":arrow_right: Test coverage: {current:.1}%").unwrap();
            if let Some(sha) = &report.commit {
                write!(md, " for commit {sha}").unwrap();
            }
            md.push_str(". No prior coverage found to compare against.");
        }
        Comparison::Against {
            prior_commit,
            prior_pct,
            global_delta,
            ..
        } => {
            let against = prior_commit.as_deref().unwrap_or("the previous run");
            if *global_delta > 0.0 {
                write!(
                    md,
                    ":arrow_up: Test coverage increased from {prior_pct:.1}% to {current:.1}% compared to {against}."
                )
                .unwrap();
            } else if *global_delta < 0.0 {
                write!(
                    md,
                    ":arrow_down: Test coverage decreased from {prior_pct:.1}% to {current:.1}% compared to {against}."
                )
                .unwrap();
            } else {
                write!(
                    md,
                    ":arrow_right: Test coverage stayed the same at {current:.1}% compared to {against}."
                )
                .unwrap();
            }
        }
    }

    let skipped = report.current.skipped_count;
    if skipped > 0 {
        write!(md, " <i>({skipped} ignored files)</i>").unwrap();
    }
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(str::len).chain([PACKAGE_HEADER.len()]).max().unwrap_or(0)
}

fn write_delta_table(md: &mut String, packages: &[DeltaEntry]) {
    let width = name_width(packages.iter().map(|d| d.package.as_str()));
    md.push_str("```diff\n");
    writeln!(md, "# {PACKAGE_HEADER:<width$} |  Prior |    New").unwrap();
    for entry in packages {
        let sign = if entry.improved() { '+' } else { '-' };
        writeln!(
            md,
            "{sign} {:<width$} | {:>5.1}% | {:>5.1}%",
            entry.package, entry.prior_pct, entry.new_pct
        )
        .unwrap();
    }
    md.push_str("```\n");
}

fn write_package_table(md: &mut String, snapshot: &CoverageSnapshot) {
    let width = name_width(snapshot.per_package.keys().map(String::as_str));
    md.push_str("```diff\n");
    writeln!(md, "# {PACKAGE_HEADER:<width$} | Coverage").unwrap();
    for (name, pct) in &snapshot.per_package {
        let sign = if *pct > 0.0 { '+' } else { '-' };
        writeln!(md, "{sign} {name:<width$} |   {pct:>5.1}%").unwrap();
    }
    md.push_str("```\n");
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &CoverageReport) -> String {
        let mut out = String::new();

        let pct = report.current.global_pct;
        let packages = report.package_count();
        let zero = report.uncovered_packages().len();
        writeln!(
            out,
            "Coverage: {pct:.1}% ({packages} packages, {zero} with zero coverage)"
        )
        .unwrap();

        match &report.comparison {
            Comparison::NoHistory => out.push_str("Previous: none (no prior coverage found)\n"),
            Comparison::Against {
                prior_commit,
                prior_pct,
                global_delta,
                packages,
            } => {
                let at = prior_commit.as_deref().unwrap_or("unknown commit");
                writeln!(
                    out,
                    "Previous: {prior_pct:.1}% at {at} (delta {global_delta:+.1})"
                )
                .unwrap();
                for entry in packages {
                    let sign = if entry.improved() { '+' } else { '-' };
                    writeln!(
                        out,
                        "  {sign} {}  {:.1}% -> {:.1}%",
                        entry.package, entry.prior_pct, entry.new_pct
                    )
                    .unwrap();
                }
            }
        }

        if report.current.skipped_count > 0 {
            writeln!(out, "Ignored files: {}", report.current.skipped_count).unwrap();
        }

        let threshold = report.threshold;
        let status = if report.meets_threshold() { "met" } else { "NOT met" };
        writeln!(out, "Minimum required: {threshold:.1}% ({status})").unwrap();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn snapshot(global_pct: f64, per_package: &[(&str, f64)], skipped: u64) -> CoverageSnapshot {
        CoverageSnapshot {
            format_version: 1,
            global_pct,
            per_package: per_package
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
            skipped_count: skipped,
            commit_id: None,
        }
    }

    fn report(current: CoverageSnapshot, prior: Option<CoverageSnapshot>) -> CoverageReport {
        let comparison = Comparison::compare(prior.as_ref(), &current);
        CoverageReport {
            commit: Some("cafef00d".to_string()),
            current,
            comparison,
            threshold: 0.0,
            report_url: None,
        }
    }

    fn prior(global_pct: f64, per_package: &[(&str, f64)]) -> CoverageSnapshot {
        let mut s = snapshot(global_pct, per_package, 0);
        s.commit_id = Some("beef".to_string());
        s
    }

    fn markdown(report: &CoverageReport) -> String {
        report.format(&MarkdownFormatter::for_notes_ref("gocoverage"))
    }

    #[test]
    fn test_no_history_headline() {
        let r = report(snapshot(72.3, &[("a", 72.3)], 0), None);
        let md = markdown(&r);
        assert!(md.starts_with(
            "<!-- gocoverage -->:arrow_right: Test coverage: 72.3% for commit cafef00d. No prior coverage found to compare against.\n"
        ));
        assert!(!md.contains("No change in coverage"));
        assert!(!md.contains("Updated Package Coverages"));
    }

    #[test]
    fn test_increase_headline_and_table() {
        let r = report(
            snapshot(60.0, &[("example.com/a", 60.0), ("b", 40.0)], 0),
            Some(prior(50.0, &[("example.com/a", 50.0), ("b", 45.0)])),
        );
        let md = markdown(&r);
        assert!(md.contains(
            ":arrow_up: Test coverage increased from 50.0% to 60.0% compared to beef."
        ));
        assert!(md.contains("Updated Package Coverages:\n\n```diff\n"));
        assert!(md.contains("# Package Name  |  Prior |    New\n"));
        assert!(md.contains("- b             |  45.0% |  40.0%\n"));
        assert!(md.contains("+ example.com/a |  50.0% |  60.0%\n"));
        // lexical order
        assert!(md.find("- b ").unwrap() < md.find("+ example.com/a |  50.0%").unwrap());
    }

    #[test]
    fn test_decrease_headline() {
        let r = report(snapshot(40.0, &[("a", 40.0)], 0), Some(prior(50.0, &[("a", 40.0)])));
        let md = markdown(&r);
        assert!(md.contains(":arrow_down: Test coverage decreased from 50.0% to 40.0% compared to beef."));
        assert!(md.contains("\nNo change in coverage for any package.\n"));
    }

    #[test]
    fn test_unchanged_headline() {
        let r = report(snapshot(40.0, &[("a", 40.0)], 3), Some(prior(40.0, &[("a", 40.0)])));
        let md = markdown(&r);
        assert!(md.contains(
            ":arrow_right: Test coverage stayed the same at 40.0% compared to beef. <i>(3 ignored files)</i>"
        ));
    }

    #[test]
    fn test_zero_coverage_section() {
        let r = report(
            snapshot(30.0, &[("a", 0.0), ("b", 60.0), ("c", 0.0)], 0),
            None,
        );
        let md = markdown(&r);
        assert!(md.contains(
            "<details><summary>:warning: 2 of 3 packages have zero coverage.</summary>\n\n* a\n* c\n\n</details>\n"
        ));
    }

    #[test]
    fn test_threshold_warning() {
        let mut r = report(snapshot(55.0, &[("a", 55.0)], 0), None);
        r.threshold = 80.0;
        assert!(!r.meets_threshold());
        assert!(markdown(&r).contains(":no_entry: Coverage does not meet minimum requirement of 80.0%."));

        r.threshold = 55.0;
        assert!(r.meets_threshold());
        assert!(!markdown(&r).contains(":no_entry:"));
    }

    #[test]
    fn test_report_url() {
        let mut r = report(snapshot(55.0, &[("a", 55.0)], 0), None);
        r.report_url = Some("https://example.com/cov.html".to_string());
        assert!(markdown(&r).contains("[View full coverage report](https://example.com/cov.html)"));
    }

    #[test]
    fn test_all_packages_listing() {
        let r = report(snapshot(50.0, &[("zeta", 0.0), ("alpha", 100.0)], 0), None);
        let md = markdown(&r);
        assert!(md.contains("<details><summary>View coverage for all packages</summary>\n\n```diff\n"));
        assert!(md.contains("# Package Name | Coverage\n"));
        assert!(md.contains("+ alpha        |   100.0%\n"));
        assert!(md.contains("- zeta         |     0.0%\n"));
        assert!(md.ends_with("```\n</details>\n"));
    }

    #[test]
    fn test_markdown_is_deterministic() {
        let build = || {
            report(
                snapshot(60.0, &[("a", 60.0), ("b", 0.0)], 1),
                Some(prior(50.0, &[("a", 50.0)])),
            )
        };
        assert_eq!(markdown(&build()), markdown(&build()));
    }

    #[test]
    fn test_text_formatter() {
        let r = report(
            snapshot(60.0, &[("a", 60.0), ("b", 0.0)], 2),
            Some(prior(50.0, &[("a", 50.0)])),
        );
        let text = r.format(&TextFormatter);
        assert!(text.contains("Coverage: 60.0% (2 packages, 1 with zero coverage)"));
        assert!(text.contains("Previous: 50.0% at beef (delta +10.0)"));
        assert!(text.contains("  + a  50.0% -> 60.0%"));
        assert!(text.contains("Ignored files: 2"));
        assert!(text.contains("Minimum required: 0.0% (met)"));
    }

    #[test]
    fn test_text_formatter_no_history() {
        let r = report(snapshot(10.0, &[("a", 10.0)], 0), None);
        assert!(r.format(&TextFormatter).contains("Previous: none (no prior coverage found)"));
    }
}
