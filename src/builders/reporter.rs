use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;

use crate::builders::classifier::Violation;
use crate::core::config::FileRole;

/// The lint outcome for a single file.
///
/// This provides a clean way to pass file-specific data from the `LintEngine`
/// to a `ViolationReporter`.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Path relative to the project root, `/`-separated.
    pub path: String,
    /// Override layers that applied to the file.
    pub roles: Vec<FileRole>,
    /// Number of import declarations found.
    pub import_count: usize,
    pub violations: Vec<Violation>,
    /// Set when the file could not be linted at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.error.is_none()
    }
}

/// Totals across a set of reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files: usize,
    pub files_with_violations: usize,
    pub violations: usize,
    pub errors: usize,
}

impl Summary {
    pub fn of(reports: &[FileReport]) -> Self {
        reports.iter().fold(Summary::default(), |mut summary, report| {
            summary.files += 1;
            summary.violations += report.violations.len();
            if !report.violations.is_empty() {
                summary.files_with_violations += 1;
            }
            if report.error.is_some() {
                summary.errors += 1;
            }
            summary
        })
    }
}

pub trait ViolationReporter {
    /// Renders the reports to a string.
    fn render_report(&self, reports: &[FileReport]) -> Result<String>;

    /// Prints the rendered report to standard output.
    fn generate_report(&self, reports: &[FileReport]) -> Result<()> {
        print!("{}", self.render_report(reports)?);
        Ok(())
    }
}

/// A concrete implementation of `ViolationReporter` that prints a human
/// readable report to the console.
///
/// This is the default reporter used by the `check` command.
pub struct ConsoleReporter {
    verbose: bool,
}

impl ConsoleReporter {
    /// Constructs a new `ConsoleReporter`. In verbose mode clean files are
    /// listed too.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// A private helper function to format the header line for a single file.
    fn format_file_line(&self, report: &FileReport) -> String {
        // 🔴: violations found, ⚠️: could not be linted, 🟢: clean.
        let status_icon = if report.error.is_some() {
            "⚠️ "
        } else if report.violations.is_empty() {
            "🟢"
        } else {
            "🔴"
        };

        let mut line = format!(
            "{} {} ({} imports",
            status_icon,
            report.path.bold(),
            report.import_count
        );
        if !report.violations.is_empty() {
            line.push_str(&format!(", {} violations", report.violations.len()));
        }
        line.push(')');
        if !report.roles.is_empty() && self.verbose {
            let roles: Vec<String> = report.roles.iter().map(|r| r.to_string()).collect();
            line.push_str(&format!(" [{}]", roles.join(", ")));
        }
        line
    }

    fn format_violation(&self, violation: &Violation) -> String {
        let specifier = violation
            .specifier
            .as_deref()
            .map(|s| format!(" ({s})"))
            .unwrap_or_default();
        format!(
            "  {:>4}  {}  {}{}",
            violation.line,
            violation.rule.to_string().yellow(),
            violation.message,
            specifier.dimmed()
        )
    }
}

/// Implementation of the `ViolationReporter` trait for `ConsoleReporter`.
impl ViolationReporter for ConsoleReporter {
    fn render_report(&self, reports: &[FileReport]) -> Result<String> {
        let mut out = String::new();
        out.push_str("📋 Import Order Report\n");
        out.push_str("======================\n");

        if reports.is_empty() {
            out.push_str("No files to check.\n");
            return Ok(out);
        }

        for report in reports {
            if report.is_clean() && !self.verbose {
                continue;
            }
            out.push_str(&self.format_file_line(report));
            out.push('\n');
            if let Some(error) = &report.error {
                out.push_str(&format!("  {}\n", error.red()));
            }
            for violation in &report.violations {
                out.push_str(&self.format_violation(violation));
                out.push('\n');
            }
        }

        let summary = Summary::of(reports);
        out.push_str("\n📈 Summary:\n");
        out.push_str(&format!("  Files checked: {}\n", summary.files));
        out.push_str(&format!(
            "  Files with violations: {}\n",
            summary.files_with_violations
        ));
        out.push_str(&format!("  Total violations: {}\n", summary.violations));
        if summary.errors > 0 {
            out.push_str(&format!("  Files not linted: {}\n", summary.errors));
        }
        if summary.violations == 0 && summary.errors == 0 {
            out.push_str(&format!("{}\n", "✓ All imports are in order.".green().bold()));
        }

        Ok(out)
    }
}

/// Emits the reports and their summary as one JSON document.
pub struct JsonReporter;

impl JsonReporter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    files: &'a [FileReport],
    summary: Summary,
}

impl ViolationReporter for JsonReporter {
    fn render_report(&self, reports: &[FileReport]) -> Result<String> {
        let document = JsonDocument {
            files: reports,
            summary: Summary::of(reports),
        };
        let mut json =
            serde_json::to_string_pretty(&document).context("Failed to serialize report")?;
        json.push('\n');
        Ok(json)
    }
}
