//! Plain text report generator.

use crate::audit::{AuditIssue, AuditStatus};
use crate::config::Config;
use crate::error::Result;
use crate::reporter::{truncate, Report, ReportGenerator};
use crate::types::Severity;
use colored::Colorize;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::fmt::Write as _;

/// Text report generator for CLI output.
pub struct TextReporter {
    /// Whether to use colors
    use_colors: bool,
    /// Show info-level issues and every conversion warning
    verbose: bool,
}

impl TextReporter {
    /// Create a new text reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            use_colors: config.output.colored,
            verbose: config.output.verbose,
        }
    }
}

impl ReportGenerator for TextReporter {
    fn generate(&self, report: &Report<'_>) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.format_header(report));
        output.push_str(&self.format_summary(report));

        if !report.warnings.is_empty() {
            output.push_str(&self.format_warnings(report));
        }

        let issues: Vec<&AuditIssue> = report
            .audit
            .issues()
            .filter(|i| self.verbose || i.severity > Severity::Info)
            .collect();
        if !issues.is_empty() {
            output.push_str(&self.format_issues(&issues));
        }

        if !report.audit.recommendations.is_empty() {
            output.push_str(&self.format_recommendations(report));
        }

        output.push_str(&self.format_footer(report));
        Ok(output)
    }
}

impl TextReporter {
    fn section(&self, title: &str) -> String {
        let title = if self.use_colors {
            title.bright_cyan().bold().to_string()
        } else {
            title.to_string()
        };
        format!("\n{title}\n{}\n", "-".repeat(80))
    }

    fn format_header(&self, report: &Report<'_>) -> String {
        let title = "PlanTopo Integrity Audit";
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        let timestamp = report.audit.generated_at.format("%Y-%m-%d %H:%M:%S UTC");

        if self.use_colors {
            format!(
                "\n{} {} {}\n{}\n{}\n",
                title.bright_white().bold(),
                version.dimmed(),
                format!("({timestamp})").dimmed(),
                report.source.bright_white(),
                "=".repeat(80).bright_blue(),
            )
        } else {
            format!("\n{title} {version} ({timestamp})\n{}\n{}\n", report.source, "=".repeat(80))
        }
    }

    fn format_summary(&self, report: &Report<'_>) -> String {
        let summary = &report.audit.summary;
        let mut output = self.section("Summary");

        let status = report.audit.status.to_string().to_uppercase();
        let status = if self.use_colors {
            match report.audit.status {
                AuditStatus::Pass => status.green().bold().to_string(),
                AuditStatus::Warning => status.yellow().bold().to_string(),
                AuditStatus::Fail => status.red().bold().to_string(),
            }
        } else {
            status
        };
        let _ = writeln!(output, "  Status: {status}");

        if self.use_colors {
            let _ = writeln!(
                output,
                "  {} Critical | {} Warnings | {} Info",
                summary.critical.to_string().red().bold(),
                summary.warnings.to_string().yellow().bold(),
                summary.info.to_string().blue(),
            );
        } else {
            let _ = writeln!(
                output,
                "  {} Critical | {} Warnings | {} Info",
                summary.critical, summary.warnings, summary.info
            );
        }

        let _ = writeln!(
            output,
            "  {} nodes ({} devices, {} boundaries) | {} edges ({} valid)",
            summary.total_nodes, summary.devices, summary.boundaries, summary.total_edges, summary.valid_edges
        );

        if let Some(history) = report.history {
            let _ = writeln!(
                output,
                "  {} new | {} collisions ({} skipped, {} replaced, {} copied, {} pending) | {} repaired edges",
                history.new_resources,
                history.collisions,
                history.skipped,
                history.replaced,
                history.created_copies,
                history.pending,
                history.repaired_edges,
            );
        }

        output
    }

    fn format_warnings(&self, report: &Report<'_>) -> String {
        let mut output = self.section("Conversion Warnings");
        let shown = if self.verbose { report.warnings.len() } else { 10 };

        for warning in report.warnings.iter().take(shown) {
            let kind = if self.use_colors {
                warning.kind.to_string().yellow().to_string()
            } else {
                warning.kind.to_string()
            };
            let _ = writeln!(output, "  [{kind}] {}", warning.message);
        }
        if report.warnings.len() > shown {
            let more = format!("{} more (use -v to show all)", report.warnings.len() - shown);
            let more = if self.use_colors { more.dimmed().to_string() } else { more };
            let _ = writeln!(output, "  ... {more}");
        }

        output
    }

    fn format_issues(&self, issues: &[&AuditIssue]) -> String {
        let mut output = self.section("Issues");

        let mut table = Table::new();
        table
            .load_preset(comfy_table::presets::UTF8_BORDERS_ONLY)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec!["Severity", "Category", "Message", "Suggested action"]);

        for issue in issues {
            let severity = Cell::new(issue.severity.to_string());
            let severity = if self.use_colors {
                severity.fg(match issue.severity {
                    Severity::Critical => Color::Red,
                    Severity::Warning => Color::Yellow,
                    Severity::Info => Color::Blue,
                })
            } else {
                severity
            };
            let action = if issue.auto_fixable {
                format!("{} (auto)", issue.suggested_action)
            } else {
                issue.suggested_action.clone()
            };
            table.add_row(vec![
                severity,
                Cell::new(issue.category.to_string()),
                Cell::new(truncate(&issue.message, 70)),
                Cell::new(truncate(&action, 60)),
            ]);
        }

        output.push_str(&table.to_string());
        output.push('\n');
        output
    }

    fn format_recommendations(&self, report: &Report<'_>) -> String {
        let mut output = self.section("Recommendations");
        for (i, rec) in report.audit.recommendations.iter().enumerate() {
            let _ = writeln!(output, "  {}. [{}] {}", i + 1, rec.priority, rec.message);
        }
        output
    }

    fn format_footer(&self, report: &Report<'_>) -> String {
        let line = match report.audit.status {
            AuditStatus::Pass => "Topology passed all integrity checks.",
            AuditStatus::Warning => "Topology passed with warnings.",
            AuditStatus::Fail => "Topology failed integrity checks; review before accepting the import.",
        };
        if self.use_colors {
            format!("\n{}\n", line.bold())
        } else {
            format!("\n{line}\n")
        }
    }
}
