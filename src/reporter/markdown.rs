//! Markdown report generator.

use crate::audit::{AuditIssue, AuditStatus};
use crate::config::Config;
use crate::error::Result;
use crate::reporter::{Report, ReportGenerator};
use std::fmt::Write as _;

/// Markdown report generator.
pub struct MarkdownReporter {
    verbose: bool,
}

impl MarkdownReporter {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            verbose: config.output.verbose,
        }
    }
}

impl ReportGenerator for MarkdownReporter {
    fn generate(&self, report: &Report<'_>) -> Result<String> {
        let audit = report.audit;
        let summary = &audit.summary;
        let mut md = String::new();

        let badge = match audit.status {
            AuditStatus::Pass => "✅ pass",
            AuditStatus::Warning => "⚠️ warning",
            AuditStatus::Fail => "❌ fail",
        };
        let _ = writeln!(md, "# Integrity Audit: `{}`\n", report.source);
        let _ = writeln!(md, "**Status:** {badge}  ");
        let _ = writeln!(md, "_Generated {} by PlanTopo v{}_\n", audit.generated_at.to_rfc3339(), env!("CARGO_PKG_VERSION"));

        md.push_str("## Summary\n\n| Metric | Count |\n|---|---:|\n");
        let mut rows = vec![
            ("Nodes", summary.total_nodes),
            ("Devices", summary.devices),
            ("Boundaries", summary.boundaries),
            ("Edges", summary.total_edges),
            ("Valid edges", summary.valid_edges),
            ("Critical issues", summary.critical),
            ("Warnings", summary.warnings),
            ("Info", summary.info),
        ];
        if let Some(history) = report.history {
            rows.extend([
                ("New resources", history.new_resources),
                ("Collisions", history.collisions),
                ("Repaired edges", history.repaired_edges),
            ]);
        }
        for (label, count) in rows {
            let _ = writeln!(md, "| {label} | {count} |");
        }
        md.push('\n');

        if !audit.recommendations.is_empty() {
            md.push_str("## Recommendations\n\n");
            for (i, rec) in audit.recommendations.iter().enumerate() {
                let _ = writeln!(md, "{}. **{}** ({}): {}", i + 1, rec.category, rec.priority, rec.message);
            }
            md.push('\n');
        }

        issue_section(&mut md, "Critical Issues", &audit.critical_issues);
        issue_section(&mut md, "Warnings", &audit.warnings);
        if self.verbose {
            issue_section(&mut md, "Info", &audit.info);
        }

        if !report.warnings.is_empty() {
            md.push_str("## Conversion Warnings\n\n");
            for warning in report.warnings {
                let _ = writeln!(md, "- `{}` {}", warning.kind, escape(&warning.message));
            }
            md.push('\n');
        }

        Ok(md)
    }
}

fn issue_section(md: &mut String, title: &str, issues: &[AuditIssue]) {
    if issues.is_empty() {
        return;
    }
    let _ = writeln!(md, "## {title}\n");
    md.push_str("| Category | Nodes | Message | Suggested action | Auto |\n|---|---|---|---|:-:|\n");
    for issue in issues {
        let nodes = issue
            .node_ids
            .iter()
            .map(|id| format!("`{id}`"))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            md,
            "| {} | {} | {} | {} | {} |",
            issue.category,
            nodes,
            escape(&issue.message),
            escape(&issue.suggested_action),
            if issue.auto_fixable { "yes" } else { "" }
        );
    }
    md.push('\n');
}

/// Keep table cells on one row.
fn escape(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
