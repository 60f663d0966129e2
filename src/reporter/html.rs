//! Self-contained HTML report generator.
//!
//! One page, embedded CSS, no scripts. Sections mirror the markdown
//! report: status banner, summary cards, recommendations, issue tables
//! and conversion warnings.

use crate::audit::{AuditIssue, AuditStatus};
use crate::config::Config;
use crate::error::Result;
use crate::reporter::{Report, ReportGenerator};
use crate::types::Severity;
use std::fmt::Write as _;

/// HTML report generator.
pub struct HtmlReporter {
    verbose: bool,
}

impl HtmlReporter {
    /// Create a new HTML reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            verbose: config.output.verbose,
        }
    }
}

impl ReportGenerator for HtmlReporter {
    fn generate(&self, report: &Report<'_>) -> Result<String> {
        Ok(generate_html_report(report, self.verbose))
    }
}

fn generate_html_report(report: &Report<'_>, verbose: bool) -> String {
    let audit = report.audit;
    let summary = &audit.summary;
    let version = env!("CARGO_PKG_VERSION");
    let timestamp = audit.generated_at.format("%Y-%m-%d %H:%M:%S UTC");
    let source = html_escape(report.source);

    let (status_class, status_icon, status_text) = match audit.status {
        AuditStatus::Pass => ("status-pass", "✔", "pass"),
        AuditStatus::Warning => ("status-warning", "⚠", "warning"),
        AuditStatus::Fail => ("status-fail", "✖", "fail"),
    };

    let mut cards = vec![
        ("Nodes", summary.total_nodes),
        ("Devices", summary.devices),
        ("Boundaries", summary.boundaries),
        ("Edges", summary.total_edges),
    ];
    if let Some(history) = report.history {
        cards.push(("New", history.new_resources));
        cards.push(("Collisions", history.collisions));
    }
    let cards_html: String = cards
        .iter()
        .map(|(label, value)| {
            format!(
                r#"<div class="card"><div class="card-value">{value}</div><div class="card-label">{label}</div></div>"#
            )
        })
        .collect();

    let mut recommendations_html = String::new();
    if !audit.recommendations.is_empty() {
        recommendations_html.push_str(r#"<section><h2>Recommendations</h2><ol class="recs">"#);
        for rec in &audit.recommendations {
            let _ = write!(
                recommendations_html,
                r#"<li><span class="pill {}">{}</span> {}</li>"#,
                severity_class(rec.priority),
                rec.category,
                html_escape(&rec.message)
            );
        }
        recommendations_html.push_str("</ol></section>");
    }

    let mut issues_html = issues_table("Critical Issues", &audit.critical_issues);
    issues_html.push_str(&issues_table("Warnings", &audit.warnings));
    if verbose {
        issues_html.push_str(&issues_table("Info", &audit.info));
    }

    let mut warnings_html = String::new();
    if !report.warnings.is_empty() {
        warnings_html.push_str("<section><h2>Conversion Warnings</h2><ul class=\"warnings\">");
        for warning in report.warnings {
            let _ = write!(
                warnings_html,
                "<li><code>{}</code> {}</li>",
                warning.kind,
                html_escape(&warning.message)
            );
        }
        warnings_html.push_str("</ul></section>");
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>PlanTopo Audit - {status_text}</title>
    <style>
{css}
    </style>
</head>
<body>
    <main>
        <div class="banner {status_class}">
            <span class="banner-icon">{status_icon}</span>
            <div>
                <h1>Integrity audit: {status_text}</h1>
                <p>{source}</p>
            </div>
        </div>
        <div class="counts">
            <span class="count critical">{critical} critical</span>
            <span class="count warning">{warnings} warnings</span>
            <span class="count info">{info} info</span>
        </div>
        <div class="cards">{cards_html}</div>
        {recommendations_html}
        {issues_html}
        {warnings_html}
        <footer>PlanTopo v{version} &middot; {timestamp}</footer>
    </main>
</body>
</html>
"#,
        css = get_css(),
        critical = summary.critical,
        warnings = summary.warnings,
        info = summary.info,
    )
}

fn issues_table(title: &str, issues: &[AuditIssue]) -> String {
    if issues.is_empty() {
        return String::new();
    }
    let mut html = format!(
        "<section><h2>{title}</h2><table><thead><tr><th>Category</th><th>Nodes</th><th>Message</th>\
         <th>Suggested action</th></tr></thead><tbody>"
    );
    for issue in issues {
        let nodes = issue
            .node_ids
            .iter()
            .map(|id| format!("<code>{}</code>", html_escape(id)))
            .collect::<Vec<_>>()
            .join(" ");
        let auto = if issue.auto_fixable {
            r#" <span class="pill auto">auto</span>"#
        } else {
            ""
        };
        let _ = write!(
            html,
            r#"<tr><td><span class="pill {}">{}</span></td><td>{nodes}</td><td>{}</td><td>{}{auto}</td></tr>"#,
            severity_class(issue.severity),
            issue.category,
            html_escape(&issue.message),
            html_escape(&issue.suggested_action),
        );
    }
    html.push_str("</tbody></table></section>");
    html
}

const fn severity_class(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "critical",
        Severity::Warning => "warning",
        Severity::Info => "info",
    }
}

fn get_css() -> &'static str {
    r"
:root {
    --bg: #0a0e17;
    --panel: #111827;
    --border: #374151;
    --text: #f9fafb;
    --muted: #9ca3af;
    --pass: #10b981;
    --warning: #f59e0b;
    --critical: #ef4444;
    --info: #3b82f6;
    --font-sans: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    --font-mono: 'JetBrains Mono', 'Fira Code', Consolas, monospace;
    --radius: 8px;
}
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: var(--font-sans); background: var(--bg); color: var(--text); line-height: 1.6; }
main { max-width: 1100px; margin: 0 auto; padding: 2rem; }
h1 { font-size: 1.5rem; }
h2 { font-size: 1.15rem; margin: 2rem 0 0.75rem; }
code { font-family: var(--font-mono); font-size: 0.85em; color: var(--muted); }
.banner { display: flex; gap: 1rem; align-items: center; padding: 1.25rem; border-radius: var(--radius); border: 1px solid var(--border); }
.banner-icon { font-size: 2rem; }
.status-pass { border-color: var(--pass); }
.status-warning { border-color: var(--warning); }
.status-fail { border-color: var(--critical); }
.counts { display: flex; gap: 1rem; margin: 1rem 0; }
.count.critical { color: var(--critical); }
.count.warning { color: var(--warning); }
.count.info { color: var(--info); }
.cards { display: grid; grid-template-columns: repeat(auto-fill, minmax(140px, 1fr)); gap: 0.75rem; }
.card { background: var(--panel); border: 1px solid var(--border); border-radius: var(--radius); padding: 1rem; text-align: center; }
.card-value { font-size: 1.75rem; font-weight: 700; }
.card-label { color: var(--muted); font-size: 0.85rem; }
table { width: 100%; border-collapse: collapse; background: var(--panel); border-radius: var(--radius); }
th, td { text-align: left; padding: 0.5rem 0.75rem; border-bottom: 1px solid var(--border); vertical-align: top; }
th { color: var(--muted); font-weight: 600; }
.pill { display: inline-block; padding: 0 0.5rem; border-radius: 999px; font-size: 0.8rem; border: 1px solid currentColor; }
.pill.critical { color: var(--critical); }
.pill.warning { color: var(--warning); }
.pill.info { color: var(--info); }
.pill.auto { color: var(--pass); }
.recs, .warnings { padding-left: 1.5rem; }
.recs li, .warnings li { margin: 0.35rem 0; }
footer { margin-top: 3rem; color: var(--muted); font-size: 0.8rem; }
"
}

/// Escape HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
