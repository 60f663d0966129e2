//! Report generation module.
//!
//! Every format renders the same [`Report`], which wraps one
//! [`IntegrityAuditReport`]. Nothing is recomputed while rendering, so the
//! structured and human-readable outputs always agree.
//!
//! - JSON: machine-readable structured output
//! - Text: terminal output with colors and tables
//! - Markdown: document for pull requests and wikis
//! - HTML: self-contained page
//!
//! # Example
//!
//! ```rust,no_run
//! use plantopo::reporter::{Report, Reporter};
//! use plantopo::{Config, ReportFormat};
//! # fn demo(audit: &plantopo::audit::IntegrityAuditReport) -> plantopo::Result<()> {
//! let config = Config::default();
//! let report = Report::audit_only("topology.json", audit);
//! let text = Reporter::new(&config).generate(&report, ReportFormat::Markdown)?;
//! # Ok(())
//! # }
//! ```

mod html;
mod json;
mod markdown;
mod text;

use crate::audit::IntegrityAuditReport;
use crate::config::Config;
use crate::error::Result;
use crate::graph::ImportWarning;
use crate::types::ReportFormat;
use crate::{ImportHistoryRecord, ImportResult};

pub use html::HtmlReporter;
pub use json::{JsonReport, JsonReporter};
pub use markdown::MarkdownReporter;
pub use text::TextReporter;

/// What a report renders.
#[derive(Debug, Clone, Copy)]
pub struct Report<'a> {
    /// Plan label or topology path
    pub source: &'a str,
    pub audit: &'a IntegrityAuditReport,
    /// Conversion warnings of an import
    pub warnings: &'a [ImportWarning],
    /// Import counts, absent for a standalone audit
    pub history: Option<&'a ImportHistoryRecord>,
}

impl<'a> Report<'a> {
    /// Report for an import.
    #[must_use]
    pub fn for_import(result: &'a ImportResult) -> Self {
        Self {
            source: &result.history.plan,
            audit: &result.report,
            warnings: &result.warnings,
            history: Some(&result.history),
        }
    }

    /// Report for an audit of an existing topology.
    #[must_use]
    pub fn audit_only(source: &'a str, audit: &'a IntegrityAuditReport) -> Self {
        Self {
            source,
            audit,
            warnings: &[],
            history: None,
        }
    }
}

/// Report generator that supports multiple output formats.
pub struct Reporter {
    config: Config,
}

impl Reporter {
    /// Create a new reporter with the given configuration.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
        }
    }

    fn generator(&self, format: ReportFormat) -> Box<dyn ReportGenerator> {
        match format {
            ReportFormat::Json => Box::new(JsonReporter::new(&self.config)),
            ReportFormat::Text => Box::new(TextReporter::new(&self.config)),
            ReportFormat::Markdown => Box::new(MarkdownReporter::new(&self.config)),
            ReportFormat::Html => Box::new(HtmlReporter::new(&self.config)),
        }
    }

    /// Generate a report in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if report generation fails.
    pub fn generate(&self, report: &Report<'_>, format: ReportFormat) -> Result<String> {
        self.generator(format).generate(report)
    }

    /// Generate one document covering several reports. JSON output becomes
    /// an array; the other formats are concatenated.
    ///
    /// # Errors
    ///
    /// Returns an error if report generation fails.
    pub fn generate_all(&self, reports: &[Report<'_>], format: ReportFormat) -> Result<String> {
        if let [single] = reports {
            return self.generate(single, format);
        }
        if format == ReportFormat::Json {
            return JsonReporter::new(&self.config).generate_many(reports);
        }
        let generator = self.generator(format);
        let rendered = reports
            .iter()
            .map(|r| generator.generate(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(rendered.join("\n"))
    }
}

/// Trait for report generators.
pub trait ReportGenerator {
    /// Render one report.
    ///
    /// # Errors
    ///
    /// Returns an error if generation fails.
    fn generate(&self, report: &Report<'_>) -> Result<String>;
}

/// Truncate a string to at most `max` characters, marking the cut.
pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let kept: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_every_format_renders_status() {
        let audit = fixtures::failing_audit();
        let report = Report::audit_only("topology.json", &audit);
        let mut config = Config::default();
        config.output.colored = false;
        let reporter = Reporter::new(&config);

        for format in [ReportFormat::Json, ReportFormat::Text, ReportFormat::Markdown, ReportFormat::Html] {
            let rendered = reporter.generate(&report, format).unwrap();
            assert!(rendered.to_lowercase().contains("fail"), "{format:?} lacks status");
        }
    }

    #[test]
    fn test_generate_all_json_is_array() {
        let audit = fixtures::failing_audit();
        let reports = [Report::audit_only("a.json", &audit), Report::audit_only("b.json", &audit)];
        let json = Reporter::new(&Config::default())
            .generate_all(&reports, ReportFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
    }
}
