//! JSON report generator.

use crate::audit::IntegrityAuditReport;
use crate::config::Config;
use crate::error::Result;
use crate::graph::ImportWarning;
use crate::reporter::{Report, ReportGenerator};
use crate::ImportHistoryRecord;
use serde::Serialize;

/// JSON report generator.
pub struct JsonReporter {
    /// Whether to pretty-print the output
    pretty: bool,
}

impl JsonReporter {
    /// Create a new JSON reporter.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            pretty: config.output.pretty,
        }
    }

    /// Render several reports as one JSON array.
    ///
    /// # Errors
    ///
    /// Returns `ReportGeneration` if serialization fails.
    pub fn generate_many(&self, reports: &[Report<'_>]) -> Result<String> {
        let documents: Vec<JsonReport<'_>> = reports.iter().map(JsonReport::from).collect();
        self.serialize(&documents)
    }

    fn serialize<T: Serialize>(&self, value: &T) -> Result<String> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };

        json.map_err(|e| {
            crate::err!(ReportGeneration {
                message: format!("Failed to serialize JSON report: {e}"),
            })
        })
    }
}

impl ReportGenerator for JsonReporter {
    fn generate(&self, report: &Report<'_>) -> Result<String> {
        self.serialize(&JsonReport::from(report))
    }
}

/// JSON report structure.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub metadata: ReportMetadata<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import: Option<&'a ImportHistoryRecord>,
    #[serde(skip_serializing_if = "no_warnings")]
    pub warnings: &'a [ImportWarning],
    pub audit: &'a IntegrityAuditReport,
}

fn no_warnings(warnings: &&[ImportWarning]) -> bool {
    warnings.is_empty()
}

/// Report metadata.
#[derive(Debug, Serialize)]
pub struct ReportMetadata<'a> {
    /// PlanTopo version
    pub version: &'static str,
    pub source: &'a str,
    /// Report generation timestamp
    pub timestamp: String,
}

impl<'a> From<&Report<'a>> for JsonReport<'a> {
    fn from(report: &Report<'a>) -> Self {
        Self {
            metadata: ReportMetadata {
                version: env!("CARGO_PKG_VERSION"),
                source: report.source,
                timestamp: report.audit.generated_at.to_rfc3339(),
            },
            import: report.history,
            warnings: report.warnings,
            audit: report.audit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::fixtures;

    #[test]
    fn test_json_report_shape() {
        let audit = fixtures::failing_audit();
        let report = Report::audit_only("topology.json", &audit);
        let json = JsonReporter::new(&Config::default()).generate(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["metadata"]["source"], "topology.json");
        assert_eq!(value["audit"]["status"], "fail");
        assert_eq!(value["audit"]["critical_issues"][0]["category"], "connection");
        assert!(value.get("import").is_none());
        assert!(value.get("warnings").is_none());
    }

    #[test]
    fn test_compact_output() {
        let audit = fixtures::failing_audit();
        let report = Report::audit_only("t", &audit);
        let mut config = Config::default();
        config.output.pretty = false;
        let json = JsonReporter::new(&config).generate(&report).unwrap();
        assert!(!json.contains('\n'));
    }
}
