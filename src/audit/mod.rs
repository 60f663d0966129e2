//! Integrity audit of a final topology.
//!
//! The auditor is the single pass/fail gate of an import. It runs every
//! validator against the final node and edge set, sorts what they find
//! into severity buckets and derives an overall status:
//!
//! | Status    | Condition                          |
//! |-----------|------------------------------------|
//! | `fail`    | at least one critical issue        |
//! | `warning` | no critical issue, some warnings   |
//! | `pass`    | neither                            |
//!
//! Info-level findings never change the status.

use crate::analyzer::Dependency;
use crate::catalog::Catalog;
use crate::config::Config;
use crate::graph::{Edge, Node, NodeId, NodeKind};
use crate::types::Severity;
use crate::validate::{
    connection, BoundaryValidationResult, BoundaryValidator, Collision, ConnectionValidationResult, RepairAction,
    ViolationKind,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// What an audit issue is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueCategory {
    Duplicate,
    Connection,
    Hierarchy,
    Boundary,
    Orphan,
}

impl std::fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Duplicate => write!(f, "duplicate"),
            Self::Connection => write!(f, "connection"),
            Self::Hierarchy => write!(f, "hierarchy"),
            Self::Boundary => write!(f, "boundary"),
            Self::Orphan => write!(f, "orphan"),
        }
    }
}

/// A single audit finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditIssue {
    pub severity: Severity,
    pub category: IssueCategory,
    pub node_ids: Vec<NodeId>,
    pub message: String,
    pub suggested_action: String,
    pub auto_fixable: bool,
}

impl AuditIssue {
    fn new(severity: Severity, category: IssueCategory, node_ids: Vec<NodeId>, message: String) -> Self {
        Self {
            severity,
            category,
            node_ids,
            message,
            suggested_action: String::new(),
            auto_fixable: false,
        }
    }

    fn action(mut self, action: impl Into<String>, auto_fixable: bool) -> Self {
        self.suggested_action = action.into();
        self.auto_fixable = auto_fixable;
        self
    }
}

/// Overall audit verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Pass,
    Warning,
    Fail,
}

impl std::fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Warning => write!(f, "warning"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Counts over the audited topology.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total_nodes: usize,
    pub devices: usize,
    pub boundaries: usize,
    pub total_edges: usize,
    pub valid_edges: usize,
    pub critical: usize,
    pub warnings: usize,
    pub info: usize,
    pub auto_fixable: usize,
}

/// A human-readable next step covering every issue of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: IssueCategory,
    /// Highest severity among the grouped issues
    pub priority: Severity,
    pub issue_count: usize,
    pub auto_fixable: usize,
    pub message: String,
}

/// The structured audit report. Every rendered report is derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrityAuditReport {
    pub generated_at: DateTime<Utc>,
    pub status: AuditStatus,
    pub summary: AuditSummary,
    pub critical_issues: Vec<AuditIssue>,
    pub warnings: Vec<AuditIssue>,
    pub info: Vec<AuditIssue>,
    pub recommendations: Vec<Recommendation>,
    pub boundary: BoundaryValidationResult,
    pub connections: ConnectionValidationResult,
}

impl IntegrityAuditReport {
    /// All issues, most severe first.
    pub fn issues(&self) -> impl Iterator<Item = &AuditIssue> {
        self.critical_issues.iter().chain(&self.warnings).chain(&self.info)
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.status == AuditStatus::Pass
    }
}

/// Extra inputs the audit can use besides the final graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuditContext<'a> {
    /// Dependencies of the import, used to find missing boundaries
    pub dependencies: &'a [Dependency],
    /// Collisions still waiting for a user decision
    pub pending_collisions: &'a [Collision],
}

/// Runs every check against a final topology.
#[derive(Debug, Clone)]
pub struct IntegrityAuditor {
    catalog: Catalog,
    boundaries: BoundaryValidator,
}

impl IntegrityAuditor {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            catalog: Catalog::new(&config.conversion),
            boundaries: BoundaryValidator::new(config.audit.max_hierarchy_depth, config.layout.clone()),
        }
    }

    /// Audit `nodes` and `edges`.
    #[must_use]
    pub fn audit(&self, nodes: &[Node], edges: &[Edge], context: &AuditContext<'_>) -> IntegrityAuditReport {
        let boundary = self.boundaries.validate(nodes, context.dependencies);
        let connections = connection::validate(nodes, edges);

        let mut issues = Vec::new();
        check_duplicates(nodes, context.pending_collisions, &mut issues);
        check_connections(&connections, &mut issues);
        check_hierarchy(&boundary, &mut issues);
        check_missing_boundaries(&boundary, &mut issues);
        self.check_orphans(nodes, edges, &mut issues);

        let mut critical_issues = Vec::new();
        let mut warnings = Vec::new();
        let mut info = Vec::new();
        for issue in issues {
            match issue.severity {
                Severity::Critical => critical_issues.push(issue),
                Severity::Warning => warnings.push(issue),
                Severity::Info => info.push(issue),
            }
        }

        let status = if !critical_issues.is_empty() {
            AuditStatus::Fail
        } else if !warnings.is_empty() {
            AuditStatus::Warning
        } else {
            AuditStatus::Pass
        };

        let summary = AuditSummary {
            total_nodes: nodes.len(),
            devices: nodes.iter().filter(|n| n.is_device()).count(),
            boundaries: nodes.iter().filter(|n| n.is_boundary()).count(),
            total_edges: edges.len(),
            valid_edges: connections.valid_count(),
            critical: critical_issues.len(),
            warnings: warnings.len(),
            info: info.len(),
            auto_fixable: critical_issues
                .iter()
                .chain(&warnings)
                .chain(&info)
                .filter(|i| i.auto_fixable)
                .count(),
        };

        let recommendations = recommend(critical_issues.iter().chain(&warnings).chain(&info));

        tracing::info!(
            status = %status,
            critical = summary.critical,
            warnings = summary.warnings,
            info = summary.info,
            "Integrity audit complete"
        );

        IntegrityAuditReport {
            generated_at: Utc::now(),
            status,
            summary,
            critical_issues,
            warnings,
            info,
            recommendations,
            boundary,
            connections,
        }
    }

    fn check_orphans(&self, nodes: &[Node], edges: &[Edge], issues: &mut Vec<AuditIssue>) {
        let connected: HashSet<&str> = edges
            .iter()
            .flat_map(|e| [e.source.as_str(), e.target.as_str()])
            .collect();

        for node in nodes.iter().filter(|n| n.is_device() && n.parent_id.is_none()) {
            let standalone = node
                .terraform_type
                .as_deref()
                .is_some_and(|t| self.catalog.is_standalone(t));
            if standalone {
                continue;
            }
            if connected.contains(node.id.as_str()) {
                issues.push(
                    AuditIssue::new(
                        Severity::Info,
                        IssueCategory::Orphan,
                        vec![node.id.clone()],
                        format!("'{}' is connected but not placed in any boundary", node.id),
                    )
                    .action("Move it into the boundary it belongs to", false),
                );
            } else {
                issues.push(
                    AuditIssue::new(
                        Severity::Warning,
                        IssueCategory::Orphan,
                        vec![node.id.clone()],
                        format!("'{}' has no connections and no boundary", node.id),
                    )
                    .action("Connect it or place it in a boundary", false),
                );
            }
        }

        for node in nodes {
            if let NodeKind::Device { device_type, .. } = &node.kind {
                if device_type == "unclassified" {
                    issues.push(
                        AuditIssue::new(
                            Severity::Info,
                            IssueCategory::Orphan,
                            vec![node.id.clone()],
                            format!(
                                "'{}' has an unrecognized type ({})",
                                node.id,
                                node.terraform_type.as_deref().unwrap_or("unknown")
                            ),
                        )
                        .action("Set a device type manually", false),
                    );
                }
            }
        }
    }
}

fn check_duplicates(nodes: &[Node], pending: &[Collision], issues: &mut Vec<AuditIssue>) {
    let mut by_id: BTreeMap<&str, usize> = BTreeMap::new();
    let mut by_external: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for node in nodes {
        *by_id.entry(node.id.as_str()).or_default() += 1;
        if let Some(external) = node.external_id.as_deref() {
            let ids = by_external.entry(external).or_default();
            if !ids.contains(&node.id.as_str()) {
                ids.push(&node.id);
            }
        }
    }

    for (id, count) in by_id.into_iter().filter(|(_, c)| *c > 1) {
        issues.push(
            AuditIssue::new(
                Severity::Critical,
                IssueCategory::Duplicate,
                vec![id.to_string()],
                format!("Node id '{id}' appears {count} times"),
            )
            .action("Keep one node per id", false),
        );
    }

    for (external, ids) in by_external.into_iter().filter(|(_, ids)| ids.len() > 1) {
        issues.push(
            AuditIssue::new(
                Severity::Critical,
                IssueCategory::Duplicate,
                ids.iter().map(|s| (*s).to_string()).collect(),
                format!("{} nodes share external id '{external}'", ids.len()),
            )
            .action("Delete the extra nodes or re-import with --on-collision replace", false),
        );
    }

    for collision in pending {
        issues.push(
            AuditIssue::new(
                Severity::Warning,
                IssueCategory::Duplicate,
                vec![collision.existing_node_id.clone()],
                format!(
                    "'{}' matches existing node '{}' by {} and awaits a decision",
                    collision.address, collision.existing_node_id, collision.strategy
                ),
            )
            .action("Choose skip, replace or create_new for this resource", false),
        );
    }
}

fn check_connections(connections: &ConnectionValidationResult, issues: &mut Vec<AuditIssue>) {
    for issue in &connections.issues {
        issues.push(
            AuditIssue::new(
                Severity::Critical,
                IssueCategory::Connection,
                vec![issue.source.clone(), issue.target.clone()],
                format!("Invalid {} connection {} -> {}", issue.class, issue.source, issue.target),
            )
            .action(describe_repair(&issue.repair), issue.repair.is_automatic()),
        );
    }
}

fn describe_repair(repair: &RepairAction) -> String {
    match repair {
        RepairAction::Remove { reason } => format!("Remove the edge ({reason})"),
        RepairAction::Reroute { source, target, .. } => format!("Reroute the edge to {source} -> {target}"),
        RepairAction::ConvertToContainment { child, parent } => {
            format!("Drop the edge and keep '{child}' inside '{parent}'")
        }
        RepairAction::ManualReview { reason } => format!("Review manually: {reason}"),
    }
}

fn check_hierarchy(boundary: &BoundaryValidationResult, issues: &mut Vec<AuditIssue>) {
    for violation in &boundary.violations {
        let (severity, action) = match violation.kind {
            ViolationKind::Cycle => (Severity::Critical, "Break the cycle by clearing one parent link"),
            ViolationKind::LevelInversion => (Severity::Warning, "Swap the nesting of the two boundaries"),
            ViolationKind::DanglingParent => (Severity::Warning, "Clear the parent or import the missing boundary"),
            ViolationKind::DeviceAsParent => (Severity::Warning, "Move the node into a boundary"),
            ViolationKind::ExcessiveDepth => (Severity::Warning, "Flatten the boundary hierarchy"),
        };
        issues.push(
            AuditIssue::new(severity, IssueCategory::Hierarchy, violation.node_ids.clone(), violation.message.clone())
                .action(action, false),
        );
    }

    for id in &boundary.multi_parent_devices {
        issues.push(
            AuditIssue::new(
                Severity::Warning,
                IssueCategory::Hierarchy,
                vec![id.clone()],
                format!("'{id}' claims more than one parent"),
            )
            .action("Keep a single parent boundary", false),
        );
    }
}

fn check_missing_boundaries(boundary: &BoundaryValidationResult, issues: &mut Vec<AuditIssue>) {
    for missing in &boundary.missing_boundaries {
        let action = if missing.can_auto_create {
            format!("Create {} '{}'", missing.boundary_type, missing.label)
        } else {
            format!("A {} labelled '{}' already exists; link it manually", missing.boundary_type, missing.label)
        };
        issues.push(
            AuditIssue::new(
                Severity::Warning,
                IssueCategory::Boundary,
                missing.referenced_by.clone(),
                format!(
                    "'{}' is referenced by {} resource(s) but was never imported",
                    missing.address,
                    missing.referenced_by.len()
                ),
            )
            .action(action, missing.can_auto_create),
        );
    }
}

/// Group issues by category, most urgent category first.
fn recommend<'a>(issues: impl Iterator<Item = &'a AuditIssue>) -> Vec<Recommendation> {
    let mut groups: HashMap<IssueCategory, (Severity, usize, usize)> = HashMap::new();
    for issue in issues {
        let entry = groups.entry(issue.category).or_insert((issue.severity, 0, 0));
        entry.0 = entry.0.max(issue.severity);
        entry.1 += 1;
        entry.2 += usize::from(issue.auto_fixable);
    }

    let mut recommendations: Vec<Recommendation> = groups
        .into_iter()
        .map(|(category, (priority, issue_count, auto_fixable))| Recommendation {
            category,
            priority,
            issue_count,
            auto_fixable,
            message: recommendation_text(category, issue_count, auto_fixable),
        })
        .collect();
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.category.cmp(&b.category)));
    recommendations
}

fn recommendation_text(category: IssueCategory, count: usize, auto_fixable: usize) -> String {
    match category {
        IssueCategory::Duplicate => {
            format!("Resolve {count} duplicate finding(s) so each resource maps to exactly one node")
        }
        IssueCategory::Connection => format!(
            "Fix {count} invalid connection(s); {auto_fixable} can be repaired automatically with `import --repair`"
        ),
        IssueCategory::Hierarchy => {
            format!("Correct {count} containment problem(s) so every parent chain ends at a root")
        }
        IssueCategory::Boundary => {
            format!("Add {count} missing boundary(ies); {auto_fixable} can be created automatically")
        }
        IssueCategory::Orphan => format!("Review {count} unplaced or unrecognized resource(s)"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Relationship;
    use crate::graph::BoundaryType;
    use pretty_assertions::assert_eq;

    fn auditor() -> IntegrityAuditor {
        IntegrityAuditor::new(&Config::default())
    }

    fn typed(mut node: Node, resource_type: &str) -> Node {
        node.terraform_type = Some(resource_type.to_string());
        node
    }

    fn clean() -> (Vec<Node>, Vec<Edge>) {
        let nodes = vec![
            Node::boundary("aws_vpc.main", BoundaryType::NetworkSegment),
            Node::boundary("aws_subnet.a", BoundaryType::SecurityZone).with_parent("aws_vpc.main"),
            typed(Node::device("aws_instance.web", "server").with_parent("aws_subnet.a"), "aws_instance"),
            typed(Node::device("aws_db_instance.db", "database").with_parent("aws_subnet.a"), "aws_db_instance"),
            typed(Node::device("aws_s3_bucket.logs", "storage"), "aws_s3_bucket"),
        ];
        let edges = vec![Edge::new("aws_instance.web", "aws_db_instance.db", Relationship::Network)];
        (nodes, edges)
    }

    #[test]
    fn test_clean_topology_passes() {
        let (nodes, edges) = clean();
        let report = auditor().audit(&nodes, &edges, &AuditContext::default());
        assert_eq!(report.status, AuditStatus::Pass);
        assert!(report.passed());
        assert_eq!(report.summary.total_nodes, 5);
        assert_eq!(report.summary.valid_edges, 1);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_boundary_edge_fails_audit() {
        let (nodes, mut edges) = clean();
        edges.push(Edge::new("aws_instance.web", "aws_subnet.a", Relationship::Network));
        let report = auditor().audit(&nodes, &edges, &AuditContext::default());

        assert_eq!(report.status, AuditStatus::Fail);
        assert_eq!(report.critical_issues.len(), 1);
        let issue = &report.critical_issues[0];
        assert_eq!(issue.category, IssueCategory::Connection);
        assert!(issue.auto_fixable);
        assert!(issue.suggested_action.contains("redundant with containment"));
    }

    #[test]
    fn test_orphan_is_warning_unless_standalone() {
        let (mut nodes, edges) = clean();
        nodes.push(typed(Node::device("aws_instance.lonely", "server"), "aws_instance"));
        let report = auditor().audit(&nodes, &edges, &AuditContext::default());

        assert_eq!(report.status, AuditStatus::Warning);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].node_ids, vec!["aws_instance.lonely".to_string()]);
        // The unplaced S3 bucket is standalone and never reported.
        assert!(report.issues().all(|i| !i.node_ids.contains(&"aws_s3_bucket.logs".to_string())));
    }

    #[test]
    fn test_shared_external_id_is_critical() {
        let (mut nodes, edges) = clean();
        nodes[2].external_id = Some("hashicorp/aws:aws_instance:web::0000abcd".to_string());
        nodes[3].external_id = nodes[2].external_id.clone();
        let report = auditor().audit(&nodes, &edges, &AuditContext::default());
        assert_eq!(report.status, AuditStatus::Fail);
        assert_eq!(report.critical_issues[0].category, IssueCategory::Duplicate);
        assert_eq!(report.critical_issues[0].node_ids.len(), 2);
    }

    #[test]
    fn test_cycle_is_critical_and_grouped() {
        let nodes = vec![
            Node::boundary("a", BoundaryType::Custom).with_parent("b"),
            Node::boundary("b", BoundaryType::Custom).with_parent("a"),
        ];
        let report = auditor().audit(&nodes, &[], &AuditContext::default());
        assert_eq!(report.status, AuditStatus::Fail);
        assert!(report.critical_issues.iter().all(|i| i.category == IssueCategory::Hierarchy));
        assert_eq!(report.recommendations[0].category, IssueCategory::Hierarchy);
        assert_eq!(report.recommendations[0].priority, Severity::Critical);
    }

    #[test]
    fn test_recommendations_ordered_by_priority() {
        let (mut nodes, mut edges) = clean();
        nodes.push(typed(Node::device("aws_instance.lonely", "server"), "aws_instance"));
        edges.push(Edge::new("aws_vpc.main", "aws_instance.web", Relationship::Network));
        let report = auditor().audit(&nodes, &edges, &AuditContext::default());

        let order: Vec<_> = report.recommendations.iter().map(|r| r.category).collect();
        assert_eq!(order, vec![IssueCategory::Connection, IssueCategory::Orphan]);
        assert_eq!(report.summary.auto_fixable, 1);
    }
}
