//! # PlanTopo
//!
//! Imports Terraform/OpenTofu plan JSON into a validated network topology.
//!
//! PlanTopo reads a machine-generated change plan, recovers the
//! relationships between its resources, builds a hierarchical topology of
//! devices and containment boundaries, reconciles it against an existing
//! topology and audits the result.
//!
//! ## Pipeline
//!
//! ```text
//! plan ─▶ analyze ─▶ convert ─▶ layout ─▶ detect duplicates ─▶ merge
//!                                                                │
//!              report ◀── audit ◀── (repair connections) ◀──────┘
//! ```
//!
//! Every stage is a pure function of its inputs. Only plan parsing,
//! configuration and I/O can fail; everything else degrades to warnings
//! and audit issues so an import always completes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use plantopo::{Config, Importer, Plan, ReportFormat, Topology};
//! use plantopo::reporter::{Report, Reporter};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let importer = Importer::new(config.clone())?;
//!
//!     let plan = Plan::from_path("plan.json")?;
//!     let result = importer.import("plan.json", &plan, &Topology::default());
//!
//!     let text = Reporter::new(&config).generate(&Report::for_import(&result), ReportFormat::Text)?;
//!     println!("{text}");
//!     Ok(())
//! }
//! ```

#![warn(clippy::all, clippy::pedantic, clippy::nursery, rust_2018_idioms)]

pub mod analyzer;
pub mod audit;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod identity;
pub mod plan;
pub mod reporter;
pub mod types;
pub mod validate;

// Re-export commonly used types at crate root
pub use audit::{AuditStatus, IntegrityAuditReport};
pub use config::Config;
pub use error::{PlanTopoError, Result};
pub use graph::{Topology, TopologyFile, TopologySource};
pub use plan::Plan;
pub use types::{GraphFormat, ReportFormat, Severity};

use analyzer::{Dependency, DependencyAnalyzer};
use audit::{AuditContext, IntegrityAuditor};
use chrono::{DateTime, Utc};
use graph::{place_nodes, Edge, GraphConverter, GridLayout, ImportWarning, Layout, Node, NodeId, WarningKind};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use validate::{connection, duplicates, CollisionResolution, DuplicateDetection, MergePlan, RepairOutcome};

/// Everything one import produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    /// Existing topology with this plan merged in
    pub topology: Topology,
    pub dependencies: Vec<Dependency>,
    pub warnings: Vec<ImportWarning>,
    pub detection: DuplicateDetection,
    pub merge: MergePlan,
    /// Connection repairs, when they were applied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repairs: Option<RepairOutcome>,
    pub report: IntegrityAuditReport,
    pub history: ImportHistoryRecord,
}

impl ImportResult {
    /// Boundary nodes of the merged topology.
    pub fn boundaries(&self) -> impl Iterator<Item = &Node> {
        self.topology.nodes.iter().filter(|n| n.is_boundary())
    }

    /// Whether the audit allows automatic acceptance.
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.report.status != AuditStatus::Fail
    }
}

/// Summary of one import, kept by the storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportHistoryRecord {
    pub imported_at: DateTime<Utc>,
    /// Plan label, usually its path
    pub plan: String,
    pub new_resources: usize,
    pub collisions: usize,
    pub skipped: usize,
    pub replaced: usize,
    pub created_copies: usize,
    /// Collisions awaiting a manual decision
    pub pending: usize,
    pub nodes_added: usize,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub repaired_edges: usize,
    pub conversion_warnings: usize,
    pub status: AuditStatus,
    pub critical_issues: usize,
    pub warning_issues: usize,
    pub info_issues: usize,
}

/// Runs the import pipeline.
///
/// The importer owns its collaborators: the configured analysis stages and
/// a [`Layout`] implementation (the deterministic grid unless replaced).
/// It never touches storage; callers persist [`ImportResult::topology`].
pub struct Importer {
    config: Config,
    analyzer: DependencyAnalyzer,
    converter: GraphConverter,
    auditor: IntegrityAuditor,
    layout: Box<dyn Layout + Send + Sync>,
}

impl Importer {
    /// Create an importer with the grid layout.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValue` if the analysis options are unusable.
    pub fn new(config: Config) -> Result<Self> {
        let analyzer = DependencyAnalyzer::new(&config.analysis)?;
        Ok(Self {
            converter: GraphConverter::new(&config.conversion).with_registry(analyzer.registry().clone()),
            analyzer,
            auditor: IntegrityAuditor::new(&config),
            layout: Box::new(GridLayout),
            config,
        })
    }

    /// Replace the layout collaborator.
    #[must_use]
    pub fn with_layout(mut self, layout: impl Layout + Send + Sync + 'static) -> Self {
        self.layout = Box::new(layout);
        self
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Import one plan against an existing topology, resolving every
    /// collision with the configured default.
    #[must_use]
    pub fn import(&self, label: &str, plan: &Plan, existing: &Topology) -> ImportResult {
        self.import_with_overrides(label, plan, existing, &HashMap::new())
    }

    /// Import one plan, resolving the listed addresses with the given
    /// resolutions and everything else with the configured default.
    #[must_use]
    pub fn import_with_overrides(
        &self,
        label: &str,
        plan: &Plan,
        existing: &Topology,
        overrides: &HashMap<String, CollisionResolution>,
    ) -> ImportResult {
        let imported_at = Utc::now();
        tracing::info!(plan = %label, resources = plan.resource_changes.len(), "Importing plan");

        let dependencies = self.analyzer.analyze(plan);
        let mut conversion = self.converter.convert(plan, &dependencies, imported_at);

        if place_nodes(self.layout.as_ref(), &mut conversion.nodes, &conversion.edges, &self.config.layout) {
            conversion.warnings.push(ImportWarning::new(
                WarningKind::LayoutFallback,
                None,
                "Layout engine failed; nodes were placed on a grid",
            ));
        }

        let detection = duplicates::detect(plan, &existing.nodes, self.config.duplicates.default_resolution);
        let merge = duplicates::resolve(&detection, overrides);
        let merged = merge_into(existing, conversion.nodes, conversion.edges, &detection, &merge);
        // The audit sees node ids, not plan addresses.
        let audit_dependencies = merged.remap_dependencies(&dependencies);
        let Merged {
            nodes,
            mut edges,
            added: nodes_added,
            ..
        } = merged;

        let repairs = if self.config.import.auto_repair_connections {
            let validation = connection::validate(&nodes, &edges);
            let outcome = connection::apply_repairs(&edges, &validation);
            edges.clone_from(&outcome.edges);
            Some(outcome)
        } else {
            None
        };

        let report = self.auditor.audit(
            &nodes,
            &edges,
            &AuditContext {
                dependencies: &audit_dependencies,
                pending_collisions: &merge.manual,
            },
        );

        let history = ImportHistoryRecord {
            imported_at,
            plan: label.to_string(),
            new_resources: detection.new_resources.len(),
            collisions: detection.collisions.len(),
            skipped: merge.skip.len(),
            replaced: merge.replace.len(),
            created_copies: merge.create.len() - detection.new_resources.len(),
            pending: merge.manual.len(),
            nodes_added,
            total_nodes: nodes.len(),
            total_edges: edges.len(),
            repaired_edges: repairs.as_ref().map_or(0, |r| r.removed.len() + r.rerouted.len()),
            conversion_warnings: conversion.warnings.len(),
            status: report.status,
            critical_issues: report.critical_issues.len(),
            warning_issues: report.warnings.len(),
            info_issues: report.info.len(),
        };

        tracing::info!(
            plan = %label,
            new = history.new_resources,
            collisions = history.collisions,
            nodes = history.total_nodes,
            edges = history.total_edges,
            status = %history.status,
            "Import complete"
        );

        ImportResult {
            topology: Topology::new(nodes, edges),
            dependencies,
            warnings: conversion.warnings,
            detection,
            merge,
            repairs,
            report,
            history,
        }
    }

    /// Import independent plans in parallel, each against the same
    /// existing topology. Results keep the input order.
    #[must_use]
    pub fn import_batch(&self, plans: &[(String, Plan)], existing: &Topology) -> Vec<ImportResult> {
        plans
            .par_iter()
            .map(|(label, plan)| self.import(label, plan, existing))
            .collect()
    }

    /// Import plans one after another, each against the topology the
    /// previous import produced. The last result holds every plan.
    #[must_use]
    pub fn import_chain(&self, plans: &[(String, Plan)], existing: &Topology) -> Vec<ImportResult> {
        let mut results: Vec<ImportResult> = Vec::with_capacity(plans.len());
        for (label, plan) in plans {
            let base = results.last().map_or(existing, |r| &r.topology);
            let result = self.import(label, plan, base);
            results.push(result);
        }
        results
    }

    /// Audit a topology without importing anything.
    #[must_use]
    pub fn audit(&self, topology: &Topology) -> IntegrityAuditReport {
        self.auditor
            .audit(&topology.nodes, &topology.edges, &AuditContext::default())
    }
}

/// The merged topology plus the address remapping that produced it.
struct Merged {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    added: usize,
    /// Plan address to the id of the node that stands for it, for every
    /// address whose node id differs from it
    remap: HashMap<String, NodeId>,
}

impl Merged {
    /// Rewrite dependency endpoints onto merged node ids.
    fn remap_dependencies(&self, dependencies: &[Dependency]) -> Vec<Dependency> {
        let mapped = |address: &str| self.remap.get(address).cloned().unwrap_or_else(|| address.to_string());
        dependencies
            .iter()
            .map(|dep| Dependency {
                source: mapped(&dep.source),
                target: mapped(&dep.target),
                ..dep.clone()
            })
            .collect()
    }
}

/// Merge converted nodes and edges into a copy of `existing`.
///
/// Skipped and pending collisions keep the existing node; replaced ones
/// overwrite its attributes but keep its id and placement. Every
/// reference to a colliding address is remapped to the node that now
/// stands for it, and edges that already exist are not added again.
fn merge_into(
    existing: &Topology,
    incoming: Vec<Node>,
    incoming_edges: Vec<Edge>,
    detection: &DuplicateDetection,
    merge: &MergePlan,
) -> Merged {
    let mut nodes = existing.nodes.clone();
    let mut taken: HashSet<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
    let create: HashSet<&str> = merge.create.iter().map(String::as_str).collect();
    let replace: HashSet<&str> = merge.replace.iter().map(|c| c.address.as_str()).collect();
    // `create_new` collisions: the existing node keeps the identity.
    let copies: HashSet<&str> = create
        .iter()
        .copied()
        .filter(|address| detection.existing_references.contains_key(*address))
        .collect();

    let mut remap: HashMap<String, NodeId> = detection
        .existing_references
        .iter()
        .filter(|(address, _)| !create.contains(address.as_str()))
        .map(|(address, id)| (address.clone(), id.clone()))
        .collect();

    // Fix ids before touching parents so forward references resolve.
    for node in &incoming {
        if create.contains(node.id.as_str()) && !taken.insert(node.id.clone()) {
            let id = unique_id(&node.id, &taken);
            taken.insert(id.clone());
            remap.insert(node.id.clone(), id);
        }
    }
    let mapped = |id: &str| remap.get(id).cloned().unwrap_or_else(|| id.to_string());

    let mut added = 0;
    for mut node in incoming {
        node.parent_id = node.parent_id.as_deref().map(mapped);

        if replace.contains(node.id.as_str()) {
            let target = mapped(&node.id);
            if let Some(current) = nodes.iter_mut().find(|n| n.id == target) {
                replace_attributes(current, node);
            }
        } else if create.contains(node.id.as_str()) {
            if copies.contains(node.id.as_str()) {
                node.external_id = None;
            }
            node.id = mapped(&node.id);
            nodes.push(node);
            added += 1;
        }
    }

    let mut edges = existing.edges.clone();
    let mut edge_ids: HashSet<String> = edges.iter().map(|e| e.id.clone()).collect();
    for edge in incoming_edges {
        let (source, target) = (mapped(&edge.source), mapped(&edge.target));
        if source == target {
            continue;
        }
        let mut merged = Edge::new(source, target, edge.relationship);
        merged.attribute_path = edge.attribute_path;
        if edge_ids.insert(merged.id.clone()) {
            edges.push(merged);
        }
    }

    Merged {
        nodes,
        edges,
        added,
        remap,
    }
}

fn unique_id(base: &str, taken: &HashSet<NodeId>) -> NodeId {
    (2..)
        .map(|n| format!("{base}#{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| format!("{base}#copy"))
}

/// Overwrite `current` with the imported state of the same resource.
fn replace_attributes(current: &mut Node, incoming: Node) {
    current.kind = incoming.kind;
    current.label = incoming.label;
    if incoming.parent_id.is_some() {
        current.parent_id = incoming.parent_id;
    }
    current.external_id = incoming.external_id;
    current.external_source = incoming.external_source;
    current.last_import_timestamp = incoming.last_import_timestamp;
    current.terraform_address = incoming.terraform_address;
    current.terraform_type = incoming.terraform_type;
    current.change_type = incoming.change_type;
    current.before_attributes = incoming.before_attributes;
    current.after_attributes = incoming.after_attributes;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Relationship;
    use crate::graph::{BoundaryType, Placement};
    use crate::config::LayoutOptions;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn plan() -> Plan {
        Plan::from_json(
            &json!({
                "resource_changes": [
                    { "address": "aws_vpc.main", "type": "aws_vpc", "name": "main",
                      "provider_name": "registry.terraform.io/hashicorp/aws",
                      "change": { "actions": ["create"], "after": { "id": "vpc-1" } } },
                    { "address": "aws_subnet.a", "type": "aws_subnet", "name": "a",
                      "provider_name": "registry.terraform.io/hashicorp/aws",
                      "change": { "actions": ["create"], "after": { "id": "subnet-1", "vpc_id": "vpc-1" } } },
                    { "address": "aws_security_group.web", "type": "aws_security_group", "name": "web",
                      "provider_name": "registry.terraform.io/hashicorp/aws",
                      "change": { "actions": ["create"], "after": { "id": "sg-123", "vpc_id": "vpc-1" } } },
                    { "address": "aws_instance.web", "type": "aws_instance", "name": "web",
                      "provider_name": "registry.terraform.io/hashicorp/aws",
                      "change": { "actions": ["create"], "after": {
                          "id": "i-1", "subnet_id": "subnet-1", "vpc_security_group_ids": ["sg-123"] } } }
                ]
            })
            .to_string(),
        )
        .unwrap()
    }

    fn importer() -> Importer {
        Importer::new(Config::default()).unwrap()
    }

    #[test]
    fn test_first_import_creates_everything() {
        let result = importer().import("plan.json", &plan(), &Topology::default());
        assert_eq!(result.history.new_resources, 4);
        assert_eq!(result.history.nodes_added, 4);
        assert_eq!(result.boundaries().count(), 2);
        assert!(result
            .topology
            .edges
            .iter()
            .all(|e| e.source != "aws_subnet.a" && e.target != "aws_subnet.a"));
        let subnet = result.topology.node("aws_subnet.a").unwrap();
        assert_eq!(subnet.parent_id.as_deref(), Some("aws_vpc.main"));
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let importer = importer();
        let first = importer.import("plan.json", &plan(), &Topology::default());
        let second = importer.import("plan.json", &plan(), &first.topology);

        assert_eq!(second.history.new_resources, 0);
        assert_eq!(second.history.collisions, 4);
        assert_eq!(second.topology.nodes.len(), first.topology.nodes.len());
        assert_eq!(second.topology.edges.len(), first.topology.edges.len());
    }

    #[test]
    fn test_reimport_remaps_onto_existing_ids() {
        let mut existing = importer().import("plan.json", &plan(), &Topology::default()).topology;
        // Rename the existing instance node; identity still matches.
        for node in &mut existing.nodes {
            if node.id == "aws_instance.web" {
                node.id = "web-server".to_string();
            }
        }
        for edge in &mut existing.edges {
            let rename = |id: &str| if id == "aws_instance.web" { "web-server".to_string() } else { id.to_string() };
            *edge = Edge::new(rename(&edge.source), rename(&edge.target), edge.relationship);
        }

        let result = importer().import("plan.json", &plan(), &existing);
        assert_eq!(result.history.new_resources, 0);
        assert!(result.topology.node("aws_instance.web").is_none());
        assert_eq!(result.topology.edges.len(), existing.edges.len());
    }

    #[test]
    fn test_reimport_under_module_reports_no_missing_boundaries() {
        let importer = importer();
        let first = importer.import("plan.json", &plan(), &Topology::default());

        let mut moved = plan();
        for change in &mut moved.resource_changes {
            change.address = format!("module.net.{}", change.address);
            change.module_address = Some("module.net".to_string());
        }
        let second = importer.import("moved.json", &moved, &first.topology);

        assert_eq!(second.history.collisions, 4);
        assert_eq!(second.history.new_resources, 0);
        assert!(second
            .dependencies
            .iter()
            .any(|d| d.pair() == ("module.net.aws_subnet.a", "module.net.aws_vpc.main")));
        assert!(second.report.boundary.missing_boundaries.is_empty());
        assert!(second.report.boundary.suggestions.is_empty());
        assert_eq!(second.report.status, first.report.status);
    }

    #[test]
    fn test_network_read_through_data_source_is_suggested() {
        let plan = Plan::from_json(
            &json!({
                "resource_changes": [
                    { "address": "data.aws_vpc.main", "mode": "data", "type": "aws_vpc", "name": "main",
                      "provider_name": "registry.terraform.io/hashicorp/aws",
                      "change": { "actions": ["read"], "after": { "id": "vpc-1" } } },
                    { "address": "aws_subnet.a", "type": "aws_subnet", "name": "a",
                      "provider_name": "registry.terraform.io/hashicorp/aws",
                      "change": { "actions": ["create"], "after": { "id": "subnet-1", "vpc_id": "vpc-1" } } }
                ],
                "configuration": { "root_module": { "resources": [
                    { "address": "aws_subnet.a", "mode": "managed", "type": "aws_subnet", "name": "a",
                      "expressions": { "vpc_id": { "references": ["data.aws_vpc.main.id", "data.aws_vpc.main"] } } }
                ] } }
            })
            .to_string(),
        )
        .unwrap();

        let result = importer().import("plan.json", &plan, &Topology::default());
        assert_eq!(result.topology.nodes.len(), 1);

        let missing = &result.report.boundary.missing_boundaries;
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].address, "data.aws_vpc.main");
        assert_eq!(missing[0].boundary_type, BoundaryType::NetworkSegment);
        assert_eq!(missing[0].label, "main");
        assert_eq!(missing[0].referenced_by, vec!["aws_subnet.a".to_string()]);
        assert!(missing[0].can_auto_create);

        let suggestions = &result.report.boundary.suggestions;
        assert_eq!(suggestions.len(), 1);
        assert_eq!(suggestions[0].id, "auto:data.aws_vpc.main");
        assert!(result
            .report
            .warnings
            .iter()
            .any(|i| i.category == audit::IssueCategory::Boundary));
    }

    #[test]
    fn test_unmanaged_network_id_is_reported_missing() {
        let plan = Plan::from_json(
            &json!({
                "resource_changes": [
                    { "address": "aws_subnet.a", "type": "aws_subnet", "name": "a",
                      "provider_name": "registry.terraform.io/hashicorp/aws",
                      "change": { "actions": ["create"], "after": { "id": "subnet-1", "vpc_id": "vpc-0abc" } } }
                ]
            })
            .to_string(),
        )
        .unwrap();

        let result = importer().import("plan.json", &plan, &Topology::default());
        let missing = &result.report.boundary.missing_boundaries;
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].address, "data.aws_vpc.vpc-0abc");
        assert_eq!(missing[0].label, "vpc-0abc");
        assert_eq!(result.report.boundary.suggestions.len(), 1);
    }

    #[test]
    fn test_create_new_adds_suffixed_copy() {
        let importer = importer();
        let first = importer.import("plan.json", &plan(), &Topology::default());
        let overrides = HashMap::from([("aws_instance.web".to_string(), CollisionResolution::CreateNew)]);
        let second = importer.import_with_overrides("plan.json", &plan(), &first.topology, &overrides);

        assert_eq!(second.history.created_copies, 1);
        let copy = second.topology.node("aws_instance.web#2").unwrap();
        assert_eq!(copy.external_id, None);
        assert_eq!(copy.parent_id.as_deref(), Some("aws_subnet.a"));
        assert_eq!(second.topology.nodes.len(), first.topology.nodes.len() + 1);
    }

    #[test]
    fn test_manual_collisions_are_surfaced() {
        let importer = importer();
        let first = importer.import("plan.json", &plan(), &Topology::default());
        let overrides = HashMap::from([("aws_instance.web".to_string(), CollisionResolution::Manual)]);
        let second = importer.import_with_overrides("plan.json", &plan(), &first.topology, &overrides);

        assert_eq!(second.history.pending, 1);
        assert!(second
            .report
            .warnings
            .iter()
            .any(|i| i.category == audit::IssueCategory::Duplicate));
    }

    #[test]
    fn test_replace_keeps_id_and_position() {
        let importer = importer();
        let mut existing = importer.import("plan.json", &plan(), &Topology::default()).topology;
        for node in &mut existing.nodes {
            if node.id == "aws_instance.web" {
                node.position.x = 999.0;
                node.label = "hand-edited".to_string();
            }
        }
        let overrides = HashMap::from([("aws_instance.web".to_string(), CollisionResolution::Replace)]);
        let result = importer.import_with_overrides("plan.json", &plan(), &existing, &overrides);
        let node = result.topology.node("aws_instance.web").unwrap();
        assert_eq!(node.position.x, 999.0);
        assert_eq!(node.label, "web");
    }

    struct BrokenLayout;

    impl Layout for BrokenLayout {
        fn layout(&self, _: &[Node], _: &[Edge], _: &LayoutOptions) -> Result<HashMap<NodeId, Placement>> {
            Err(crate::err!(Layout { message: "offline".to_string() }))
        }
    }

    #[test]
    fn test_layout_failure_degrades_to_warning() {
        let importer = importer().with_layout(BrokenLayout);
        let result = importer.import("plan.json", &plan(), &Topology::default());
        assert!(result.warnings.iter().any(|w| w.kind == WarningKind::LayoutFallback));
        assert_eq!(result.history.total_nodes, 4);
    }

    #[test]
    fn test_repair_removes_boundary_edges_from_existing() {
        let mut config = Config::default();
        config.import.auto_repair_connections = true;
        let importer = Importer::new(config).unwrap();

        let mut existing = Topology::default();
        existing.nodes.push(Node::boundary("net", BoundaryType::NetworkSegment));
        existing.nodes.push(Node::device("box", "server").with_parent("net"));
        existing.edges.push(Edge::new("box", "net", Relationship::Network));

        let result = importer.import("plan.json", &plan(), &existing);
        let repairs = result.repairs.unwrap();
        assert_eq!(repairs.removed, vec![Edge::id_for("box", "net")]);
        assert!(result.topology.edges.iter().all(|e| e.target != "net"));
    }

    #[test]
    fn test_batch_keeps_order() {
        let plans = vec![("a.json".to_string(), plan()), ("b.json".to_string(), plan())];
        let results = importer().import_batch(&plans, &Topology::default());
        let labels: Vec<_> = results.iter().map(|r| r.history.plan.as_str()).collect();
        assert_eq!(labels, vec!["a.json", "b.json"]);
    }

    #[test]
    fn test_chain_builds_on_previous_result() {
        let plans = vec![("a.json".to_string(), plan()), ("b.json".to_string(), plan())];
        let results = importer().import_chain(&plans, &Topology::default());
        assert_eq!(results[0].history.new_resources, 4);
        assert_eq!(results[1].history.new_resources, 0);
        assert_eq!(results[1].history.collisions, 4);
        assert_eq!(results[1].topology.nodes.len(), 4);
    }
}
