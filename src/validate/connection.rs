//! Connection semantics validation and repair.
//!
//! Edges may only join two devices; containment lives in `parent_id`.
//! Validation classifies every edge and proposes a repair for each invalid
//! one. Repairs are advisory until [`apply_repairs`] is called.

use crate::graph::{Edge, Node, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Classification of an edge by its endpoint kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeClass {
    DeviceToDevice,
    /// Boundary to boundary where one contains the other
    BoundaryContainment,
    DeviceToBoundary,
    BoundaryToDevice,
    /// Boundary to boundary with no containment between them
    BoundaryNetwork,
    MissingEndpoint,
}

impl EdgeClass {
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::DeviceToDevice)
    }
}

impl std::fmt::Display for EdgeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DeviceToDevice => write!(f, "device_to_device"),
            Self::BoundaryContainment => write!(f, "boundary_containment"),
            Self::DeviceToBoundary => write!(f, "device_to_boundary"),
            Self::BoundaryToDevice => write!(f, "boundary_to_device"),
            Self::BoundaryNetwork => write!(f, "boundary_network"),
            Self::MissingEndpoint => write!(f, "missing_endpoint"),
        }
    }
}

/// Reason attached to removals made redundant by containment.
pub const REDUNDANT_WITH_CONTAINMENT: &str = "redundant with containment";

/// A proposed fix for an invalid edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    Remove { reason: String },
    Reroute { source: NodeId, target: NodeId, reason: String },
    ConvertToContainment { child: NodeId, parent: NodeId },
    ManualReview { reason: String },
}

impl RepairAction {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Remove { .. } => "remove",
            Self::Reroute { .. } => "reroute",
            Self::ConvertToContainment { .. } => "convert_to_containment",
            Self::ManualReview { .. } => "manual_review",
        }
    }

    /// Whether the repair can be applied without a human.
    #[must_use]
    pub const fn is_automatic(&self) -> bool {
        !matches!(self, Self::ManualReview { .. })
    }
}

/// An invalid edge and its proposed repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionIssue {
    pub edge_id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub class: EdgeClass,
    pub repair: RepairAction,
}

/// Outcome of connection validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionValidationResult {
    /// Classification of every edge, keyed by edge id
    pub classifications: BTreeMap<String, EdgeClass>,
    pub issues: Vec<ConnectionIssue>,
}

impl ConnectionValidationResult {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }

    #[must_use]
    pub fn valid_count(&self) -> usize {
        self.classifications.values().filter(|c| c.is_valid()).count()
    }
}

/// Result of applying repairs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub edges: Vec<Edge>,
    pub removed: Vec<String>,
    pub rerouted: Vec<String>,
    pub untouched: Vec<String>,
}

/// Classify every edge and propose repairs.
#[must_use]
pub fn validate(nodes: &[Node], edges: &[Edge]) -> ConnectionValidationResult {
    let view = View::new(nodes);
    let mut result = ConnectionValidationResult::default();

    for edge in edges {
        let class = view.classify(edge);
        result.classifications.insert(edge.id.clone(), class);
        if class.is_valid() {
            continue;
        }
        result.issues.push(ConnectionIssue {
            edge_id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
            class,
            repair: view.repair(edge, class),
        });
    }

    tracing::debug!(
        edges = edges.len(),
        invalid = result.issues.len(),
        "Connection validation complete"
    );
    result
}

/// Apply every automatic repair in `validation` to `edges`.
///
/// Reroutes that would produce a self loop or repeat an existing edge are
/// removed instead. Manual-review issues are left in place.
#[must_use]
pub fn apply_repairs(edges: &[Edge], validation: &ConnectionValidationResult) -> RepairOutcome {
    let repairs: HashMap<&str, &RepairAction> = validation
        .issues
        .iter()
        .map(|issue| (issue.edge_id.as_str(), &issue.repair))
        .collect();
    let mut ids: HashSet<String> = edges
        .iter()
        .filter(|e| !repairs.contains_key(e.id.as_str()))
        .map(|e| e.id.clone())
        .collect();
    let mut outcome = RepairOutcome::default();

    for edge in edges {
        match repairs.get(edge.id.as_str()) {
            None | Some(RepairAction::ManualReview { .. }) => {
                ids.insert(edge.id.clone());
                outcome.untouched.push(edge.id.clone());
                outcome.edges.push(edge.clone());
            }
            Some(RepairAction::Remove { .. } | RepairAction::ConvertToContainment { .. }) => {
                outcome.removed.push(edge.id.clone());
            }
            Some(RepairAction::Reroute { source, target, .. }) => {
                let mut rerouted = Edge::new(source.clone(), target.clone(), edge.relationship);
                rerouted.attribute_path = edge.attribute_path.clone();
                if source == target || !ids.insert(rerouted.id.clone()) {
                    outcome.removed.push(edge.id.clone());
                } else {
                    outcome.rerouted.push(edge.id.clone());
                    outcome.edges.push(rerouted);
                }
            }
        }
    }

    tracing::info!(
        removed = outcome.removed.len(),
        rerouted = outcome.rerouted.len(),
        untouched = outcome.untouched.len(),
        "Applied connection repairs"
    );
    outcome
}

struct View<'n> {
    by_id: HashMap<&'n str, &'n Node>,
    /// Devices directly inside each boundary, sorted by id
    devices_in: HashMap<&'n str, Vec<&'n str>>,
}

impl<'n> View<'n> {
    fn new(nodes: &'n [Node]) -> Self {
        let by_id: HashMap<&str, &Node> = nodes.iter().rev().map(|n| (n.id.as_str(), n)).collect();
        let mut devices_in: HashMap<&str, Vec<&str>> = HashMap::new();
        for node in nodes.iter().filter(|n| n.is_device()) {
            if let Some(parent) = node.parent_id.as_deref() {
                devices_in.entry(parent).or_default().push(&node.id);
            }
        }
        for devices in devices_in.values_mut() {
            devices.sort_unstable();
            devices.dedup();
        }
        Self { by_id, devices_in }
    }

    /// Whether `ancestor` appears on `node`'s parent chain.
    fn contains(&self, ancestor: &str, node: &str) -> bool {
        let mut seen = HashSet::new();
        let mut current = self.by_id.get(node).and_then(|n| n.parent_id.as_deref());
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            if !seen.insert(id) {
                return false;
            }
            current = self.by_id.get(id).and_then(|n| n.parent_id.as_deref());
        }
        false
    }

    fn classify(&self, edge: &Edge) -> EdgeClass {
        let (Some(source), Some(target)) = (self.by_id.get(edge.source.as_str()), self.by_id.get(edge.target.as_str()))
        else {
            return EdgeClass::MissingEndpoint;
        };
        match (source.is_boundary(), target.is_boundary()) {
            (false, false) => EdgeClass::DeviceToDevice,
            (false, true) => EdgeClass::DeviceToBoundary,
            (true, false) => EdgeClass::BoundaryToDevice,
            (true, true) if self.contains(&source.id, &target.id) || self.contains(&target.id, &source.id) => {
                EdgeClass::BoundaryContainment
            }
            (true, true) => EdgeClass::BoundaryNetwork,
        }
    }

    /// First device inside `boundary` other than `except`.
    fn device_inside(&self, boundary: &str, except: &str) -> Option<&'n str> {
        self.devices_in
            .get(boundary)?
            .iter()
            .copied()
            .find(|d| *d != except)
    }

    fn repair(&self, edge: &Edge, class: EdgeClass) -> RepairAction {
        let (source, target) = (edge.source.as_str(), edge.target.as_str());
        match class {
            EdgeClass::DeviceToDevice => RepairAction::ManualReview {
                reason: "edge is valid".to_string(),
            },
            EdgeClass::MissingEndpoint => RepairAction::ManualReview {
                reason: "edge references a node that does not exist".to_string(),
            },
            EdgeClass::DeviceToBoundary => self.repair_device_boundary(source, target, false),
            EdgeClass::BoundaryToDevice => self.repair_device_boundary(target, source, true),
            EdgeClass::BoundaryContainment => {
                let (child, parent) = if self.contains(source, target) { (target, source) } else { (source, target) };
                RepairAction::ConvertToContainment {
                    child: child.to_string(),
                    parent: parent.to_string(),
                }
            }
            EdgeClass::BoundaryNetwork => match (self.device_inside(source, ""), self.device_inside(target, "")) {
                (Some(s), Some(t)) if s != t => RepairAction::Reroute {
                    source: s.to_string(),
                    target: t.to_string(),
                    reason: "connect devices inside both boundaries".to_string(),
                },
                _ => RepairAction::Remove {
                    reason: "boundaries cannot carry connections".to_string(),
                },
            },
        }
    }

    /// Repair an edge between a device and a boundary. `boundary_first`
    /// keeps the original direction when rerouting.
    fn repair_device_boundary(&self, device: &str, boundary: &str, boundary_first: bool) -> RepairAction {
        if self.contains(boundary, device) {
            return RepairAction::Remove {
                reason: REDUNDANT_WITH_CONTAINMENT.to_string(),
            };
        }
        match self.device_inside(boundary, device) {
            Some(inner) => {
                let (source, target) = if boundary_first { (inner, device) } else { (device, inner) };
                RepairAction::Reroute {
                    source: source.to_string(),
                    target: target.to_string(),
                    reason: format!("reroute to device '{inner}' inside '{boundary}'"),
                }
            }
            None => RepairAction::Remove {
                reason: format!("no device inside '{boundary}' to connect to"),
            },
        }
    }
}
