//! Boundary hierarchy validation.
//!
//! Containment is a forest built from `parent_id` links. Input is never
//! trusted: every walk up a parent chain carries a visited set and is
//! bounded by the node count, so a cycle is reported instead of followed.

use crate::analyzer::Dependency;
use crate::catalog::{self, ContainerLevel};
use crate::config::LayoutOptions;
use crate::graph::{BoundaryType, Node, NodeId, Position, Size};
use crate::plan::ResourceAddress;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Kind of structural problem in the containment hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The parent chain revisits a node
    Cycle,
    /// A coarser boundary nested inside a finer one
    LevelInversion,
    /// `parent_id` names a node that does not exist
    DanglingParent,
    /// `parent_id` names a device
    DeviceAsParent,
    /// Nesting deeper than the configured maximum
    ExcessiveDepth,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cycle => write!(f, "cycle"),
            Self::LevelInversion => write!(f, "level_inversion"),
            Self::DanglingParent => write!(f, "dangling_parent"),
            Self::DeviceAsParent => write!(f, "device_as_parent"),
            Self::ExcessiveDepth => write!(f, "excessive_depth"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyViolation {
    pub kind: ViolationKind,
    /// Affected nodes; every member for a cycle
    pub node_ids: Vec<NodeId>,
    pub message: String,
}

/// A container referenced by dependencies that has no boundary node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingBoundary {
    pub address: String,
    pub boundary_type: BoundaryType,
    pub label: String,
    /// Addresses whose dependencies point at the container
    pub referenced_by: Vec<String>,
    pub can_auto_create: bool,
}

/// A boundary that can be created to fill a gap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoCreateSuggestion {
    pub id: NodeId,
    pub address: String,
    pub boundary_type: BoundaryType,
    pub label: String,
    pub position: Position,
    pub size: Size,
    /// Unparented devices that would move into the new boundary
    pub children: Vec<NodeId>,
}

impl AutoCreateSuggestion {
    /// The boundary node this suggestion describes.
    #[must_use]
    pub fn to_node(&self) -> Node {
        let mut node = Node::boundary(self.id.clone(), self.boundary_type);
        node.label = self.label.clone();
        node.position = self.position;
        node.size = self.size;
        node.terraform_address = Some(self.address.clone());
        node
    }
}

/// Outcome of hierarchy validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundaryValidationResult {
    /// Nesting depth per boundary; `None` when the chain is cyclic
    pub depths: BTreeMap<NodeId, Option<usize>>,
    pub unparented_devices: Vec<NodeId>,
    pub multi_parent_devices: Vec<NodeId>,
    pub violations: Vec<HierarchyViolation>,
    pub missing_boundaries: Vec<MissingBoundary>,
    pub suggestions: Vec<AutoCreateSuggestion>,
}

impl BoundaryValidationResult {
    /// True when the hierarchy has no structural violations.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn cycles(&self) -> impl Iterator<Item = &HierarchyViolation> {
        self.violations.iter().filter(|v| v.kind == ViolationKind::Cycle)
    }
}

/// Validates containment.
#[derive(Debug, Clone)]
pub struct BoundaryValidator {
    max_depth: usize,
    layout: LayoutOptions,
}

impl BoundaryValidator {
    #[must_use]
    pub fn new(max_depth: usize, layout: LayoutOptions) -> Self {
        Self { max_depth, layout }
    }

    /// Validate the hierarchy of `nodes`, using `dependencies` to find
    /// containers that were referenced but never materialized.
    #[must_use]
    pub fn validate(&self, nodes: &[Node], dependencies: &[Dependency]) -> BoundaryValidationResult {
        let by_id: HashMap<&str, &Node> = nodes.iter().rev().map(|n| (n.id.as_str(), n)).collect();
        let mut result = BoundaryValidationResult::default();

        for node in nodes.iter().filter(|n| n.is_boundary()) {
            result.depths.insert(node.id.clone(), depth(node, &by_id));
        }

        self.check_links(nodes, &by_id, &mut result);
        check_cycles(nodes, &by_id, &mut result);

        for (id, depth) in &result.depths {
            if let Some(d) = depth.filter(|d| *d > self.max_depth) {
                result.violations.push(HierarchyViolation {
                    kind: ViolationKind::ExcessiveDepth,
                    node_ids: vec![id.clone()],
                    message: format!("Boundary '{id}' is nested {d} levels deep (maximum {})", self.max_depth),
                });
            }
        }

        self.find_missing(nodes, dependencies, &mut result);

        tracing::debug!(
            boundaries = result.depths.len(),
            violations = result.violations.len(),
            missing = result.missing_boundaries.len(),
            "Boundary validation complete"
        );
        result
    }

    fn check_links(&self, nodes: &[Node], by_id: &HashMap<&str, &Node>, result: &mut BoundaryValidationResult) {
        let mut parents: BTreeMap<&str, BTreeSet<Option<&str>>> = BTreeMap::new();

        for node in nodes {
            if node.is_device() {
                parents.entry(&node.id).or_default().insert(node.parent_id.as_deref());
            }

            let Some(parent_id) = node.parent_id.as_deref() else {
                continue;
            };
            let Some(parent) = by_id.get(parent_id) else {
                result.violations.push(HierarchyViolation {
                    kind: ViolationKind::DanglingParent,
                    node_ids: vec![node.id.clone()],
                    message: format!("'{}' names missing parent '{parent_id}'", node.id),
                });
                continue;
            };

            if parent.is_device() {
                result.violations.push(HierarchyViolation {
                    kind: ViolationKind::DeviceAsParent,
                    node_ids: vec![node.id.clone(), parent.id.clone()],
                    message: format!("'{}' is contained by device '{}'", node.id, parent.id),
                });
                continue;
            }

            let child_level = node.boundary_type().and_then(BoundaryType::level);
            let parent_level = parent.boundary_type().and_then(BoundaryType::level);
            if let (Some(child), Some(outer)) = (child_level, parent_level) {
                if outer > child {
                    result.violations.push(HierarchyViolation {
                        kind: ViolationKind::LevelInversion,
                        node_ids: vec![node.id.clone(), parent.id.clone()],
                        message: format!(
                            "{} '{}' is nested inside finer {} '{}'",
                            node.boundary_type().map_or_else(String::new, |t| t.to_string()),
                            node.id,
                            parent.boundary_type().map_or_else(String::new, |t| t.to_string()),
                            parent.id
                        ),
                    });
                }
            }
        }

        for (id, claimed) in parents {
            let resolvable = claimed
                .iter()
                .flatten()
                .any(|p| by_id.get(p).is_some_and(|n| n.is_boundary()));
            if claimed.len() > 1 {
                result.multi_parent_devices.push(id.to_string());
            }
            if !resolvable {
                result.unparented_devices.push(id.to_string());
            }
        }
    }

    fn find_missing(&self, nodes: &[Node], dependencies: &[Dependency], result: &mut BoundaryValidationResult) {
        let present: HashSet<&str> = nodes
            .iter()
            .flat_map(|n| [Some(n.id.as_str()), n.terraform_address.as_deref()])
            .flatten()
            .collect();
        let existing_labels: HashSet<(&str, BoundaryType)> = nodes
            .iter()
            .filter_map(|n| Some((n.label.as_str(), n.boundary_type()?)))
            .collect();

        let mut missing: BTreeMap<&str, (ContainerLevel, BTreeSet<&str>)> = BTreeMap::new();
        for dep in dependencies {
            for (container, other) in [(&dep.target, &dep.source), (&dep.source, &dep.target)] {
                if present.contains(container.as_str()) {
                    continue;
                }
                let Some(level) = ResourceAddress::parse(container)
                    .and_then(|a| catalog::container_level(&a.resource_type))
                else {
                    continue;
                };
                missing
                    .entry(container.as_str())
                    .or_insert_with(|| (level, BTreeSet::new()))
                    .1
                    .insert(other.as_str());
            }
        }

        let right_edge = nodes
            .iter()
            .map(|n| n.position.x + n.size.width)
            .fold(0.0_f64, f64::max);
        let x = right_edge + self.layout.margin;

        for (address, (level, referenced_by)) in missing {
            let boundary_type = level.boundary_type();
            let label = ResourceAddress::parse(address).map_or_else(|| address.to_string(), |a| a.name);
            let can_auto_create = !existing_labels.contains(&(label.as_str(), boundary_type));

            if can_auto_create {
                let slot = result.suggestions.len() as f64;
                let children = referenced_by
                    .iter()
                    .filter(|r| result.unparented_devices.iter().any(|d| d.as_str() == **r))
                    .map(|r| (*r).to_string())
                    .collect();
                result.suggestions.push(AutoCreateSuggestion {
                    id: format!("auto:{address}"),
                    address: address.to_string(),
                    boundary_type,
                    label: label.clone(),
                    position: Position {
                        x,
                        y: self.layout.margin + slot * (self.layout.boundary_height + self.layout.margin),
                    },
                    size: Size {
                        width: self.layout.boundary_width,
                        height: self.layout.boundary_height,
                    },
                    children,
                });
            }

            result.missing_boundaries.push(MissingBoundary {
                address: address.to_string(),
                boundary_type,
                label,
                referenced_by: referenced_by.into_iter().map(String::from).collect(),
                can_auto_create,
            });
        }
    }
}

/// Number of ancestors above `node`, or `None` if the chain is cyclic.
/// A dangling parent ends the chain.
#[must_use]
pub fn depth(node: &Node, by_id: &HashMap<&str, &Node>) -> Option<usize> {
    let mut visited: HashSet<&str> = HashSet::from([node.id.as_str()]);
    let mut current = node;
    let mut depth = 0usize;

    for _ in 0..=by_id.len() {
        let Some(parent_id) = current.parent_id.as_deref() else {
            return Some(depth);
        };
        let Some(parent) = by_id.get(parent_id) else {
            return Some(depth);
        };
        if !visited.insert(parent_id) {
            return None;
        }
        depth += 1;
        current = parent;
    }

    None
}

/// Report each containment cycle once, listing its members.
fn check_cycles(nodes: &[Node], by_id: &HashMap<&str, &Node>, result: &mut BoundaryValidationResult) {
    let mut reported: HashSet<&str> = HashSet::new();

    for node in nodes {
        if reported.contains(node.id.as_str()) {
            continue;
        }
        // Walk up until a node repeats; the repeat starts the cycle.
        let mut order: Vec<&str> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut current = node.id.as_str();
        let cycle_start = loop {
            if let Some(&at) = position.get(current) {
                break Some(at);
            }
            if order.len() > by_id.len() {
                break None;
            }
            position.insert(current, order.len());
            order.push(current);
            match by_id.get(current).and_then(|n| n.parent_id.as_deref()) {
                Some(parent) if by_id.contains_key(parent) => current = parent,
                _ => break None,
            }
        };

        let Some(start) = cycle_start else {
            continue;
        };
        let mut members: Vec<&str> = order[start..].to_vec();
        if members.iter().any(|m| reported.contains(m)) {
            continue;
        }
        reported.extend(members.iter().copied());
        members.sort_unstable();
        result.violations.push(HierarchyViolation {
            kind: ViolationKind::Cycle,
            message: format!("Containment cycle: {}", members.join(" -> ")),
            node_ids: members.into_iter().map(String::from).collect(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{DependencyMetadata, DependencyOrigin, DependencyType, Relationship};
    use crate::types::Confidence;

    fn validator() -> BoundaryValidator {
        BoundaryValidator::new(8, LayoutOptions::default())
    }

    fn dep(source: &str, target: &str) -> Dependency {
        let ty = |a: &str| ResourceAddress::parse(a).unwrap().resource_type;
        Dependency {
            source: source.to_string(),
            target: target.to_string(),
            source_type: ty(source),
            target_type: ty(target),
            dep_type: DependencyType::Network,
            relationship: Relationship::Network,
            metadata: DependencyMetadata {
                attribute_path: "subnet_id".to_string(),
                confidence: Confidence::High,
                origin: DependencyOrigin::Scan,
            },
        }
    }

    #[test]
    fn test_well_formed_hierarchy() {
        let nodes = vec![
            Node::boundary("aws_vpc.main", BoundaryType::NetworkSegment),
            Node::boundary("aws_subnet.a", BoundaryType::SecurityZone).with_parent("aws_vpc.main"),
            Node::device("aws_instance.web", "server").with_parent("aws_subnet.a"),
        ];
        let result = validator().validate(&nodes, &[]);
        assert!(result.is_valid());
        assert_eq!(result.depths["aws_vpc.main"], Some(0));
        assert_eq!(result.depths["aws_subnet.a"], Some(1));
        assert!(result.unparented_devices.is_empty());
    }

    #[test]
    fn test_cycle_is_reported_not_followed() {
        let nodes = vec![
            Node::boundary("a", BoundaryType::Custom).with_parent("c"),
            Node::boundary("b", BoundaryType::Custom).with_parent("a"),
            Node::boundary("c", BoundaryType::Custom).with_parent("b"),
            Node::boundary("d", BoundaryType::Custom).with_parent("a"),
        ];
        let result = validator().validate(&nodes, &[]);
        let cycles: Vec<_> = result.cycles().collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].node_ids, vec!["a", "b", "c"]);
        assert_eq!(result.depths["a"], None);
        assert_eq!(result.depths["d"], None);
    }

    #[test]
    fn test_self_parent_is_a_cycle() {
        let nodes = vec![Node::boundary("loop", BoundaryType::Custom).with_parent("loop")];
        let result = validator().validate(&nodes, &[]);
        assert_eq!(result.cycles().count(), 1);
    }

    #[test]
    fn test_level_inversion() {
        let nodes = vec![
            Node::boundary("aws_subnet.a", BoundaryType::SecurityZone),
            Node::boundary("aws_vpc.main", BoundaryType::NetworkSegment).with_parent("aws_subnet.a"),
        ];
        let result = validator().validate(&nodes, &[]);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].kind, ViolationKind::LevelInversion);
    }

    #[test]
    fn test_dangling_and_device_parents() {
        let nodes = vec![
            Node::device("aws_instance.a", "server").with_parent("aws_subnet.gone"),
            Node::device("aws_instance.b", "server").with_parent("aws_instance.a"),
        ];
        let result = validator().validate(&nodes, &[]);
        let kinds: Vec<_> = result.violations.iter().map(|v| v.kind).collect();
        assert!(kinds.contains(&ViolationKind::DanglingParent));
        assert!(kinds.contains(&ViolationKind::DeviceAsParent));
        assert_eq!(result.unparented_devices, vec!["aws_instance.a", "aws_instance.b"]);
    }

    #[test]
    fn test_multi_parent_device() {
        let nodes = vec![
            Node::boundary("aws_subnet.a", BoundaryType::SecurityZone),
            Node::boundary("aws_subnet.b", BoundaryType::SecurityZone),
            Node::device("aws_instance.web", "server").with_parent("aws_subnet.a"),
            Node::device("aws_instance.web", "server").with_parent("aws_subnet.b"),
        ];
        let result = validator().validate(&nodes, &[]);
        assert_eq!(result.multi_parent_devices, vec!["aws_instance.web"]);
    }

    #[test]
    fn test_excessive_depth() {
        let nodes = vec![
            Node::boundary("r", BoundaryType::Custom),
            Node::boundary("m", BoundaryType::Custom).with_parent("r"),
            Node::boundary("l", BoundaryType::Custom).with_parent("m"),
        ];
        let result = BoundaryValidator::new(1, LayoutOptions::default()).validate(&nodes, &[]);
        assert_eq!(result.violations.len(), 1);
        assert_eq!(result.violations[0].kind, ViolationKind::ExcessiveDepth);
    }

    #[test]
    fn test_missing_boundary_suggestion_placed_right() {
        let mut existing = Node::device("aws_instance.web", "server");
        existing.position = Position { x: 100.0, y: 0.0 };
        existing.size = Size { width: 120.0, height: 80.0 };
        let nodes = vec![existing];
        let deps = vec![dep("aws_instance.web", "aws_subnet.private")];

        let result = validator().validate(&nodes, &deps);
        assert_eq!(result.missing_boundaries.len(), 1);
        let missing = &result.missing_boundaries[0];
        assert_eq!(missing.boundary_type, BoundaryType::SecurityZone);
        assert_eq!(missing.label, "private");
        assert!(missing.can_auto_create);

        let suggestion = &result.suggestions[0];
        assert_eq!(suggestion.id, "auto:aws_subnet.private");
        assert_eq!(suggestion.position.x, 100.0 + 120.0 + LayoutOptions::default().margin);
        assert_eq!(suggestion.children, vec!["aws_instance.web"]);
        assert!(suggestion.to_node().is_boundary());
    }

    #[test]
    fn test_no_suggestion_when_equivalent_boundary_exists() {
        let mut manual = Node::boundary("zone-1", BoundaryType::SecurityZone);
        manual.label = "private".to_string();
        let deps = vec![dep("aws_instance.web", "aws_subnet.private")];
        let result = validator().validate(&[manual], &deps);
        assert!(!result.missing_boundaries[0].can_auto_create);
        assert!(result.suggestions.is_empty());
    }
}
