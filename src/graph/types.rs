//! Topology type definitions.
//!
//! This module defines the core types of the topology graph:
//! - `Node`: a device (leaf) or a boundary (container)
//! - `Edge`: a network or security connection between two devices
//! - `TopologyGraph`: a petgraph-backed view used for traversal and export
//! - `NodeId`: unique identifier for nodes

use crate::analyzer::Relationship;
use crate::plan::ChangeType;
use chrono::{DateTime, Utc};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Unique identifier for a node in the topology.
///
/// Imported nodes use their plan address; auto-created boundaries use
/// an `auto:` prefix.
pub type NodeId = String;

/// Kind of containment a boundary represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryType {
    /// VPC / virtual network
    NetworkSegment,
    /// Subnet or other security zone
    SecurityZone,
    /// Cloud account / subscription / project
    Account,
    /// Cloud region
    Region,
    /// User-defined grouping
    Custom,
}

impl BoundaryType {
    /// Nesting level, coarsest first. A boundary may only contain boundaries
    /// of a strictly finer level. Custom boundaries have no level.
    #[must_use]
    pub fn level(self) -> Option<u8> {
        match self {
            Self::Account => Some(0),
            Self::Region => Some(1),
            Self::NetworkSegment => Some(2),
            Self::SecurityZone => Some(3),
            Self::Custom => None,
        }
    }
}

impl std::fmt::Display for BoundaryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NetworkSegment => write!(f, "network_segment"),
            Self::SecurityZone => write!(f, "security_zone"),
            Self::Account => write!(f, "account"),
            Self::Region => write!(f, "region"),
            Self::Custom => write!(f, "custom"),
        }
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// A leaf resource
    Device {
        device_type: String,
        device_subtype: String,
        icon: String,
    },
    /// A containment-only grouping
    Boundary { boundary_type: BoundaryType },
}

/// Canvas coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Canvas dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// A topology node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier
    pub id: NodeId,
    /// Device or boundary payload
    #[serde(flatten)]
    pub kind: NodeKind,
    /// Display label
    pub label: String,
    /// Containing boundary (containment, never network adjacency)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub size: Size,
    /// Content-derived identity (`ExternalResourceId::full_id`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Where the node was imported from (e.g., `terraform`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_import_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_attributes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_attributes: Option<Value>,
}

impl Node {
    /// A bare device node, mostly useful for hand-built topologies.
    #[must_use]
    pub fn device(id: impl Into<NodeId>, device_type: &str) -> Self {
        let id = id.into();
        Self::bare(
            id.clone(),
            NodeKind::Device {
                device_type: device_type.to_string(),
                device_subtype: String::new(),
                icon: "generic".to_string(),
            },
        )
    }

    /// A bare boundary node.
    #[must_use]
    pub fn boundary(id: impl Into<NodeId>, boundary_type: BoundaryType) -> Self {
        Self::bare(id.into(), NodeKind::Boundary { boundary_type })
    }

    fn bare(id: NodeId, kind: NodeKind) -> Self {
        Self {
            label: id.clone(),
            id,
            kind,
            parent_id: None,
            position: Position::default(),
            size: Size::default(),
            external_id: None,
            external_source: None,
            last_import_timestamp: None,
            terraform_address: None,
            terraform_type: None,
            change_type: None,
            before_attributes: None,
            after_attributes: None,
        }
    }

    /// Builder-style parent assignment.
    #[must_use]
    pub fn with_parent(mut self, parent: impl Into<NodeId>) -> Self {
        self.parent_id = Some(parent.into());
        self
    }

    #[must_use]
    pub const fn is_device(&self) -> bool {
        matches!(self.kind, NodeKind::Device { .. })
    }

    #[must_use]
    pub const fn is_boundary(&self) -> bool {
        matches!(self.kind, NodeKind::Boundary { .. })
    }

    /// Boundary type, if this is a boundary.
    #[must_use]
    pub fn boundary_type(&self) -> Option<BoundaryType> {
        match &self.kind {
            NodeKind::Boundary { boundary_type } => Some(*boundary_type),
            NodeKind::Device { .. } => None,
        }
    }

    /// `device` or `boundary`.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self.kind {
            NodeKind::Device { .. } => "device",
            NodeKind::Boundary { .. } => "boundary",
        }
    }
}

/// A connection between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    pub relationship: Relationship,
    /// Attribute the relationship was discovered through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_path: Option<String>,
}

impl Edge {
    /// Create an edge with the canonical id for its endpoints.
    #[must_use]
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>, relationship: Relationship) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: Self::id_for(&source, &target),
            source,
            target,
            relationship,
            attribute_path: None,
        }
    }

    /// Canonical edge id: `edge:{source}->{target}`.
    #[must_use]
    pub fn id_for(source: &str, target: &str) -> String {
        format!("edge:{source}->{target}")
    }
}

/// Petgraph-backed view over a node/edge set.
///
/// # Structure
///
/// ```text
/// TopologyGraph
/// ├── inner: DiGraph<Node, Edge>            // connections only
/// ├── node_index: HashMap<NodeId, NodeIndex>
/// └── children: HashMap<NodeId, Vec<NodeId>> // containment via parent_id
/// ```
///
/// Edges whose endpoints are missing are left out; containment never
/// appears in `inner`.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    inner: DiGraph<Node, Edge>,
    node_index: HashMap<NodeId, NodeIndex>,
    children: HashMap<NodeId, Vec<NodeId>>,
}

impl TopologyGraph {
    /// Build the view. Later duplicates of a node id are ignored.
    #[must_use]
    pub fn build(nodes: &[Node], edges: &[Edge]) -> Self {
        let mut graph = Self::default();

        for node in nodes {
            if graph.node_index.contains_key(&node.id) {
                continue;
            }
            let idx = graph.inner.add_node(node.clone());
            graph.node_index.insert(node.id.clone(), idx);
        }

        for node in nodes {
            if let Some(parent) = &node.parent_id {
                let siblings = graph.children.entry(parent.clone()).or_default();
                if !siblings.contains(&node.id) {
                    siblings.push(node.id.clone());
                }
            }
        }

        for edge in edges {
            let (Some(&from), Some(&to)) = (graph.node_index.get(&edge.source), graph.node_index.get(&edge.target)) else {
                continue;
            };
            if graph.inner.find_edge(from, to).is_none() {
                graph.inner.add_edge(from, to, edge.clone());
            }
        }

        graph
    }

    #[must_use]
    pub fn get_node(&self, id: &str) -> Option<&Node> {
        self.node_index.get(id).map(|&idx| &self.inner[idx])
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Number of connections touching the node, in either direction.
    #[must_use]
    pub fn degree(&self, id: &str) -> usize {
        self.node_index.get(id).map_or(0, |&idx| {
            self.inner.edges_directed(idx, petgraph::Direction::Outgoing).count()
                + self.inner.edges_directed(idx, petgraph::Direction::Incoming).count()
        })
    }

    /// Nodes connected to the given node, in either direction.
    #[must_use]
    pub fn neighbors(&self, id: &str) -> Vec<&Node> {
        let Some(&idx) = self.node_index.get(id) else {
            return Vec::new();
        };
        self.inner
            .neighbors_undirected(idx)
            .map(|neighbor_idx| &self.inner[neighbor_idx])
            .collect()
    }

    /// Direct children of a node, in input order.
    #[must_use]
    pub fn children(&self, id: &str) -> &[NodeId] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Nodes without a parent, or whose parent does not exist.
    pub fn roots(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|node| {
            node.parent_id
                .as_deref()
                .is_none_or(|parent| !self.node_index.contains_key(parent))
        })
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.inner.node_weights()
    }

    /// All edges with their endpoint nodes.
    pub fn edges(&self) -> impl Iterator<Item = (&Node, &Node, &Edge)> {
        self.inner.edge_references().map(|edge| {
            (
                &self.inner[edge.source()],
                &self.inner[edge.target()],
                edge.weight(),
            )
        })
    }

    /// Get the underlying petgraph for advanced operations.
    #[must_use]
    pub fn inner(&self) -> &DiGraph<Node, Edge> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (Vec<Node>, Vec<Edge>) {
        let nodes = vec![
            Node::boundary("aws_vpc.main", BoundaryType::NetworkSegment),
            Node::boundary("aws_subnet.a", BoundaryType::SecurityZone).with_parent("aws_vpc.main"),
            Node::device("aws_instance.web", "server").with_parent("aws_subnet.a"),
            Node::device("aws_db_instance.db", "database").with_parent("aws_subnet.a"),
            Node::device("aws_s3_bucket.logs", "storage"),
        ];
        let edges = vec![
            Edge::new("aws_instance.web", "aws_db_instance.db", Relationship::Network),
            Edge::new("aws_instance.web", "aws_missing.x", Relationship::Network),
        ];
        (nodes, edges)
    }

    #[test]
    fn test_build_skips_dangling_edges() {
        let (nodes, edges) = sample();
        let graph = TopologyGraph::build(&nodes, &edges);
        assert_eq!(graph.node_count(), 5);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.degree("aws_db_instance.db"), 1);
        assert_eq!(graph.degree("aws_s3_bucket.logs"), 0);
        assert_eq!(graph.neighbors("aws_db_instance.db")[0].id, "aws_instance.web");
    }

    #[test]
    fn test_children_and_roots() {
        let (nodes, edges) = sample();
        let graph = TopologyGraph::build(&nodes, &edges);
        assert_eq!(graph.children("aws_subnet.a"), ["aws_instance.web", "aws_db_instance.db"]);
        let roots: Vec<_> = graph.roots().map(|n| n.id.as_str()).collect();
        assert_eq!(roots, vec!["aws_vpc.main", "aws_s3_bucket.logs"]);
    }

    #[test]
    fn test_node_serde_shape() {
        let node = Node::boundary("aws_vpc.main", BoundaryType::NetworkSegment);
        let json = serde_json::to_value(&node).unwrap();
        assert_eq!(json["type"], "boundary");
        assert_eq!(json["boundary_type"], "network_segment");
        assert!(json.get("parent_id").is_none());

        let back: Node = serde_json::from_value(json).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn test_boundary_levels() {
        assert!(BoundaryType::Account.level() < BoundaryType::Region.level());
        assert!(BoundaryType::NetworkSegment.level() < BoundaryType::SecurityZone.level());
        assert_eq!(BoundaryType::Custom.level(), None);
    }

    #[test]
    fn test_edge_id() {
        let edge = Edge::new("a.b", "c.d", Relationship::Security);
        assert_eq!(edge.id, "edge:a.b->c.d");
    }
}
