//! Topology documents and the existing-topology collaborator.

use crate::error::{PlanTopoError, Result, ResultExt};
use crate::graph::types::{Edge, Node};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A node/edge set, as persisted by the storage collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// Devices and boundaries. Containment lives in each node's
    /// `parent_id`, never in `edges`.
    #[serde(default)]
    pub nodes: Vec<Node>,
    /// Directed connections, one per `edge:source->target` id
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Topology {
    #[must_use]
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Parse a topology document.
    ///
    /// # Errors
    ///
    /// Returns `TopologyLoad` if the JSON does not describe a topology.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| {
            crate::err!(TopologyLoad {
                path: PathBuf::from("<inline>"),
                message: e.to_string(),
            })
        })
    }

    /// Serialize the topology.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self, pretty: bool) -> Result<String> {
        let json = if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        };
        json.map_err(|e| {
            crate::err!(ReportGeneration {
                message: format!("Failed to serialize topology: {e}"),
            })
        })
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Id-to-node lookup. The first node wins when ids repeat.
    #[must_use]
    pub fn node_map(&self) -> HashMap<&str, &Node> {
        let mut map = HashMap::with_capacity(self.nodes.len());
        for node in &self.nodes {
            map.entry(node.id.as_str()).or_insert(node);
        }
        map
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// Provides the current topology to the importer.
pub trait TopologySource {
    /// A read-only snapshot of the current nodes and edges.
    ///
    /// # Errors
    ///
    /// Returns `TopologyLoad` (or an I/O error) if the topology is unavailable.
    fn snapshot(&self) -> Result<Topology>;
}

impl TopologySource for Topology {
    fn snapshot(&self) -> Result<Topology> {
        Ok(self.clone())
    }
}

/// A topology stored as a JSON file.
#[derive(Debug, Clone)]
pub struct TopologyFile {
    path: PathBuf,
}

impl TopologyFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a topology to this file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save(&self, topology: &Topology) -> Result<()> {
        let json = topology.to_json(true)?;
        std::fs::write(&self.path, json).with_path(&self.path)?;
        tracing::info!(path = %self.path.display(), nodes = topology.nodes.len(), "Topology written");
        Ok(())
    }
}

impl TopologySource for TopologyFile {
    fn snapshot(&self) -> Result<Topology> {
        let content = std::fs::read_to_string(&self.path).with_path(&self.path)?;
        let topology = Topology::from_json(&content).map_err(|e| match e {
            PlanTopoError::TopologyLoad { message, src_path, src_line, .. } => PlanTopoError::TopologyLoad {
                path: self.path.clone(),
                message,
                src_path,
                src_line,
            },
            other => other,
        })?;
        tracing::debug!(
            path = %self.path.display(),
            nodes = topology.nodes.len(),
            edges = topology.edges.len(),
            "Loaded existing topology"
        );
        Ok(topology)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::Relationship;
    use crate::graph::BoundaryType;

    fn sample() -> Topology {
        Topology::new(
            vec![
                Node::boundary("aws_vpc.main", BoundaryType::NetworkSegment),
                Node::device("aws_instance.web", "server").with_parent("aws_vpc.main"),
            ],
            vec![Edge::new("aws_instance.web", "aws_instance.web2", Relationship::Network)],
        )
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = TopologyFile::new(dir.path().join("topology.json"));
        file.save(&sample()).unwrap();
        assert_eq!(file.snapshot().unwrap(), sample());
    }

    #[test]
    fn test_missing_file() {
        let file = TopologyFile::new("/nonexistent/topology.json");
        let err = file.snapshot().unwrap_err();
        assert!(matches!(err, PlanTopoError::FileNotFound { .. }));
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{\"nodes\": 3}").unwrap();
        let err = TopologyFile::new(&path).snapshot().unwrap_err();
        match err {
            PlanTopoError::TopologyLoad { path: reported, .. } => assert_eq!(reported, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_document_defaults() {
        let topology = Topology::from_json("{}").unwrap();
        assert!(topology.is_empty());
    }

    #[test]
    fn test_sections_default_independently() {
        let mut value: serde_json::Value = serde_json::from_str(&sample().to_json(false).unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("edges");
        let topology = Topology::from_json(&value.to_string()).unwrap();
        assert_eq!(topology.nodes, sample().nodes);
        assert!(topology.edges.is_empty());
        assert_eq!(topology.nodes[1].parent_id.as_deref(), Some("aws_vpc.main"));
    }

    #[test]
    fn test_node_map_keeps_first() {
        let mut topology = sample();
        let mut dup = Node::device("aws_instance.web", "database");
        dup.label = "second".to_string();
        topology.nodes.push(dup);
        let map = topology.node_map();
        assert_eq!(map["aws_instance.web"].label, "aws_instance.web");
    }
}
