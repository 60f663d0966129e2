//! Graph export functionality.
//!
//! This module renders a topology for visualization and analysis.
//! Boundaries become nested clusters (DOT) or subgraphs (Mermaid);
//! connections become edges.

use crate::error::Result;
use crate::graph::topology::Topology;
use crate::graph::types::{Node, NodeKind, TopologyGraph};
use crate::analyzer::Relationship;
use crate::types::GraphFormat;
use serde::Serialize;
use std::collections::HashSet;

/// Export a topology to the specified format.
///
/// # Supported Formats
///
/// - **DOT**: Graphviz DOT format for visualization
/// - **JSON**: Structured JSON for programmatic access
/// - **Mermaid**: Mermaid diagram syntax for documentation
///
/// # Example
///
/// ```rust,no_run
/// use plantopo::graph::{export_graph, Topology};
/// use plantopo::types::GraphFormat;
///
/// let topology = Topology::default();
/// let dot = export_graph(&topology, GraphFormat::Dot).unwrap();
/// println!("{}", dot);
/// ```
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn export_graph(topology: &Topology, format: GraphFormat) -> Result<String> {
    let graph = TopologyGraph::build(&topology.nodes, &topology.edges);
    match format {
        GraphFormat::Dot => Ok(export_dot(&graph)),
        GraphFormat::Json => export_json(&graph),
        GraphFormat::Mermaid => Ok(export_mermaid(&graph)),
    }
}

/// Visit containment depth-first from the roots, then pick up anything a
/// containment cycle kept unreachable.
fn walk_containment<'a>(graph: &'a TopologyGraph, mut visit: impl FnMut(&'a Node, Walk)) {
    fn descend<'a>(
        graph: &'a TopologyGraph,
        node: &'a Node,
        depth: usize,
        seen: &mut HashSet<&'a str>,
        visit: &mut impl FnMut(&'a Node, Walk),
    ) {
        if !seen.insert(node.id.as_str()) {
            return;
        }
        visit(node, Walk::Enter(depth));
        for child in graph.children(&node.id) {
            if let Some(child) = graph.get_node(child) {
                descend(graph, child, depth + 1, seen, visit);
            }
        }
        visit(node, Walk::Leave(depth));
    }

    let mut seen = HashSet::new();
    for root in graph.roots() {
        descend(graph, root, 0, &mut seen, &mut visit);
    }
    for node in graph.nodes() {
        descend(graph, node, 0, &mut seen, &mut visit);
    }
}

#[derive(Debug, Clone, Copy)]
enum Walk {
    Enter(usize),
    Leave(usize),
}

/// Export to Graphviz DOT format.
fn export_dot(graph: &TopologyGraph) -> String {
    let mut dot = String::new();
    dot.push_str("digraph PlanTopo {\n");
    dot.push_str("    rankdir=LR;\n");
    dot.push_str("    compound=true;\n");
    dot.push_str("    node [shape=box, style=rounded];\n");
    dot.push_str("    \n");

    walk_containment(graph, |node, step| match (step, &node.kind) {
        (Walk::Enter(depth), NodeKind::Boundary { boundary_type }) => {
            let indent = "    ".repeat(depth + 1);
            let label = escape_dot_string(&format!("{}\\n({boundary_type})", node.label));
            dot.push_str(&format!("{indent}subgraph \"cluster_{}\" {{\n", escape_dot_id(&node.id)));
            dot.push_str(&format!("{indent}    label=\"{label}\";\n"));
            dot.push_str(&format!("{indent}    style=dashed;\n"));
            dot.push_str(&format!("{indent}    color={};\n", boundary_color(*boundary_type)));
            // Anchor so edges can target the cluster if one ever slips through.
            dot.push_str(&format!(
                "{indent}    \"{}\" [shape=point, style=invis];\n",
                escape_dot_id(&node.id)
            ));
        }
        (Walk::Leave(depth), NodeKind::Boundary { .. }) => {
            dot.push_str(&format!("{}}}\n", "    ".repeat(depth + 1)));
        }
        (Walk::Enter(depth), NodeKind::Device { device_type, .. }) => {
            let indent = "    ".repeat(depth + 1);
            let label = escape_dot_string(&format!("{}\\n{device_type}", node.label));
            dot.push_str(&format!(
                "{indent}\"{}\" [label=\"{label}\", fillcolor=lightblue, style=\"rounded,filled\"];\n",
                escape_dot_id(&node.id)
            ));
        }
        (Walk::Leave(_), NodeKind::Device { .. }) => {}
    });

    dot.push('\n');
    for (from, to, edge) in graph.edges() {
        let style = match edge.relationship {
            Relationship::Network => "style=solid, color=blue",
            Relationship::Security => "style=dashed, color=red",
            Relationship::DependsOn => "style=dotted, color=gray",
            Relationship::Reference => "style=solid, color=gray",
        };
        dot.push_str(&format!(
            "    \"{}\" -> \"{}\" [{style}, label=\"{}\"];\n",
            escape_dot_id(&from.id),
            escape_dot_id(&to.id),
            edge.relationship
        ));
    }

    dot.push_str("}\n");
    dot
}

fn boundary_color(boundary_type: crate::graph::BoundaryType) -> &'static str {
    use crate::graph::BoundaryType;
    match boundary_type {
        BoundaryType::NetworkSegment => "blue",
        BoundaryType::SecurityZone => "darkgreen",
        BoundaryType::Account => "purple",
        BoundaryType::Region => "orange",
        BoundaryType::Custom => "gray",
    }
}

/// Export to JSON format.
fn export_json(graph: &TopologyGraph) -> Result<String> {
    #[derive(Serialize)]
    struct JsonGraph<'a> {
        nodes: Vec<&'a Node>,
        edges: Vec<&'a crate::graph::Edge>,
        metadata: JsonMetadata,
    }

    #[derive(Serialize)]
    struct JsonMetadata {
        total_nodes: usize,
        total_edges: usize,
        device_count: usize,
        boundary_count: usize,
    }

    let nodes: Vec<&Node> = graph.nodes().collect();
    let edges: Vec<&crate::graph::Edge> = graph.edges().map(|(_, _, edge)| edge).collect();
    let boundary_count = nodes.iter().filter(|n| n.is_boundary()).count();

    let json_graph = JsonGraph {
        metadata: JsonMetadata {
            total_nodes: nodes.len(),
            total_edges: edges.len(),
            device_count: nodes.len() - boundary_count,
            boundary_count,
        },
        nodes,
        edges,
    };

    serde_json::to_string_pretty(&json_graph).map_err(|e| {
        crate::err!(ReportGeneration {
            message: format!("Failed to serialize graph to JSON: {e}"),
        })
    })
}

/// Export to Mermaid diagram format.
fn export_mermaid(graph: &TopologyGraph) -> String {
    let mut mermaid = String::new();
    mermaid.push_str("graph LR\n");
    mermaid.push_str("    %% PlanTopo topology\n\n");

    let mut device_ids = Vec::new();
    walk_containment(graph, |node, step| {
        let id = sanitize_mermaid_id(&node.id);
        let label = escape_mermaid_string(&node.label);
        match (step, &node.kind) {
            (Walk::Enter(depth), NodeKind::Boundary { .. }) => {
                mermaid.push_str(&format!("{}subgraph {id}[\"{label}\"]\n", "    ".repeat(depth + 1)));
            }
            (Walk::Leave(depth), NodeKind::Boundary { .. }) => {
                mermaid.push_str(&format!("{}end\n", "    ".repeat(depth + 1)));
            }
            (Walk::Enter(depth), NodeKind::Device { .. }) => {
                mermaid.push_str(&format!("{}{id}[\"{label}\"]\n", "    ".repeat(depth + 1)));
                device_ids.push(id);
            }
            (Walk::Leave(_), NodeKind::Device { .. }) => {}
        }
    });

    mermaid.push('\n');
    for (from, to, edge) in graph.edges() {
        let arrow = match edge.relationship {
            Relationship::Network => "-->",
            Relationship::Security => "-.->",
            Relationship::DependsOn | Relationship::Reference => "---",
        };
        mermaid.push_str(&format!(
            "    {} {arrow}|{}| {}\n",
            sanitize_mermaid_id(&from.id),
            edge.relationship,
            sanitize_mermaid_id(&to.id)
        ));
    }

    mermaid.push_str("\n    %% Styling\n");
    mermaid.push_str("    classDef device fill:#e1f5fe,stroke:#01579b\n");
    if !device_ids.is_empty() {
        mermaid.push_str(&format!("    class {} device\n", device_ids.join(",")));
    }

    mermaid
}

/// Escape a string for use in DOT labels.
fn escape_dot_string(s: &str) -> String {
    s.replace('"', "\\\"").replace('\n', "\\n")
}

/// Escape a string for use as a quoted DOT node ID.
fn escape_dot_id(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Sanitize a string for use as a Mermaid node ID.
fn sanitize_mermaid_id(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Escape a string for use in Mermaid labels.
fn escape_mermaid_string(s: &str) -> String {
    s.replace('"', "'").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BoundaryType, Edge};

    fn create_test_topology() -> Topology {
        Topology::new(
            vec![
                Node::boundary("aws_vpc.main", BoundaryType::NetworkSegment),
                Node::boundary("aws_subnet.a", BoundaryType::SecurityZone).with_parent("aws_vpc.main"),
                Node::device("aws_instance.web", "server").with_parent("aws_subnet.a"),
                Node::device("aws_security_group.web", "firewall").with_parent("aws_vpc.main"),
            ],
            vec![Edge::new("aws_security_group.web", "aws_instance.web", Relationship::Security)],
        )
    }

    #[test]
    fn test_export_dot_nests_clusters() {
        let dot = export_graph(&create_test_topology(), GraphFormat::Dot).unwrap();

        assert!(dot.contains("digraph PlanTopo"));
        let vpc = dot.find("cluster_aws_vpc.main").unwrap();
        let subnet = dot.find("cluster_aws_subnet.a").unwrap();
        let web = dot.find("\"aws_instance.web\" [label").unwrap();
        assert!(vpc < subnet && subnet < web);
        assert!(dot.contains("\"aws_security_group.web\" -> \"aws_instance.web\" [style=dashed, color=red, label=\"security\"]"));
    }

    #[test]
    fn test_export_json() {
        let json = export_graph(&create_test_topology(), GraphFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["metadata"]["total_nodes"], 4);
        assert_eq!(parsed["metadata"]["boundary_count"], 2);
        assert_eq!(parsed["edges"][0]["relationship"], "security");
    }

    #[test]
    fn test_export_mermaid() {
        let mermaid = export_graph(&create_test_topology(), GraphFormat::Mermaid).unwrap();
        assert!(mermaid.contains("graph LR"));
        assert!(mermaid.contains("subgraph aws_vpc_main[\"aws_vpc.main\"]"));
        assert!(mermaid.contains("aws_security_group_web -.->|security| aws_instance_web"));
        assert_eq!(mermaid.matches("subgraph").count(), mermaid.matches("    end").count());
    }

    #[test]
    fn test_cyclic_containment_still_exports() {
        let topology = Topology::new(
            vec![
                Node::boundary("a", BoundaryType::Custom).with_parent("b"),
                Node::boundary("b", BoundaryType::Custom).with_parent("a"),
            ],
            Vec::new(),
        );
        let dot = export_graph(&topology, GraphFormat::Dot).unwrap();
        assert_eq!(dot.matches("subgraph").count(), 2);
    }

    #[test]
    fn test_sanitize_mermaid_id() {
        assert_eq!(sanitize_mermaid_id("module.net.aws_vpc.main[0]"), "module_net_aws_vpc_main_0_");
    }
}
