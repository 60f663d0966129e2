//! Layout collaborator interface and the deterministic grid fallback.
//!
//! The importer never computes real diagram layouts itself. It hands the
//! freshly converted nodes to a [`Layout`] implementation and, if that
//! fails, places everything on a simple grid so the import still completes.

use crate::config::LayoutOptions;
use crate::error::Result;
use crate::graph::types::{Edge, Node, NodeId, Position, Size};
use std::collections::HashMap;

/// Computed placement for one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Position,
    pub size: Size,
}

/// Assigns 2-D coordinates to nodes.
pub trait Layout {
    /// Compute placements. Nodes missing from the result keep their
    /// current position.
    ///
    /// # Errors
    ///
    /// Returns `Layout` if placement cannot be computed.
    fn layout(&self, nodes: &[Node], edges: &[Edge], options: &LayoutOptions) -> Result<HashMap<NodeId, Placement>>;
}

/// Row-major grid placement: boundaries first, then devices, in input order.
#[derive(Debug, Clone, Copy, Default)]
pub struct GridLayout;

impl Layout for GridLayout {
    fn layout(&self, nodes: &[Node], _edges: &[Edge], options: &LayoutOptions) -> Result<HashMap<NodeId, Placement>> {
        Ok(grid_layout(nodes, options))
    }
}

/// Deterministic grid placement.
#[must_use]
pub fn grid_layout(nodes: &[Node], options: &LayoutOptions) -> HashMap<NodeId, Placement> {
    let columns = options.columns.max(1);
    let ordered = nodes
        .iter()
        .filter(|n| n.is_boundary())
        .chain(nodes.iter().filter(|n| n.is_device()));

    // Uniform cells sized to fit the largest node kind present.
    let has_boundary = nodes.iter().any(Node::is_boundary);
    let (widest, tallest) = if has_boundary {
        (options.boundary_width.max(options.device_width), options.boundary_height.max(options.device_height))
    } else {
        (options.device_width, options.device_height)
    };
    let cell_w = options.spacing_x.max(widest);
    let cell_h = options.spacing_y.max(tallest);

    ordered
        .enumerate()
        .map(|(i, node)| {
            let size = default_size(node, options);
            let position = Position {
                x: (i % columns) as f64 * cell_w,
                y: (i / columns) as f64 * cell_h,
            };
            (node.id.clone(), Placement { position, size })
        })
        .collect()
}

/// Default size for a node kind.
#[must_use]
pub fn default_size(node: &Node, options: &LayoutOptions) -> Size {
    if node.is_boundary() {
        Size {
            width: options.boundary_width,
            height: options.boundary_height,
        }
    } else {
        Size {
            width: options.device_width,
            height: options.device_height,
        }
    }
}

/// Run the layout collaborator and apply its placements, falling back to
/// the grid on error. Returns true when the fallback was used.
pub fn place_nodes(
    layout: &dyn Layout,
    nodes: &mut [Node],
    edges: &[Edge],
    options: &LayoutOptions,
) -> bool {
    let (placements, fell_back) = match layout.layout(nodes, edges, options) {
        Ok(placements) => (placements, false),
        Err(e) => {
            tracing::warn!(error = %e, "Layout failed, using grid placement");
            (grid_layout(nodes, options), true)
        }
    };

    for node in nodes.iter_mut() {
        match placements.get(&node.id) {
            Some(placement) => {
                node.position = placement.position;
                node.size = placement.size;
            }
            None if node.size == Size::default() => node.size = default_size(node, options),
            None => {}
        }
    }

    fell_back
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BoundaryType;

    struct FailingLayout;

    impl Layout for FailingLayout {
        fn layout(&self, _: &[Node], _: &[Edge], _: &LayoutOptions) -> Result<HashMap<NodeId, Placement>> {
            Err(crate::err!(Layout { message: "engine unavailable".to_string() }))
        }
    }

    fn nodes() -> Vec<Node> {
        vec![
            Node::device("aws_instance.a", "server"),
            Node::boundary("aws_vpc.main", BoundaryType::NetworkSegment),
            Node::device("aws_instance.b", "server"),
        ]
    }

    #[test]
    fn test_grid_places_boundaries_first() {
        let options = LayoutOptions {
            columns: 2,
            ..LayoutOptions::default()
        };
        let placements = grid_layout(&nodes(), &options);
        assert_eq!(placements["aws_vpc.main"].position, Position { x: 0.0, y: 0.0 });
        assert_eq!(placements["aws_instance.a"].position.x, 400.0);
        assert_eq!(placements["aws_instance.b"].position, Position { x: 0.0, y: 300.0 });
        assert_eq!(placements["aws_vpc.main"].size.width, 400.0);
    }

    #[test]
    fn test_grid_is_deterministic() {
        let options = LayoutOptions::default();
        assert_eq!(grid_layout(&nodes(), &options), grid_layout(&nodes(), &options));
    }

    #[test]
    fn test_failing_layout_falls_back() {
        let mut nodes = nodes();
        let fell_back = place_nodes(&FailingLayout, &mut nodes, &[], &LayoutOptions::default());
        assert!(fell_back);
        assert!(nodes.iter().all(|n| n.size.width > 0.0));
    }

    #[test]
    fn test_grid_layout_trait() {
        let mut nodes = nodes();
        let fell_back = place_nodes(&GridLayout, &mut nodes, &[], &LayoutOptions::default());
        assert!(!fell_back);
        assert_eq!(nodes[2].position.x, 800.0);
    }
}
