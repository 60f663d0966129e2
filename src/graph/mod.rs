//! Topology Graph Module
//!
//! This module holds the topology model produced by an import and the
//! pieces that create, place and render it.
//!
//! # Structure
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       TOPOLOGY                           │
//! ├──────────────────────────────────────────────────────────┤
//! │                                                          │
//! │  ┌─ aws_vpc.main (network_segment) ──────────────────┐   │
//! │  │                                                   │   │
//! │  │  ┌─ aws_subnet.a (security_zone) ─┐               │   │
//! │  │  │                                │   ┌────────┐  │   │
//! │  │  │   ┌──────────────┐  security   │   │  sg    │  │   │
//! │  │  │   │ aws_instance │◀────────────┼───│ (dev)  │  │   │
//! │  │  │   └──────────────┘             │   └────────┘  │   │
//! │  │  └────────────────────────────────┘               │   │
//! │  └───────────────────────────────────────────────────┘   │
//! │                                                          │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Boxes nest through `parent_id` (containment). Arrows are edges, and
//! edges only ever join two devices.
//!
//! # Submodules
//!
//! - `types`: nodes, edges and the petgraph-backed [`TopologyGraph`]
//! - `converter`: plan + dependencies to nodes and edges
//! - `layout`: the layout collaborator and the grid fallback
//! - `topology`: topology documents and the existing-topology source
//! - `export`: DOT, JSON and Mermaid rendering

mod converter;
mod export;
mod layout;
mod topology;
mod types;

pub use converter::{Conversion, GraphConverter, ImportWarning, WarningKind};
pub use export::export_graph;
pub use layout::{default_size, grid_layout, place_nodes, GridLayout, Layout, Placement};
pub use topology::{Topology, TopologyFile, TopologySource};
pub use types::{BoundaryType, Edge, Node, NodeId, NodeKind, Position, Size, TopologyGraph};
