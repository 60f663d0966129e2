//! Plan-to-topology conversion.
//!
//! # Algorithm
//!
//! ```text
//! Pass 1  containers    network segments, then subnets   -> boundaries
//! Pass 2  devices       everything else that is managed  -> devices
//! Edges   dependencies  minus any pair touching a container
//! Check   completeness  unresolved parents, missing edges, orphans
//! ```
//!
//! An edge is expected wherever a security attribute names a group, and
//! wherever a network path of the classification rules names a device
//! (`network_interface_ids`, `nat_gateway_id`...). Paths that name a
//! container are placement, not edges, and are left to parent resolution.
//!
//! Parent resolution runs three tiers per candidate container level:
//!
//! 1. a dependency from the resource to a boundary of that level
//! 2. a dependency from such a boundary to the resource
//! 3. the resource's own network attributes (`vpc_id`, `subnet_id`,
//!    nested `vpc_config`/`network_interface` blocks...), matched against
//!    symbolic references and against the identifiers of the boundaries
//!    created so far
//!
//! Devices try the subnet level first and fall back to the network
//! segment. Nothing here fails: a resource that cannot be placed becomes
//! an unparented node and a warning.

use crate::analyzer::{attribute_strings, parse_reference, Dependency, ResourceIndex, RuleRegistry};
use crate::catalog::{self, Catalog, ContainerLevel, ResourceCategory};
use crate::config::ConversionOptions;
use crate::graph::types::{Edge, Node, NodeKind, Position, Size};
use crate::identity;
use crate::plan::{Plan, ResourceChange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Attributes that may name a containing network or subnet.
const PARENT_ATTRIBUTES: &[&str] = &[
    "subnet_id",
    "subnet_ids",
    "subnets",
    "subnetwork",
    "vpc_zone_identifier",
    "delegated_subnet_id",
    "vpc_config.subnet_ids",
    "network_interface.subnet_id",
    "network_interface.subnetwork",
    "network_configuration.subnets",
    "ip_configuration.subnet_id",
    "subnet_mapping.subnet_id",
    "default_node_pool.vnet_subnet_id",
    "db_subnet_group_name",
    "subnet_group_name",
    "vpc_id",
    "vpc_config.vpc_id",
    "network",
    "network_interface.network",
    "virtual_network_name",
    "virtual_network_id",
];

/// Attributes that name security groups controlling a resource.
const SECURITY_ATTRIBUTES: &[&str] = &[
    "vpc_security_group_ids",
    "security_groups",
    "security_group_ids",
    "vpc_config.security_group_ids",
    "network_configuration.security_groups",
];

/// What went wrong during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Network attributes present but no boundary matched
    UnresolvedParent,
    /// An attribute names a related resource with no matching edge
    MissingEdge,
    /// A critical resource ended up with no edge and no parent
    OrphanedResource,
    /// Resource type not found in the catalog
    UnclassifiedResource,
    /// The layout collaborator failed and the grid was used
    LayoutFallback,
}

impl std::fmt::Display for WarningKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnresolvedParent => write!(f, "unresolved_parent"),
            Self::MissingEdge => write!(f, "missing_edge"),
            Self::OrphanedResource => write!(f, "orphaned_resource"),
            Self::UnclassifiedResource => write!(f, "unclassified_resource"),
            Self::LayoutFallback => write!(f, "layout_fallback"),
        }
    }
}

/// A non-fatal conversion finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportWarning {
    pub kind: WarningKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub message: String,
}

impl ImportWarning {
    #[must_use]
    pub fn new(kind: WarningKind, address: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            kind,
            address: address.map(String::from),
            message: message.into(),
        }
    }
}

/// Result of converting one plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub warnings: Vec<ImportWarning>,
}

impl Conversion {
    /// Boundary nodes only.
    pub fn boundaries(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_boundary())
    }

    /// Device nodes only.
    pub fn devices(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.is_device())
    }
}

/// Converts plans and their dependencies into topology nodes and edges.
#[derive(Debug, Clone)]
pub struct GraphConverter {
    catalog: Catalog,
    registry: RuleRegistry,
    external_source: String,
}

impl GraphConverter {
    /// A converter checking completeness against the built-in rules.
    #[must_use]
    pub fn new(options: &ConversionOptions) -> Self {
        Self {
            catalog: Catalog::new(options),
            registry: RuleRegistry::with_defaults(),
            external_source: options.external_source.clone(),
        }
    }

    /// Use the analyzer's rules, configured ones included.
    #[must_use]
    pub fn with_registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Convert one plan. Never fails; see the module docs.
    #[must_use]
    pub fn convert(&self, plan: &Plan, dependencies: &[Dependency], imported_at: DateTime<Utc>) -> Conversion {
        let index = ResourceIndex::new(plan);
        let mut state = State::new(&index, dependencies);
        let mut nodes = Vec::new();
        let mut warnings = Vec::new();

        // Pass 1: containers, coarsest level first.
        for level in [ContainerLevel::NetworkSegment, ContainerLevel::Subnet] {
            for &resource in index.resources() {
                if catalog::container_level(&resource.resource_type) != Some(level) {
                    continue;
                }
                let parent = match level {
                    ContainerLevel::NetworkSegment => None,
                    ContainerLevel::Subnet => state.resolve_parent(resource, &[ContainerLevel::NetworkSegment]),
                };
                let mut node = Node::boundary(resource.address.clone(), level.boundary_type());
                node.parent_id = parent;
                self.stamp(&mut node, resource, imported_at);
                state.register_boundary(resource, level);
                nodes.push(node);
            }
        }

        // Pass 2: devices, nearest container first.
        for &resource in index.resources() {
            if catalog::is_container(&resource.resource_type) {
                continue;
            }
            let profile = catalog::device_profile(&resource.resource_type);
            if profile.category == ResourceCategory::Unclassified {
                warnings.push(ImportWarning::new(
                    WarningKind::UnclassifiedResource,
                    Some(&resource.address),
                    format!("Resource type '{}' is not in the catalog", resource.resource_type),
                ));
            }
            let mut node = Node::device(resource.address.clone(), &profile.device_type);
            node.kind = NodeKind::Device {
                device_type: profile.device_type,
                device_subtype: profile.device_subtype,
                icon: profile.icon,
            };
            node.parent_id = state.resolve_parent(resource, &[ContainerLevel::Subnet, ContainerLevel::NetworkSegment]);
            self.stamp(&mut node, resource, imported_at);
            nodes.push(node);
        }

        let edges = build_edges(&nodes, dependencies);
        self.check_completeness(&index, &nodes, &edges, &mut warnings);

        tracing::debug!(
            nodes = nodes.len(),
            boundaries = nodes.iter().filter(|n| n.is_boundary()).count(),
            edges = edges.len(),
            warnings = warnings.len(),
            "Conversion complete"
        );

        Conversion { nodes, edges, warnings }
    }

    /// Copy plan provenance onto a node.
    fn stamp(&self, node: &mut Node, resource: &ResourceChange, imported_at: DateTime<Utc>) {
        node.label = label_for(resource);
        node.position = Position::default();
        node.size = Size::default();
        node.external_id = Some(identity::identify(resource).full_id);
        node.external_source = Some(self.external_source.clone());
        node.last_import_timestamp = Some(imported_at);
        node.terraform_address = Some(resource.address.clone());
        node.terraform_type = Some(resource.resource_type.clone());
        node.change_type = Some(resource.change_type());
        node.before_attributes = resource.before.clone();
        node.after_attributes = resource.after.clone();
    }

    /// Network paths of the rules for `resource_type` that name devices,
    /// with the types each may name. Paths that also place the resource in
    /// a container are skipped.
    fn device_paths(&self, resource_type: &str) -> Vec<(&str, Vec<&str>)> {
        let rules = self.registry.rules_for(resource_type);
        let placement: HashSet<&str> = rules
            .iter()
            .filter(|r| catalog::is_container(&r.target_type))
            .flat_map(|r| r.network.iter().map(String::as_str))
            .chain(PARENT_ATTRIBUTES.iter().copied())
            .collect();

        let mut paths: Vec<(&str, Vec<&str>)> = Vec::new();
        for rule in rules.iter().filter(|r| !catalog::is_container(&r.target_type)) {
            for path in rule.network.iter().map(String::as_str).filter(|p| !placement.contains(p)) {
                match paths.iter_mut().find(|(p, _)| *p == path) {
                    Some((_, types)) => types.push(rule.target_type.as_str()),
                    None => paths.push((path, vec![rule.target_type.as_str()])),
                }
            }
        }
        paths
    }

    fn check_completeness(
        &self,
        index: &ResourceIndex<'_>,
        nodes: &[Node],
        edges: &[Edge],
        warnings: &mut Vec<ImportWarning>,
    ) {
        let mut connected: HashSet<&str> = HashSet::new();
        let mut security_targets: HashSet<(&str, &str)> = HashSet::new();
        let mut linked: HashSet<(&str, &str)> = HashSet::new();
        for edge in edges {
            connected.insert(&edge.source);
            connected.insert(&edge.target);
            security_targets.insert((&edge.source, &edge.target));
            linked.insert((&edge.source, &edge.target));
            linked.insert((&edge.target, &edge.source));
        }

        for node in nodes.iter().filter(|n| n.is_device()) {
            let Some(resource) = index.by_address(&node.id) else {
                continue;
            };

            if node.parent_id.is_none() {
                let hints: Vec<&str> = PARENT_ATTRIBUTES
                    .iter()
                    .flat_map(|path| attribute_strings(resource, path))
                    .collect();
                if let Some(first) = hints.first() {
                    warnings.push(ImportWarning::new(
                        WarningKind::UnresolvedParent,
                        Some(&resource.address),
                        format!("Network attribute value '{first}' does not match any imported boundary"),
                    ));
                }
            }

            for path in SECURITY_ATTRIBUTES {
                for value in attribute_strings(resource, path) {
                    let found = index
                        .resolve_value(resource, unwrap_interpolation(value), false)
                        .filter(|g| security_targets.contains(&(g.address.as_str(), node.id.as_str())));
                    if found.is_none() {
                        warnings.push(missing_edge(resource, path, value));
                    }
                }
            }

            for (path, peer_types) in self.device_paths(&resource.resource_type) {
                for value in attribute_strings(resource, path) {
                    let found = index
                        .resolve_value(resource, unwrap_interpolation(value), path.ends_with("_name"))
                        .filter(|peer| peer_types.contains(&peer.resource_type.as_str()))
                        .filter(|peer| linked.contains(&(peer.address.as_str(), node.id.as_str())));
                    if found.is_none() {
                        warnings.push(missing_edge(resource, path, value));
                    }
                }
            }

            if node.parent_id.is_none()
                && !connected.contains(node.id.as_str())
                && self.catalog.is_critical(&resource.resource_type)
            {
                warnings.push(ImportWarning::new(
                    WarningKind::OrphanedResource,
                    Some(&resource.address),
                    format!("Critical resource '{}' has no connections and no boundary", resource.address),
                ));
            }
        }
    }
}

/// Tracks created boundaries while conversion runs.
struct State<'i, 'a> {
    index: &'i ResourceIndex<'a>,
    outgoing: HashMap<&'i str, Vec<&'i str>>,
    incoming: HashMap<&'i str, Vec<&'i str>>,
    boundaries: HashMap<String, ContainerLevel>,
    /// Identifiers and names of created boundaries, first wins.
    known_ids: HashMap<String, String>,
}

impl<'i, 'a> State<'i, 'a> {
    fn new(index: &'i ResourceIndex<'a>, dependencies: &'i [Dependency]) -> Self {
        let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut incoming: HashMap<&str, Vec<&str>> = HashMap::new();
        for dep in dependencies {
            outgoing.entry(&dep.source).or_default().push(&dep.target);
            incoming.entry(&dep.target).or_default().push(&dep.source);
        }
        Self {
            index,
            outgoing,
            incoming,
            boundaries: HashMap::new(),
            known_ids: HashMap::new(),
        }
    }

    fn register_boundary(&mut self, resource: &ResourceChange, level: ContainerLevel) {
        self.boundaries.insert(resource.address.clone(), level);
        let name = resource.attribute("name").and_then(serde_json::Value::as_str);
        for id in resource.resolved_identifiers().into_iter().chain(name) {
            if !id.is_empty() {
                self.known_ids
                    .entry(id.to_string())
                    .or_insert_with(|| resource.address.clone());
            }
        }
    }

    fn is_boundary_at(&self, address: &str, level: ContainerLevel) -> bool {
        self.boundaries.get(address) == Some(&level)
    }

    fn resolve_parent(&self, resource: &ResourceChange, levels: &[ContainerLevel]) -> Option<String> {
        levels.iter().find_map(|&level| {
            self.from_dependencies(resource, level)
                .or_else(|| self.from_inverse_dependencies(resource, level))
                .or_else(|| self.from_attributes(resource, level))
        })
    }

    fn from_dependencies(&self, resource: &ResourceChange, level: ContainerLevel) -> Option<String> {
        let targets = self.outgoing.get(resource.address.as_str())?;
        targets
            .iter()
            .find(|t| self.is_boundary_at(t, level))
            .map(|t| (*t).to_string())
            .or_else(|| {
                // One hop through a subnet group to its first subnet.
                targets
                    .iter()
                    .filter(|t| is_subnet_group(t))
                    .find_map(|group| {
                        self.outgoing
                            .get(*group)?
                            .iter()
                            .find(|t| self.is_boundary_at(t, level))
                            .map(|t| (*t).to_string())
                    })
            })
    }

    fn from_inverse_dependencies(&self, resource: &ResourceChange, level: ContainerLevel) -> Option<String> {
        self.incoming
            .get(resource.address.as_str())?
            .iter()
            .find(|s| self.is_boundary_at(s, level))
            .map(|s| (*s).to_string())
    }

    fn from_attributes(&self, resource: &ResourceChange, level: ContainerLevel) -> Option<String> {
        PARENT_ATTRIBUTES.iter().find_map(|path| {
            attribute_strings(resource, path).into_iter().find_map(|value| {
                self.lookup(resource, value, level).or_else(|| {
                    let group = self.index.resolve_value(resource, value, true)?;
                    if !is_subnet_group(&group.address) {
                        return None;
                    }
                    attribute_strings(group, "subnet_ids")
                        .into_iter()
                        .find_map(|subnet| self.lookup(group, subnet, level))
                })
            })
        })
    }

    /// Match one attribute value against the boundaries created so far.
    fn lookup(&self, from: &ResourceChange, value: &str, level: ContainerLevel) -> Option<String> {
        let value = unwrap_interpolation(value);
        let candidate = self
            .known_ids
            .get(value)
            .cloned()
            .or_else(|| {
                parse_reference(value)?;
                self.index
                    .resolve_reference_text(from, value)
                    .map(|r| r.address.clone())
            })
            .or_else(|| {
                // Self links and resource ids end in the resource name.
                let tail = value.rsplit('/').next().filter(|t| *t != value)?;
                self.known_ids.get(tail).cloned()
            })?;
        self.is_boundary_at(&candidate, level).then_some(candidate)
    }
}

fn missing_edge(resource: &ResourceChange, path: &str, value: &str) -> ImportWarning {
    ImportWarning::new(
        WarningKind::MissingEdge,
        Some(&resource.address),
        format!("'{path}' names '{value}' but no matching connection was created"),
    )
}

/// `${aws_vpc.main.id}` -> `aws_vpc.main.id`
fn unwrap_interpolation(value: &str) -> &str {
    value.trim_start_matches("${").trim_end_matches('}')
}

fn is_subnet_group(address: &str) -> bool {
    crate::plan::ResourceAddress::parse(address).is_some_and(|a| a.resource_type.ends_with("_subnet_group"))
}

/// `tags.Name` when set, otherwise the name with its instance key.
fn label_for(resource: &ResourceChange) -> String {
    resource
        .attribute("tags")
        .and_then(|tags| tags.get("Name"))
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(|| resource.display_name(), String::from)
}

/// Build edges from dependencies, dropping anything that touches a
/// boundary, self loops, missing endpoints and repeats.
fn build_edges(nodes: &[Node], dependencies: &[Dependency]) -> Vec<Edge> {
    let kinds: HashMap<&str, bool> = nodes.iter().map(|n| (n.id.as_str(), n.is_boundary())).collect();
    let mut seen = HashSet::new();
    let mut edges = Vec::new();

    for dep in dependencies {
        let (Some(&source_is_boundary), Some(&target_is_boundary)) =
            (kinds.get(dep.source.as_str()), kinds.get(dep.target.as_str()))
        else {
            continue;
        };
        if dep.source == dep.target || source_is_boundary || target_is_boundary {
            continue;
        }
        let mut edge = Edge::new(dep.source.clone(), dep.target.clone(), dep.relationship);
        edge.attribute_path = Some(dep.metadata.attribute_path.clone());
        if seen.insert(edge.id.clone()) {
            edges.push(edge);
        }
    }

    edges
}
