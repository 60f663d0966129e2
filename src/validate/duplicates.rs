//! Duplicate detection against an existing topology.
//!
//! Each incoming managed resource is matched against the existing nodes
//! with three strategies, most reliable first:
//!
//! 1. external id (content-derived, survives plan regeneration)
//! 2. plan address recorded on the node
//! 3. resource name plus type
//!
//! The first match wins and an existing node is claimed by at most one
//! incoming resource.

use crate::graph::{Node, NodeId};
use crate::identity;
use crate::plan::{Plan, ResourceAddress, ResourceChange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// What to do with an incoming resource that already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CollisionResolution {
    /// Keep the existing node untouched
    #[default]
    Skip,
    /// Overwrite the existing node's attributes, keeping its id and placement
    Replace,
    /// Add the incoming resource as a separate node
    #[value(name = "create_new")]
    CreateNew,
    /// Leave the decision to the user
    Manual,
}

impl std::fmt::Display for CollisionResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Replace => write!(f, "replace"),
            Self::CreateNew => write!(f, "create_new"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// How a collision was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStrategy {
    ExternalId,
    Address,
    NameAndType,
}

impl std::fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExternalId => write!(f, "external id"),
            Self::Address => write!(f, "address"),
            Self::NameAndType => write!(f, "name and type"),
        }
    }
}

/// An incoming resource that matches an existing node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collision {
    /// Incoming plan address
    pub address: String,
    pub resource_type: String,
    /// Incoming external id
    pub external_id: String,
    pub existing_node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub existing_external_id: Option<String>,
    pub strategy: MatchStrategy,
    /// Resolution currently selected for this collision
    pub resolution: CollisionResolution,
}

/// Outcome of duplicate detection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateDetection {
    /// Addresses with no existing counterpart, in plan order
    pub new_resources: Vec<String>,
    pub collisions: Vec<Collision>,
    /// Incoming address -> existing node id, for every collision
    pub existing_references: BTreeMap<String, NodeId>,
}

impl DuplicateDetection {
    #[must_use]
    pub fn has_collisions(&self) -> bool {
        !self.collisions.is_empty()
    }
}

/// Resolved collisions, grouped by what the importer should do.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePlan {
    /// Addresses to add as new nodes (new resources and `create_new` collisions)
    pub create: Vec<String>,
    pub replace: Vec<Collision>,
    pub skip: Vec<Collision>,
    pub manual: Vec<Collision>,
}

/// Detect collisions between a plan's managed resources and existing nodes.
///
/// Every collision starts out with `default_resolution`.
#[must_use]
pub fn detect(plan: &Plan, existing: &[Node], default_resolution: CollisionResolution) -> DuplicateDetection {
    detect_resources(plan.managed(), existing, default_resolution)
}

/// Like [`detect`], over any sequence of resources. Data sources are skipped.
pub fn detect_resources<'a>(
    resources: impl IntoIterator<Item = &'a ResourceChange>,
    existing: &[Node],
    default_resolution: CollisionResolution,
) -> DuplicateDetection {
    let lookup = ExistingIndex::new(existing);
    let mut claimed: HashSet<usize> = HashSet::new();
    let mut detection = DuplicateDetection::default();

    for resource in resources.into_iter().filter(|r| r.is_managed()) {
        let id = identity::identify(resource);
        let found = lookup
            .by_external_id(&id.full_id, &claimed)
            .map(|i| (i, MatchStrategy::ExternalId))
            .or_else(|| lookup.by_address(&resource.address, &claimed).map(|i| (i, MatchStrategy::Address)))
            .or_else(|| {
                lookup
                    .by_name_and_type(&resource.display_name(), &resource.resource_type, &claimed)
                    .map(|i| (i, MatchStrategy::NameAndType))
            });

        match found {
            Some((i, strategy)) => {
                claimed.insert(i);
                let node = &existing[i];
                detection
                    .existing_references
                    .insert(resource.address.clone(), node.id.clone());
                detection.collisions.push(Collision {
                    address: resource.address.clone(),
                    resource_type: resource.resource_type.clone(),
                    external_id: id.full_id,
                    existing_node_id: node.id.clone(),
                    existing_external_id: node.external_id.clone(),
                    strategy,
                    resolution: default_resolution,
                });
            }
            None => detection.new_resources.push(resource.address.clone()),
        }
    }

    tracing::debug!(
        new = detection.new_resources.len(),
        collisions = detection.collisions.len(),
        "Duplicate detection complete"
    );
    detection
}

/// Apply per-address overrides and group collisions by resolution.
#[must_use]
pub fn resolve(detection: &DuplicateDetection, overrides: &HashMap<String, CollisionResolution>) -> MergePlan {
    let mut plan = MergePlan {
        create: detection.new_resources.clone(),
        ..MergePlan::default()
    };

    for collision in &detection.collisions {
        let mut collision = collision.clone();
        if let Some(&resolution) = overrides.get(&collision.address) {
            collision.resolution = resolution;
        }
        match collision.resolution {
            CollisionResolution::Skip => plan.skip.push(collision),
            CollisionResolution::Replace => plan.replace.push(collision),
            CollisionResolution::CreateNew => plan.create.push(collision.address),
            CollisionResolution::Manual => plan.manual.push(collision),
        }
    }

    plan
}

/// First-wins lookup tables over existing nodes.
struct ExistingIndex<'n> {
    by_external_id: HashMap<&'n str, Vec<usize>>,
    by_address: HashMap<&'n str, Vec<usize>>,
    by_name_and_type: HashMap<(String, &'n str), Vec<usize>>,
}

impl<'n> ExistingIndex<'n> {
    fn new(nodes: &'n [Node]) -> Self {
        let mut index = Self {
            by_external_id: HashMap::new(),
            by_address: HashMap::new(),
            by_name_and_type: HashMap::new(),
        };

        for (i, node) in nodes.iter().enumerate() {
            if let Some(external_id) = node.external_id.as_deref() {
                index.by_external_id.entry(external_id).or_default().push(i);
            }
            let address = node.terraform_address.as_deref().unwrap_or(&node.id);
            index.by_address.entry(address).or_default().push(i);

            let name = ResourceAddress::parse(address).map(|a| match a.index {
                Some(key) => format!("{}[{}]", a.name, key.trim_matches('"')),
                None => a.name,
            });
            if let (Some(name), Some(ty)) = (name, node.terraform_type.as_deref()) {
                index.by_name_and_type.entry((name, ty)).or_default().push(i);
            }
        }

        index
    }

    fn first_unclaimed(candidates: Option<&Vec<usize>>, claimed: &HashSet<usize>) -> Option<usize> {
        candidates?.iter().copied().find(|i| !claimed.contains(i))
    }

    fn by_external_id(&self, id: &str, claimed: &HashSet<usize>) -> Option<usize> {
        Self::first_unclaimed(self.by_external_id.get(id), claimed)
    }

    fn by_address(&self, address: &str, claimed: &HashSet<usize>) -> Option<usize> {
        Self::first_unclaimed(self.by_address.get(address), claimed)
    }

    fn by_name_and_type(&self, name: &str, ty: &str, claimed: &HashSet<usize>) -> Option<usize> {
        Self::first_unclaimed(self.by_name_and_type.get(&(name.to_string(), ty)), claimed)
    }
}
