//! Attribute-name pattern matchers.
//!
//! Applied plans carry resolved identifiers (`vpc-0a1b`, `sg-123`) instead of
//! symbolic references, which the reference scanner cannot see. Each family
//! below knows the handful of attribute names one kind of resource uses to
//! point at its network or security group, and resolves their values
//! against the identifiers, names and addresses of the other resources.
//!
//! A value that matches no managed resource is tried against the container
//! data sources, then against the identifier shapes of well-known network
//! types (`vpc-0a1b`, Azure and GCP resource ids). Such a network is not in
//! the plan at all; it is addressed as if read through a data source
//! (`data.aws_vpc.vpc-0a1b`) so the audit can report it as missing.

use crate::analyzer::index::{attribute_strings, ResourceIndex};
use crate::analyzer::Relationship;
use crate::catalog::{self, ResourceCategory};
use crate::plan::ResourceChange;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

// The capture is the name the network is known by.
static UNMANAGED_CONTAINERS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"^(vpc-[0-9a-f]+)$", "aws_vpc"),
        (r"^(subnet-[0-9a-f]+)$", "aws_subnet"),
        (r"(?i)/virtualNetworks/[^/]+/subnets/([^/]+)$", "azurerm_subnet"),
        (r"(?i)/virtualNetworks/([^/]+)$", "azurerm_virtual_network"),
        (r"/subnetworks/([^/]+)$", "google_compute_subnetwork"),
        (r"/global/networks/([^/]+)$", "google_compute_network"),
    ]
    .into_iter()
    .map(|(pattern, resource_type)| (Regex::new(pattern).expect("Invalid regex"), resource_type))
    .collect()
});

/// Resource relationship families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternFamily {
    VpcSubnet,
    Gateway,
    LoadBalancer,
    Database,
    Compute,
    Storage,
    SecurityGroup,
}

impl PatternFamily {
    /// All families in evaluation order.
    pub const ALL: [Self; 7] = [
        Self::VpcSubnet,
        Self::Gateway,
        Self::LoadBalancer,
        Self::Database,
        Self::Compute,
        Self::Storage,
        Self::SecurityGroup,
    ];

    /// Whether the family inspects resources of this type.
    fn applies_to(self, resource_type: &str) -> bool {
        use ResourceCategory as C;
        let category = catalog::category(resource_type);
        match self {
            Self::VpcSubnet => catalog::container_level(resource_type) == Some(catalog::ContainerLevel::Subnet),
            Self::Gateway => category == C::Gateway,
            Self::LoadBalancer => category == C::LoadBalancer,
            Self::Database => matches!(category, C::Database | C::NoSql),
            Self::Compute => matches!(category, C::Compute | C::Container | C::Serverless),
            Self::Storage => matches!(category, C::Storage | C::ObjectStorage),
            Self::SecurityGroup => category != C::Security,
        }
    }

    /// Attribute paths the family reads. Dots descend through nested
    /// blocks and arrays.
    fn attributes(self) -> &'static [&'static str] {
        match self {
            Self::VpcSubnet => &["vpc_id", "network", "virtual_network_name"],
            Self::Gateway => &["vpc_id", "subnet_id", "network", "router", "ip_configuration.subnet_id"],
            Self::LoadBalancer => &[
                "subnets",
                "subnet_id",
                "subnet_mapping.subnet_id",
                "subnetwork",
                "network",
                "frontend_ip_configuration.subnet_id",
            ],
            Self::Database => &[
                "db_subnet_group_name",
                "subnet_group_name",
                "delegated_subnet_id",
                "authorized_network",
                "settings.ip_configuration.private_network",
            ],
            Self::Compute => &[
                "subnet_id",
                "subnet_ids",
                "vpc_zone_identifier",
                "network_interface_ids",
                "vpc_config.subnet_ids",
                "network_configuration.subnets",
                "network_interface.subnetwork",
                "network_interface.network",
                "default_node_pool.vnet_subnet_id",
            ],
            Self::Storage => &["vpc_id", "subnet_id", "network_rules.virtual_network_subnet_ids"],
            Self::SecurityGroup => &[
                "vpc_security_group_ids",
                "security_groups",
                "security_group_ids",
                "network_security_group_id",
                "vpc_config.security_group_ids",
                "network_configuration.security_groups",
            ],
        }
    }
}

/// A relationship recognized from a well-known attribute name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMatch {
    pub source: String,
    pub target: String,
    pub source_type: String,
    pub target_type: String,
    pub attribute_path: String,
    pub relationship: Relationship,
    pub family: PatternFamily,
}

/// Runs every family over the managed resources of a plan.
#[must_use]
pub fn match_patterns(index: &ResourceIndex<'_>) -> Vec<PatternMatch> {
    let mut matches = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for &resource in index.resources() {
        for family in PatternFamily::ALL {
            if !family.applies_to(&resource.resource_type) {
                continue;
            }
            for &path in family.attributes() {
                for value in attribute_strings(resource, path) {
                    let allow_name = allows_name(path);
                    let found = index
                        .resolve_value(resource, value, allow_name)
                        .or_else(|| index.resolve_data_value(resource, value, allow_name))
                        .map(Endpoint::of)
                        .or_else(|| unmanaged_container(value));
                    let Some(found) = found else {
                        continue;
                    };
                    if found.address == resource.address {
                        continue;
                    }
                    let Some(m) = orient(family, resource, found, path) else {
                        continue;
                    };
                    if seen.insert((m.source.clone(), m.target.clone())) {
                        matches.push(m);
                    }
                }
            }
        }
    }

    tracing::debug!(matches = matches.len(), "Pattern matching complete");
    matches
}

/// The resource an attribute value resolved to.
struct Endpoint {
    address: String,
    resource_type: String,
}

impl Endpoint {
    fn of(resource: &ResourceChange) -> Self {
        Self {
            address: resource.address.clone(),
            resource_type: resource.resource_type.clone(),
        }
    }
}

/// A network the plan does not contain, recognized by its identifier.
fn unmanaged_container(value: &str) -> Option<Endpoint> {
    UNMANAGED_CONTAINERS.iter().find_map(|(pattern, resource_type)| {
        let name = pattern.captures(value)?.get(1)?.as_str();
        let name: String = name
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        Some(Endpoint {
            address: format!("data.{resource_type}.{name}"),
            resource_type: (*resource_type).to_string(),
        })
    })
}

/// Decide direction and relationship for a resolved attribute value.
fn orient(family: PatternFamily, resource: &ResourceChange, found: Endpoint, path: &str) -> Option<PatternMatch> {
    let resource = Endpoint::of(resource);
    let target_category = catalog::category(&found.resource_type);

    let (source, target, relationship) = if family == PatternFamily::SecurityGroup {
        // The group controls the resource that lists it.
        if target_category != ResourceCategory::Security {
            return None;
        }
        (found, resource, Relationship::Security)
    } else {
        if !(catalog::is_container(&found.resource_type) || target_category == ResourceCategory::Network) {
            return None;
        }
        (resource, found, Relationship::Network)
    };

    Some(PatternMatch {
        source: source.address,
        target: target.address,
        source_type: source.resource_type,
        target_type: target.resource_type,
        attribute_path: path.to_string(),
        relationship,
        family,
    })
}

/// Names are only trusted for attributes that are documented to hold one.
fn allows_name(path: &str) -> bool {
    let leaf = path.rsplit('.').next().unwrap_or(path);
    leaf.ends_with("_name") || matches!(leaf, "network" | "subnetwork" | "authorized_network" | "private_network")
}
