//! Resource type catalog.
//!
//! One table answers every "what is this resource type" question the
//! pipeline asks: whether it is a container (network segment or subnet),
//! which device profile it renders as, which category it falls into, and
//! whether that category must be connected (critical) or may legitimately
//! stand alone.

use crate::config::ConversionOptions;
use crate::graph::BoundaryType;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// Container level of a boundary-producing resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerLevel {
    /// VPC / virtual network / compute network
    NetworkSegment,
    /// Subnet-equivalent
    Subnet,
}

impl ContainerLevel {
    /// The boundary type nodes of this level are created with.
    #[must_use]
    pub fn boundary_type(self) -> BoundaryType {
        match self {
            Self::NetworkSegment => BoundaryType::NetworkSegment,
            Self::Subnet => BoundaryType::SecurityZone,
        }
    }
}

/// Broad resource category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceCategory {
    Compute,
    Database,
    LoadBalancer,
    Network,
    Gateway,
    Security,
    Storage,
    ObjectStorage,
    NoSql,
    Secrets,
    Dns,
    Identity,
    Monitoring,
    Messaging,
    Cdn,
    Certificate,
    Registry,
    Container,
    Serverless,
    Management,
    Unclassified,
}

impl ResourceCategory {
    /// Categories that must end up with an edge or a parent.
    #[must_use]
    pub fn is_critical(self) -> bool {
        matches!(self, Self::Compute | Self::Database | Self::LoadBalancer)
    }

    /// Regional or global services that legitimately have no network placement.
    #[must_use]
    pub fn is_standalone(self) -> bool {
        matches!(
            self,
            Self::ObjectStorage
                | Self::NoSql
                | Self::Secrets
                | Self::Dns
                | Self::Identity
                | Self::Monitoring
                | Self::Messaging
                | Self::Cdn
                | Self::Certificate
                | Self::Registry
                | Self::Management
        )
    }

    fn default_device_type(self) -> &'static str {
        match self {
            Self::Compute => "server",
            Self::Database | Self::NoSql => "database",
            Self::LoadBalancer => "load_balancer",
            Self::Network => "network_component",
            Self::Gateway => "gateway",
            Self::Security => "firewall",
            Self::Storage | Self::ObjectStorage => "storage",
            Self::Secrets => "key_store",
            Self::Dns => "dns",
            Self::Identity => "identity",
            Self::Monitoring => "monitoring",
            Self::Messaging => "messaging",
            Self::Cdn => "cdn",
            Self::Certificate => "certificate",
            Self::Registry => "registry",
            Self::Container => "cluster",
            Self::Serverless => "function",
            Self::Management => "management",
            Self::Unclassified => "unclassified",
        }
    }

    fn default_icon(self) -> &'static str {
        match self {
            Self::Unclassified => "generic",
            other => other.default_device_type(),
        }
    }
}

impl std::fmt::Display for ResourceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        write!(f, "{text}")
    }
}

/// How a device renders in the topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub device_type: String,
    pub device_subtype: String,
    pub icon: String,
    pub category: ResourceCategory,
}

static CONTAINER_TYPES: &[(&str, ContainerLevel)] = &[
    ("aws_vpc", ContainerLevel::NetworkSegment),
    ("aws_default_vpc", ContainerLevel::NetworkSegment),
    ("azurerm_virtual_network", ContainerLevel::NetworkSegment),
    ("google_compute_network", ContainerLevel::NetworkSegment),
    ("aws_subnet", ContainerLevel::Subnet),
    ("aws_default_subnet", ContainerLevel::Subnet),
    ("azurerm_subnet", ContainerLevel::Subnet),
    ("google_compute_subnetwork", ContainerLevel::Subnet),
];

use ResourceCategory as C;

// (type, device_type, subtype, icon, category)
static DEVICE_TABLE: &[(&str, &str, &str, &str, ResourceCategory)] = &[
    // AWS compute
    ("aws_instance", "server", "virtual_machine", "aws-ec2", C::Compute),
    ("aws_spot_instance_request", "server", "virtual_machine", "aws-ec2", C::Compute),
    ("aws_autoscaling_group", "server", "autoscaling_group", "aws-asg", C::Compute),
    ("aws_ecs_service", "container", "ecs_service", "aws-ecs", C::Container),
    ("aws_ecs_cluster", "cluster", "ecs", "aws-ecs", C::Container),
    ("aws_eks_cluster", "cluster", "kubernetes", "aws-eks", C::Container),
    ("aws_eks_node_group", "server", "node_group", "aws-eks", C::Compute),
    ("aws_lambda_function", "function", "serverless", "aws-lambda", C::Serverless),
    // AWS data
    ("aws_db_instance", "database", "relational", "aws-rds", C::Database),
    ("aws_rds_cluster", "database", "relational_cluster", "aws-rds", C::Database),
    ("aws_rds_cluster_instance", "database", "relational", "aws-rds", C::Database),
    ("aws_elasticache_cluster", "database", "cache", "aws-elasticache", C::Database),
    ("aws_elasticache_replication_group", "database", "cache", "aws-elasticache", C::Database),
    ("aws_redshift_cluster", "database", "warehouse", "aws-redshift", C::Database),
    ("aws_dynamodb_table", "database", "nosql", "aws-dynamodb", C::NoSql),
    ("aws_efs_file_system", "storage", "file", "aws-efs", C::Storage),
    ("aws_ebs_volume", "storage", "block", "aws-ebs", C::Storage),
    ("aws_s3_bucket", "storage", "object_storage", "aws-s3", C::ObjectStorage),
    // AWS load balancing
    ("aws_lb", "load_balancer", "application", "aws-elb", C::LoadBalancer),
    ("aws_alb", "load_balancer", "application", "aws-elb", C::LoadBalancer),
    ("aws_elb", "load_balancer", "classic", "aws-elb", C::LoadBalancer),
    ("aws_lb_target_group", "load_balancer", "target_group", "aws-elb", C::Network),
    ("aws_lb_listener", "load_balancer", "listener", "aws-elb", C::Network),
    // AWS network
    ("aws_internet_gateway", "gateway", "internet", "aws-igw", C::Gateway),
    ("aws_nat_gateway", "gateway", "nat", "aws-nat", C::Gateway),
    ("aws_vpn_gateway", "gateway", "vpn", "aws-vgw", C::Gateway),
    ("aws_ec2_transit_gateway", "gateway", "transit", "aws-tgw", C::Gateway),
    ("aws_route_table", "router", "route_table", "aws-route-table", C::Network),
    ("aws_network_interface", "network_interface", "eni", "aws-eni", C::Network),
    ("aws_eip", "network_component", "elastic_ip", "aws-eip", C::Network),
    ("aws_vpc_endpoint", "network_component", "endpoint", "aws-vpce", C::Network),
    ("aws_db_subnet_group", "network_component", "subnet_group", "aws-rds", C::Network),
    ("aws_elasticache_subnet_group", "network_component", "subnet_group", "aws-elasticache", C::Network),
    // AWS security
    ("aws_security_group", "firewall", "security_group", "aws-sg", C::Security),
    ("aws_network_acl", "firewall", "network_acl", "aws-nacl", C::Security),
    ("aws_wafv2_web_acl", "firewall", "waf", "aws-waf", C::Security),
    // AWS regional and global services
    ("aws_kms_key", "key_store", "kms", "aws-kms", C::Secrets),
    ("aws_secretsmanager_secret", "key_store", "secret", "aws-secrets-manager", C::Secrets),
    ("aws_route53_zone", "dns", "zone", "aws-route53", C::Dns),
    ("aws_route53_record", "dns", "record", "aws-route53", C::Dns),
    ("aws_iam_role", "identity", "role", "aws-iam", C::Identity),
    ("aws_iam_policy", "identity", "policy", "aws-iam", C::Identity),
    ("aws_iam_user", "identity", "user", "aws-iam", C::Identity),
    ("aws_iam_instance_profile", "identity", "instance_profile", "aws-iam", C::Identity),
    ("aws_cloudwatch_log_group", "monitoring", "log_group", "aws-cloudwatch", C::Monitoring),
    ("aws_cloudwatch_metric_alarm", "monitoring", "alarm", "aws-cloudwatch", C::Monitoring),
    ("aws_sns_topic", "messaging", "topic", "aws-sns", C::Messaging),
    ("aws_sqs_queue", "messaging", "queue", "aws-sqs", C::Messaging),
    ("aws_cloudfront_distribution", "cdn", "distribution", "aws-cloudfront", C::Cdn),
    ("aws_acm_certificate", "certificate", "tls", "aws-acm", C::Certificate),
    ("aws_ecr_repository", "registry", "container_images", "aws-ecr", C::Registry),
    // Azure
    ("azurerm_linux_virtual_machine", "server", "virtual_machine", "azure-vm", C::Compute),
    ("azurerm_windows_virtual_machine", "server", "virtual_machine", "azure-vm", C::Compute),
    ("azurerm_virtual_machine", "server", "virtual_machine", "azure-vm", C::Compute),
    ("azurerm_linux_virtual_machine_scale_set", "server", "scale_set", "azure-vmss", C::Compute),
    ("azurerm_kubernetes_cluster", "cluster", "kubernetes", "azure-aks", C::Container),
    ("azurerm_network_interface", "network_interface", "nic", "azure-nic", C::Network),
    ("azurerm_public_ip", "network_component", "public_ip", "azure-pip", C::Network),
    ("azurerm_network_security_group", "firewall", "security_group", "azure-nsg", C::Security),
    ("azurerm_lb", "load_balancer", "network", "azure-lb", C::LoadBalancer),
    ("azurerm_application_gateway", "load_balancer", "application", "azure-appgw", C::LoadBalancer),
    ("azurerm_nat_gateway", "gateway", "nat", "azure-nat", C::Gateway),
    ("azurerm_mssql_server", "database", "relational", "azure-sql", C::Database),
    ("azurerm_postgresql_flexible_server", "database", "relational", "azure-postgres", C::Database),
    ("azurerm_mysql_flexible_server", "database", "relational", "azure-mysql", C::Database),
    ("azurerm_storage_account", "storage", "object_storage", "azure-storage", C::ObjectStorage),
    ("azurerm_key_vault", "key_store", "key_vault", "azure-key-vault", C::Secrets),
    ("azurerm_dns_zone", "dns", "zone", "azure-dns", C::Dns),
    ("azurerm_resource_group", "management", "resource_group", "azure-rg", C::Management),
    // Google
    ("google_compute_instance", "server", "virtual_machine", "gcp-compute", C::Compute),
    ("google_compute_instance_group_manager", "server", "instance_group", "gcp-compute", C::Compute),
    ("google_container_cluster", "cluster", "kubernetes", "gcp-gke", C::Container),
    ("google_sql_database_instance", "database", "relational", "gcp-cloud-sql", C::Database),
    ("google_compute_forwarding_rule", "load_balancer", "forwarding_rule", "gcp-lb", C::LoadBalancer),
    ("google_compute_backend_service", "load_balancer", "backend_service", "gcp-lb", C::LoadBalancer),
    ("google_compute_firewall", "firewall", "firewall_rule", "gcp-firewall", C::Security),
    ("google_compute_router", "router", "cloud_router", "gcp-router", C::Gateway),
    ("google_compute_router_nat", "gateway", "nat", "gcp-nat", C::Gateway),
    ("google_storage_bucket", "storage", "object_storage", "gcp-gcs", C::ObjectStorage),
    ("google_kms_crypto_key", "key_store", "kms", "gcp-kms", C::Secrets),
    ("google_dns_managed_zone", "dns", "zone", "gcp-dns", C::Dns),
    ("google_service_account", "identity", "service_account", "gcp-iam", C::Identity),
];

static DEVICE_PROFILES: LazyLock<HashMap<&'static str, DeviceProfile>> = LazyLock::new(|| {
    DEVICE_TABLE
        .iter()
        .map(|&(ty, device_type, subtype, icon, category)| {
            (
                ty,
                DeviceProfile {
                    device_type: device_type.to_string(),
                    device_subtype: subtype.to_string(),
                    icon: icon.to_string(),
                    category,
                },
            )
        })
        .collect()
});

// Checked in order; the first category with a matching fragment wins.
// Fragments containing `_` are matched as substrings, others as whole tokens.
static HEURISTICS: &[(ResourceCategory, &[&str])] = &[
    (C::Database, &["db", "database", "sql", "rds", "redis", "cache", "cosmosdb", "postgresql", "mysql"]),
    (C::LoadBalancer, &["lb", "alb", "elb", "load_balancer", "balancer"]),
    (C::Security, &["firewall", "security_group", "nsg", "waf", "acl"]),
    (C::Gateway, &["gateway", "nat", "vpn", "router"]),
    (C::ObjectStorage, &["bucket", "blob", "storage_account"]),
    (C::Dns, &["dns", "zone", "record"]),
    (C::Identity, &["iam", "role", "policy", "identity", "service_account", "user"]),
    (C::Secrets, &["kms", "key", "secret", "vault"]),
    (C::Monitoring, &["log", "logs", "metric", "alarm", "monitor", "alert"]),
    (C::Messaging, &["queue", "topic", "bus", "stream", "pubsub"]),
    (C::Serverless, &["function", "lambda"]),
    (C::Container, &["cluster", "kubernetes", "container", "ecs", "eks", "aks", "gke"]),
    (C::Compute, &["instance", "vm", "virtual_machine", "server", "compute"]),
    (C::Network, &["network", "route", "interface", "endpoint", "ip", "peering"]),
];

/// Container level for a resource type, if it produces a boundary.
#[must_use]
pub fn container_level(resource_type: &str) -> Option<ContainerLevel> {
    CONTAINER_TYPES
        .iter()
        .find(|(ty, _)| *ty == resource_type)
        .map(|(_, level)| *level)
}

/// Whether the type produces a boundary node.
#[must_use]
pub fn is_container(resource_type: &str) -> bool {
    container_level(resource_type).is_some()
}

/// Resource types at the given container level.
pub fn container_types(level: ContainerLevel) -> impl Iterator<Item = &'static str> {
    CONTAINER_TYPES
        .iter()
        .filter(move |(_, l)| *l == level)
        .map(|(ty, _)| *ty)
}

/// Category of a resource type, falling back to name heuristics.
#[must_use]
pub fn category(resource_type: &str) -> ResourceCategory {
    if let Some(profile) = DEVICE_PROFILES.get(resource_type) {
        return profile.category;
    }
    if is_container(resource_type) {
        return ResourceCategory::Network;
    }
    heuristic_category(resource_type)
}

fn heuristic_category(resource_type: &str) -> ResourceCategory {
    // Drop the provider prefix so `aws_` never matches anything.
    let rest = resource_type.split_once('_').map_or(resource_type, |(_, rest)| rest);
    let tokens: HashSet<&str> = rest.split('_').collect();

    HEURISTICS
        .iter()
        .find(|(_, fragments)| {
            fragments.iter().any(|frag| {
                if frag.contains('_') {
                    rest.contains(frag)
                } else {
                    tokens.contains(frag)
                }
            })
        })
        .map_or(ResourceCategory::Unclassified, |(category, _)| *category)
}

/// Device profile for a resource type. Unknown types get a profile built
/// from their heuristic category.
#[must_use]
pub fn device_profile(resource_type: &str) -> DeviceProfile {
    if let Some(profile) = DEVICE_PROFILES.get(resource_type) {
        return profile.clone();
    }
    let category = heuristic_category(resource_type);
    let subtype = resource_type.split_once('_').map_or(resource_type, |(_, rest)| rest);
    DeviceProfile {
        device_type: category.default_device_type().to_string(),
        device_subtype: subtype.to_string(),
        icon: category.default_icon().to_string(),
        category,
    }
}

/// Category policy with configured extensions.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    extra_critical: HashSet<String>,
    extra_standalone: HashSet<String>,
}

impl Catalog {
    /// Build the catalog policy from conversion options.
    #[must_use]
    pub fn new(options: &ConversionOptions) -> Self {
        Self {
            extra_critical: options.critical_types.iter().cloned().collect(),
            extra_standalone: options.standalone_types.iter().cloned().collect(),
        }
    }

    /// Whether the type is exempt from orphan checks.
    #[must_use]
    pub fn is_standalone(&self, resource_type: &str) -> bool {
        self.extra_standalone.contains(resource_type) || category(resource_type).is_standalone()
    }

    /// Whether an unconnected resource of this type deserves a warning.
    /// Standalone membership takes precedence.
    #[must_use]
    pub fn is_critical(&self, resource_type: &str) -> bool {
        if self.is_standalone(resource_type) {
            return false;
        }
        self.extra_critical.contains(resource_type) || category(resource_type).is_critical()
    }
}
