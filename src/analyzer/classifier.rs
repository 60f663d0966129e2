//! Relationship classification.
//!
//! A reference between two resources means different things depending on
//! where it was found: `aws_instance.subnet_id` pointing at an `aws_subnet`
//! places the instance on that network, while `vpc_security_group_ids`
//! pointing at an `aws_security_group` puts it under that group's control.
//! The knowledge lives in a per-provider table; the matching algorithm below
//! never needs to change when the table grows.

use crate::config::RuleConfig;
use crate::plan::strip_indices;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a reference implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Network adjacency or placement
    Network,
    /// Security control
    Security,
    /// Generic dependency
    Dependency,
}

/// Attribute paths that imply a relationship with one target type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Rule {
    pub target_type: String,
    pub network: Vec<String>,
    pub security: Vec<String>,
}

impl Rule {
    fn new(target_type: &str, network: &[&str], security: &[&str]) -> Self {
        Self {
            target_type: target_type.to_string(),
            network: network.iter().map(|p| (*p).to_string()).collect(),
            security: security.iter().map(|p| (*p).to_string()).collect(),
        }
    }
}

type RuleRow = (&'static str, &'static str, &'static str, &'static [&'static str], &'static [&'static str]);

// (provider, source type, target type, network paths, security paths)
static DEFAULT_RULES: &[RuleRow] = &[
    // AWS
    ("aws", "aws_subnet", "aws_vpc", &["vpc_id"], &[]),
    ("aws", "aws_default_subnet", "aws_default_vpc", &["vpc_id"], &[]),
    ("aws", "aws_internet_gateway", "aws_vpc", &["vpc_id"], &[]),
    ("aws", "aws_egress_only_internet_gateway", "aws_vpc", &["vpc_id"], &[]),
    ("aws", "aws_vpn_gateway", "aws_vpc", &["vpc_id"], &[]),
    ("aws", "aws_nat_gateway", "aws_subnet", &["subnet_id"], &[]),
    ("aws", "aws_nat_gateway", "aws_eip", &["allocation_id"], &[]),
    ("aws", "aws_route_table", "aws_vpc", &["vpc_id"], &[]),
    ("aws", "aws_route_table", "aws_internet_gateway", &["route"], &[]),
    ("aws", "aws_route_table", "aws_nat_gateway", &["route"], &[]),
    ("aws", "aws_route", "aws_route_table", &["route_table_id"], &[]),
    ("aws", "aws_route", "aws_internet_gateway", &["gateway_id"], &[]),
    ("aws", "aws_route", "aws_nat_gateway", &["nat_gateway_id"], &[]),
    ("aws", "aws_route_table_association", "aws_subnet", &["subnet_id"], &[]),
    ("aws", "aws_route_table_association", "aws_route_table", &["route_table_id"], &[]),
    ("aws", "aws_network_acl", "aws_vpc", &["vpc_id"], &[]),
    ("aws", "aws_network_acl", "aws_subnet", &[], &["subnet_ids"]),
    ("aws", "aws_security_group", "aws_vpc", &["vpc_id"], &[]),
    ("aws", "aws_security_group_rule", "aws_security_group", &[], &["security_group_id", "source_security_group_id"]),
    ("aws", "aws_vpc_security_group_ingress_rule", "aws_security_group", &[], &["security_group_id", "referenced_security_group_id"]),
    ("aws", "aws_vpc_security_group_egress_rule", "aws_security_group", &[], &["security_group_id", "referenced_security_group_id"]),
    ("aws", "aws_instance", "aws_subnet", &["subnet_id", "network_interface"], &[]),
    ("aws", "aws_instance", "aws_security_group", &[], &["vpc_security_group_ids", "security_groups"]),
    ("aws", "aws_instance", "aws_network_interface", &["network_interface"], &[]),
    ("aws", "aws_network_interface", "aws_subnet", &["subnet_id"], &[]),
    ("aws", "aws_network_interface", "aws_security_group", &[], &["security_groups"]),
    ("aws", "aws_eip", "aws_instance", &["instance"], &[]),
    ("aws", "aws_eip", "aws_network_interface", &["network_interface"], &[]),
    ("aws", "aws_launch_template", "aws_security_group", &[], &["vpc_security_group_ids", "network_interfaces"]),
    ("aws", "aws_launch_template", "aws_subnet", &["network_interfaces"], &[]),
    ("aws", "aws_autoscaling_group", "aws_subnet", &["vpc_zone_identifier"], &[]),
    ("aws", "aws_autoscaling_group", "aws_lb_target_group", &["target_group_arns"], &[]),
    ("aws", "aws_lb", "aws_subnet", &["subnets", "subnet_mapping"], &[]),
    ("aws", "aws_lb", "aws_security_group", &[], &["security_groups"]),
    ("aws", "aws_alb", "aws_subnet", &["subnets", "subnet_mapping"], &[]),
    ("aws", "aws_alb", "aws_security_group", &[], &["security_groups"]),
    ("aws", "aws_elb", "aws_subnet", &["subnets"], &[]),
    ("aws", "aws_elb", "aws_security_group", &[], &["security_groups"]),
    ("aws", "aws_elb", "aws_instance", &["instances"], &[]),
    ("aws", "aws_lb_target_group", "aws_vpc", &["vpc_id"], &[]),
    ("aws", "aws_lb_listener", "aws_lb", &["load_balancer_arn"], &[]),
    ("aws", "aws_lb_listener", "aws_lb_target_group", &["default_action"], &[]),
    ("aws", "aws_lb_target_group_attachment", "aws_lb_target_group", &["target_group_arn"], &[]),
    ("aws", "aws_lb_target_group_attachment", "aws_instance", &["target_id"], &[]),
    ("aws", "aws_db_instance", "aws_db_subnet_group", &["db_subnet_group_name"], &[]),
    ("aws", "aws_db_instance", "aws_security_group", &[], &["vpc_security_group_ids"]),
    ("aws", "aws_rds_cluster", "aws_db_subnet_group", &["db_subnet_group_name"], &[]),
    ("aws", "aws_rds_cluster", "aws_security_group", &[], &["vpc_security_group_ids"]),
    ("aws", "aws_rds_cluster_instance", "aws_rds_cluster", &["cluster_identifier"], &[]),
    ("aws", "aws_db_subnet_group", "aws_subnet", &["subnet_ids"], &[]),
    ("aws", "aws_elasticache_cluster", "aws_elasticache_subnet_group", &["subnet_group_name"], &[]),
    ("aws", "aws_elasticache_cluster", "aws_security_group", &[], &["security_group_ids"]),
    ("aws", "aws_elasticache_replication_group", "aws_elasticache_subnet_group", &["subnet_group_name"], &[]),
    ("aws", "aws_elasticache_replication_group", "aws_security_group", &[], &["security_group_ids"]),
    ("aws", "aws_elasticache_subnet_group", "aws_subnet", &["subnet_ids"], &[]),
    ("aws", "aws_lambda_function", "aws_subnet", &["vpc_config"], &[]),
    ("aws", "aws_lambda_function", "aws_security_group", &[], &["vpc_config.security_group_ids"]),
    ("aws", "aws_ecs_service", "aws_subnet", &["network_configuration"], &[]),
    ("aws", "aws_ecs_service", "aws_security_group", &[], &["network_configuration.security_groups"]),
    ("aws", "aws_ecs_service", "aws_lb_target_group", &["load_balancer"], &[]),
    ("aws", "aws_eks_cluster", "aws_subnet", &["vpc_config"], &[]),
    ("aws", "aws_eks_cluster", "aws_security_group", &[], &["vpc_config.security_group_ids"]),
    ("aws", "aws_eks_node_group", "aws_subnet", &["subnet_ids"], &[]),
    ("aws", "aws_efs_mount_target", "aws_subnet", &["subnet_id"], &[]),
    ("aws", "aws_efs_mount_target", "aws_security_group", &[], &["security_groups"]),
    ("aws", "aws_efs_mount_target", "aws_efs_file_system", &["file_system_id"], &[]),
    ("aws", "aws_vpc_endpoint", "aws_vpc", &["vpc_id"], &[]),
    ("aws", "aws_vpc_endpoint", "aws_subnet", &["subnet_ids"], &[]),
    ("aws", "aws_vpc_endpoint", "aws_security_group", &[], &["security_group_ids"]),
    ("aws", "aws_vpc_peering_connection", "aws_vpc", &["vpc_id", "peer_vpc_id"], &[]),
    ("aws", "aws_wafv2_web_acl_association", "aws_lb", &[], &["resource_arn"]),
    ("aws", "aws_wafv2_web_acl_association", "aws_wafv2_web_acl", &[], &["web_acl_arn"]),
    // Azure
    ("azurerm", "azurerm_subnet", "azurerm_virtual_network", &["virtual_network_name"], &[]),
    ("azurerm", "azurerm_network_interface", "azurerm_subnet", &["ip_configuration"], &[]),
    ("azurerm", "azurerm_linux_virtual_machine", "azurerm_network_interface", &["network_interface_ids"], &[]),
    ("azurerm", "azurerm_windows_virtual_machine", "azurerm_network_interface", &["network_interface_ids"], &[]),
    ("azurerm", "azurerm_virtual_machine", "azurerm_network_interface", &["network_interface_ids"], &[]),
    ("azurerm", "azurerm_subnet_network_security_group_association", "azurerm_subnet", &["subnet_id"], &[]),
    ("azurerm", "azurerm_subnet_network_security_group_association", "azurerm_network_security_group", &[], &["network_security_group_id"]),
    ("azurerm", "azurerm_network_interface_security_group_association", "azurerm_network_interface", &["network_interface_id"], &[]),
    ("azurerm", "azurerm_network_interface_security_group_association", "azurerm_network_security_group", &[], &["network_security_group_id"]),
    ("azurerm", "azurerm_network_security_rule", "azurerm_network_security_group", &[], &["network_security_group_name"]),
    ("azurerm", "azurerm_lb", "azurerm_public_ip", &["frontend_ip_configuration"], &[]),
    ("azurerm", "azurerm_lb", "azurerm_subnet", &["frontend_ip_configuration"], &[]),
    ("azurerm", "azurerm_application_gateway", "azurerm_subnet", &["gateway_ip_configuration", "frontend_ip_configuration"], &[]),
    ("azurerm", "azurerm_application_gateway", "azurerm_public_ip", &["frontend_ip_configuration"], &[]),
    ("azurerm", "azurerm_nat_gateway_public_ip_association", "azurerm_nat_gateway", &["nat_gateway_id"], &[]),
    ("azurerm", "azurerm_subnet_nat_gateway_association", "azurerm_subnet", &["subnet_id"], &[]),
    ("azurerm", "azurerm_subnet_nat_gateway_association", "azurerm_nat_gateway", &["nat_gateway_id"], &[]),
    ("azurerm", "azurerm_virtual_network_gateway", "azurerm_subnet", &["ip_configuration"], &[]),
    ("azurerm", "azurerm_firewall", "azurerm_subnet", &["ip_configuration"], &[]),
    ("azurerm", "azurerm_bastion_host", "azurerm_subnet", &["ip_configuration"], &[]),
    ("azurerm", "azurerm_private_endpoint", "azurerm_subnet", &["subnet_id"], &[]),
    ("azurerm", "azurerm_kubernetes_cluster", "azurerm_subnet", &["default_node_pool.vnet_subnet_id"], &[]),
    ("azurerm", "azurerm_postgresql_flexible_server", "azurerm_subnet", &["delegated_subnet_id"], &[]),
    ("azurerm", "azurerm_mysql_flexible_server", "azurerm_subnet", &["delegated_subnet_id"], &[]),
    ("azurerm", "azurerm_virtual_network_peering", "azurerm_virtual_network", &["virtual_network_name", "remote_virtual_network_id"], &[]),
    // GCP
    ("google", "google_compute_subnetwork", "google_compute_network", &["network"], &[]),
    ("google", "google_compute_instance", "google_compute_subnetwork", &["network_interface"], &[]),
    ("google", "google_compute_instance", "google_compute_network", &["network_interface"], &[]),
    ("google", "google_compute_instance_template", "google_compute_subnetwork", &["network_interface"], &[]),
    ("google", "google_compute_instance_template", "google_compute_network", &["network_interface"], &[]),
    ("google", "google_compute_firewall", "google_compute_network", &[], &["network"]),
    ("google", "google_compute_router", "google_compute_network", &["network"], &[]),
    ("google", "google_compute_router_nat", "google_compute_router", &["router"], &[]),
    ("google", "google_compute_route", "google_compute_network", &["network"], &[]),
    ("google", "google_compute_forwarding_rule", "google_compute_subnetwork", &["subnetwork"], &[]),
    ("google", "google_compute_forwarding_rule", "google_compute_network", &["network"], &[]),
    ("google", "google_compute_forwarding_rule", "google_compute_region_backend_service", &["backend_service"], &[]),
    ("google", "google_compute_global_forwarding_rule", "google_compute_target_http_proxy", &["target"], &[]),
    ("google", "google_compute_global_forwarding_rule", "google_compute_target_https_proxy", &["target"], &[]),
    ("google", "google_container_cluster", "google_compute_network", &["network"], &[]),
    ("google", "google_container_cluster", "google_compute_subnetwork", &["subnetwork"], &[]),
    ("google", "google_sql_database_instance", "google_compute_network", &["settings.ip_configuration"], &[]),
    ("google", "google_redis_instance", "google_compute_network", &["authorized_network"], &[]),
    ("google", "google_vpc_access_connector", "google_compute_network", &["network"], &[]),
    ("google", "google_compute_security_policy", "google_compute_backend_service", &[], &["security_policy"]),
    ("google", "google_compute_backend_service", "google_compute_security_policy", &[], &["security_policy"]),
];

/// Provider short name of a resource type (`aws_instance` -> `aws`).
#[must_use]
pub fn provider_of(resource_type: &str) -> &str {
    resource_type.split('_').next().unwrap_or(resource_type)
}

/// Classification rules keyed by provider, then source type.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    providers: HashMap<String, HashMap<String, Vec<Rule>>>,
}

impl RuleRegistry {
    /// The built-in AWS, Azure and GCP rules.
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        for (provider, source, target, network, security) in DEFAULT_RULES {
            registry.add(provider, source, Rule::new(target, network, security));
        }
        registry
    }

    /// Register one rule. Rules for the same source/target pair merge.
    pub fn add(&mut self, provider: &str, source_type: &str, rule: Rule) {
        let rules = self
            .providers
            .entry(provider.to_string())
            .or_default()
            .entry(source_type.to_string())
            .or_default();

        match rules.iter_mut().find(|r| r.target_type == rule.target_type) {
            Some(existing) => {
                existing.network.extend(rule.network);
                existing.security.extend(rule.security);
            }
            None => rules.push(rule),
        }
    }

    /// Add rules from configuration.
    pub fn extend(&mut self, rules: &[RuleConfig]) {
        for rule in rules {
            self.add(
                &rule.provider,
                &rule.source_type,
                Rule {
                    target_type: rule.target_type.clone(),
                    network: rule.network.clone(),
                    security: rule.security.clone(),
                },
            );
        }
    }

    /// Rules for a source type.
    #[must_use]
    pub fn rules_for(&self, source_type: &str) -> &[Rule] {
        self.providers
            .get(provider_of(source_type))
            .and_then(|types| types.get(source_type))
            .map_or(&[], Vec::as_slice)
    }

    /// Number of registered source types across all providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.values().map(HashMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Classify a reference from `source_type` to `target_type` found at
    /// `attribute_path`. Network paths are checked before security paths.
    #[must_use]
    pub fn classify(&self, source_type: &str, target_type: &str, attribute_path: &str) -> Classification {
        let Some(rule) = self.rules_for(source_type).iter().find(|r| r.target_type == target_type) else {
            return Classification::Dependency;
        };

        if rule.network.iter().any(|p| path_matches(attribute_path, p)) {
            Classification::Network
        } else if rule.security.iter().any(|p| path_matches(attribute_path, p)) {
            Classification::Security
        } else {
            Classification::Dependency
        }
    }
}

/// Whether an attribute path satisfies a rule path.
///
/// Accepts exact matches, matches after stripping array indices, and
/// dotted-prefix matches.
#[must_use]
pub fn path_matches(path: &str, rule: &str) -> bool {
    if path == rule {
        return true;
    }
    let stripped = strip_indices(path);
    stripped == rule
        || stripped
            .strip_prefix(rule)
            .is_some_and(|rest| rest.starts_with('.'))
}
