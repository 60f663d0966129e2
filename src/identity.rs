//! Content-derived resource identity.
//!
//! Plan addresses change whenever a resource moves between modules or
//! the plan is regenerated, so repeated imports cannot rely on them. The
//! external id is built only from provider, type, name (with instance key)
//! and module path, and hashed with SHA-256, so the same resource gets the
//! same id in every process and every run.
//!
//! Format: `<provider>:<type>:<name>:<module>:<hash>` where `<module>` is
//! empty for root-module resources and `<hash>` is the first 8 hex digits
//! of `sha256("<provider>|<type>|<name>|<module>")`.

use crate::error::Result;
use crate::plan::{ResourceAddress, ResourceChange};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

const REGISTRY_HOSTS: &[&str] = &["registry.terraform.io/", "registry.opentofu.org/"];

/// Identity of a resource independent of its plan address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalResourceId {
    pub provider: String,
    pub resource_type: String,
    /// Resource name, with the instance key appended (`web[0]`)
    pub resource_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_address: Option<String>,
    pub deterministic_hash: String,
    pub full_id: String,
}

impl ExternalResourceId {
    /// Build an id from its four inputs.
    #[must_use]
    pub fn new(provider: &str, resource_type: &str, resource_name: &str, module_address: Option<&str>) -> Self {
        let provider = normalize_provider(provider);
        let module = module_address.unwrap_or_default();
        let deterministic_hash = short_hash(&format!("{provider}|{resource_type}|{resource_name}|{module}"));
        let full_id = format!("{provider}:{resource_type}:{resource_name}:{module}:{deterministic_hash}");

        Self {
            provider,
            resource_type: resource_type.to_string(),
            resource_name: resource_name.to_string(),
            module_address: module_address.filter(|m| !m.is_empty()).map(String::from),
            deterministic_hash,
            full_id,
        }
    }

    /// Split a full id back into its components.
    ///
    /// The provider contains a `/` but never a `:`; the module path never
    /// contains a `:` either, so the five fields split cleanly from both
    /// ends even when the name holds a quoted `for_each` key with colons.
    ///
    /// # Errors
    ///
    /// Returns `InvalidExternalId` if the id is malformed or its hash does
    /// not match its components.
    pub fn parse(full_id: &str) -> Result<Self> {
        let invalid = |message: &str| {
            crate::err!(InvalidExternalId {
                id: full_id.to_string(),
                message: message.to_string(),
            })
        };

        let (provider, rest) = full_id.split_once(':').ok_or_else(|| invalid("missing provider"))?;
        let (resource_type, rest) = rest.split_once(':').ok_or_else(|| invalid("missing resource type"))?;
        let (rest, hash) = rest.rsplit_once(':').ok_or_else(|| invalid("missing hash"))?;
        let (name, module) = rest.rsplit_once(':').ok_or_else(|| invalid("missing module field"))?;

        if provider.is_empty() || resource_type.is_empty() || name.is_empty() {
            return Err(invalid("empty component"));
        }
        if hash.len() != 8 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid("hash must be 8 hex digits"));
        }

        let module = (!module.is_empty()).then_some(module);
        let id = Self::new(provider, resource_type, name, module);
        if id.full_id != full_id {
            return Err(invalid("hash does not match components"));
        }
        Ok(id)
    }

    /// Whether this id denotes the resource at a plan address.
    ///
    /// Loose: compares type and name (with instance key) and, when the
    /// address carries a module path, the module.
    #[must_use]
    pub fn matches_address(&self, address: &str) -> bool {
        let Some(parsed) = ResourceAddress::parse(address) else {
            return false;
        };
        if parsed.is_data || parsed.resource_type != self.resource_type {
            return false;
        }
        let name = match &parsed.index {
            Some(index) => format!("{}[{}]", parsed.name, index.trim_matches('"')),
            None => parsed.name.clone(),
        };
        if name != self.resource_name {
            return false;
        }
        parsed.module_path.is_none() || parsed.module_path.as_deref() == self.module_address.as_deref()
    }
}

impl std::fmt::Display for ExternalResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.full_id)
    }
}

/// Identity of a planned resource.
#[must_use]
pub fn identify(resource: &ResourceChange) -> ExternalResourceId {
    ExternalResourceId::new(
        &resource.provider_name,
        &resource.resource_type,
        &resource.display_name(),
        resource.module_address.as_deref(),
    )
}

/// Parse a full id string.
///
/// # Errors
///
/// Returns `InvalidExternalId` if the id is malformed.
pub fn parse(full_id: &str) -> Result<ExternalResourceId> {
    ExternalResourceId::parse(full_id)
}

/// Whether a full id string denotes the resource at `address`. Malformed
/// ids never match.
#[must_use]
pub fn matches_address(full_id: &str, address: &str) -> bool {
    ExternalResourceId::parse(full_id).is_ok_and(|id| id.matches_address(address))
}

/// Normalize a provider reference to `namespace/name`.
///
/// - `provider["registry.terraform.io/hashicorp/aws"]` -> `hashicorp/aws`
/// - `registry.opentofu.org/hashicorp/aws` -> `hashicorp/aws`
/// - `aws` -> `hashicorp/aws`
#[must_use]
pub fn normalize_provider(provider: &str) -> String {
    let mut p = provider.trim();
    if let Some(inner) = p.strip_prefix("provider[").and_then(|s| s.strip_suffix(']')) {
        p = inner.trim_matches('"');
    }
    for host in REGISTRY_HOSTS {
        if let Some(rest) = p.strip_prefix(host) {
            p = rest;
            break;
        }
    }
    // Aliased configurations (`aws.west`) identify the same provider.
    let p = p.split_once('.').filter(|_| !p.contains('/')).map_or(p, |(name, _)| name);
    let p = p.to_ascii_lowercase();
    if p.contains('/') {
        p
    } else {
        format!("hashicorp/{p}")
    }
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::Plan;
    use serde_json::json;
    use test_case::test_case;

    #[test_case("aws", "hashicorp/aws" ; "short name")]
    #[test_case("registry.terraform.io/hashicorp/aws", "hashicorp/aws" ; "terraform registry")]
    #[test_case("registry.opentofu.org/hashicorp/google", "hashicorp/google" ; "opentofu registry")]
    #[test_case("provider[\"registry.terraform.io/hashicorp/azurerm\"]", "hashicorp/azurerm" ; "provider block")]
    #[test_case("registry.terraform.io/Acme/Cloud", "acme/cloud" ; "lowercased")]
    #[test_case("aws.west", "hashicorp/aws" ; "alias")]
    fn test_normalize_provider(input: &str, expected: &str) {
        assert_eq!(normalize_provider(input), expected);
    }

    #[test]
    fn test_same_inputs_same_id() {
        let a = ExternalResourceId::new("aws", "aws_vpc", "main", None);
        let b = ExternalResourceId::new("registry.terraform.io/hashicorp/aws", "aws_vpc", "main", Some(""));
        assert_eq!(a, b);
        assert_eq!(a.deterministic_hash.len(), 8);
        assert_eq!(a.full_id, format!("hashicorp/aws:aws_vpc:main::{}", a.deterministic_hash));
    }

    #[test]
    fn test_hash_is_stable_across_runs() {
        let id = ExternalResourceId::new("hashicorp/aws", "aws_vpc", "main", None);
        let expected = hex::encode(&Sha256::digest(b"hashicorp/aws|aws_vpc|main|")[..4]);
        assert_eq!(id.deterministic_hash, expected);
    }

    #[test]
    fn test_different_inputs_differ() {
        let root = ExternalResourceId::new("aws", "aws_vpc", "main", None);
        let module = ExternalResourceId::new("aws", "aws_vpc", "main", Some("module.net"));
        let sibling = ExternalResourceId::new("aws", "aws_vpc", "main[1]", None);
        assert_ne!(root.full_id, module.full_id);
        assert_ne!(root.full_id, sibling.full_id);
    }

    #[test]
    fn test_identify_ignores_address() {
        let plan = Plan::from_json(
            &json!({ "resource_changes": [
                { "address": "aws_instance.web[0]", "type": "aws_instance", "name": "web", "index": 0 },
                { "address": "moved.aws_instance.web[0]", "type": "aws_instance", "name": "web", "index": 0 }
            ]})
            .to_string(),
        )
        .unwrap();
        let a = identify(&plan.resource_changes[0]);
        let b = identify(&plan.resource_changes[1]);
        assert_eq!(a.full_id, b.full_id);
        assert_eq!(a.resource_name, "web[0]");
    }

    #[test]
    fn test_parse_round_trip() {
        let id = ExternalResourceId::new("aws", "aws_instance", "api[\"a:b\"]", Some("module.app"));
        let parsed = parse(&id.full_id).unwrap();
        assert_eq!(parsed, id);
    }

    #[test_case("" ; "empty")]
    #[test_case("hashicorp/aws:aws_vpc" ; "too few fields")]
    #[test_case("hashicorp/aws:aws_vpc:main::zzzzzzzz" ; "non hex hash")]
    #[test_case("hashicorp/aws:aws_vpc:main::00000000" ; "wrong hash")]
    fn test_parse_rejects(input: &str) {
        let err = parse(input).unwrap_err();
        assert!(matches!(err, crate::error::PlanTopoError::InvalidExternalId { .. }));
    }

    #[test]
    fn test_matches_address() {
        let id = ExternalResourceId::new("aws", "aws_instance", "web[0]", Some("module.app"));
        assert!(id.matches_address("module.app.aws_instance.web[0]"));
        assert!(id.matches_address("aws_instance.web[0]"));
        assert!(!id.matches_address("module.other.aws_instance.web[0]"));
        assert!(!id.matches_address("aws_instance.web[1]"));
        assert!(!id.matches_address("data.aws_instance.web[0]"));
        assert!(matches_address(&id.full_id, "aws_instance.web[0]"));
        assert!(!matches_address("garbage", "aws_instance.web[0]"));
    }
}
