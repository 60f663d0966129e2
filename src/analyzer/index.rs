//! Lookup tables over the managed resources of one plan.
//!
//! Data sources of container types (`data.aws_vpc.main`) are indexed
//! apart. They never become nodes, but a reference to one names a network
//! the topology is missing, so the analyzer falls back to them once the
//! managed resources fail to match.

use crate::catalog;
use crate::plan::{Plan, ResourceChange, ResourceMode};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Names that look like `type.name` but never denote a resource.
const NON_RESOURCE_ROOTS: &[&str] = &[
    "var", "local", "data", "module", "each", "count", "path", "self", "terraform",
];

// `aws_vpc.main`, `aws_vpc.main.id`, `aws_subnet.a[0].id`, `aws_subnet.b["x"]`
static SYMBOLIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^([a-z][a-z0-9]*_[a-z0-9_]+)\.([A-Za-z_][A-Za-z0-9_-]*)(?:\[([^\]]*)\])?(?:\.|\[|$)"#)
        .expect("Invalid regex")
});

/// Index of managed resources by symbolic key, instance key, resolved
/// identifier and `name` attribute.
#[derive(Debug)]
pub struct ResourceIndex<'a> {
    resources: Vec<&'a ResourceChange>,
    by_key: HashMap<String, Vec<usize>>,
    by_instance: HashMap<String, usize>,
    by_identifier: HashMap<&'a str, usize>,
    by_name: HashMap<&'a str, usize>,
    by_address: HashMap<&'a str, &'a ResourceChange>,
    data: Vec<&'a ResourceChange>,
    data_by_key: HashMap<String, Vec<usize>>,
    data_by_identifier: HashMap<&'a str, usize>,
    data_by_name: HashMap<&'a str, usize>,
}

impl<'a> ResourceIndex<'a> {
    /// Index the managed resources of a plan. On identifier or name clashes
    /// the first resource in plan order wins.
    #[must_use]
    pub fn new(plan: &'a Plan) -> Self {
        let resources: Vec<&ResourceChange> = plan.managed().collect();
        let data: Vec<&ResourceChange> = plan
            .resource_changes
            .iter()
            .filter(|r| r.mode == ResourceMode::Data && catalog::is_container(&r.resource_type))
            .collect();
        let mut index = Self {
            by_key: HashMap::new(),
            by_instance: HashMap::new(),
            by_identifier: HashMap::new(),
            by_name: HashMap::new(),
            by_address: HashMap::new(),
            data_by_key: HashMap::new(),
            data_by_identifier: HashMap::new(),
            data_by_name: HashMap::new(),
            resources,
            data,
        };

        for (i, &resource) in index.resources.iter().enumerate() {
            index.by_key.entry(resource.reference_key()).or_default().push(i);
            if let Some(key) = resource.index_key() {
                index
                    .by_instance
                    .entry(format!("{}[{key}]", resource.reference_key()))
                    .or_insert(i);
            }
            for identifier in resource.resolved_identifiers() {
                index.by_identifier.entry(identifier).or_insert(i);
            }
            if let Some(name) = resource.attribute("name").and_then(Value::as_str) {
                if !name.is_empty() {
                    index.by_name.entry(name).or_insert(i);
                }
            }
            index.by_address.insert(resource.address.as_str(), resource);
        }

        for (i, &source) in index.data.iter().enumerate() {
            index.data_by_key.entry(source.reference_key()).or_default().push(i);
            for identifier in source.resolved_identifiers() {
                index.data_by_identifier.entry(identifier).or_insert(i);
            }
            if let Some(name) = source.attribute("name").and_then(Value::as_str) {
                if !name.is_empty() {
                    index.data_by_name.entry(name).or_insert(i);
                }
            }
            index.by_address.insert(source.address.as_str(), source);
        }

        index
    }

    /// All indexed resources in plan order.
    #[must_use]
    pub fn resources(&self) -> &[&'a ResourceChange] {
        &self.resources
    }

    /// Container-type data sources in plan order.
    #[must_use]
    pub fn data_containers(&self) -> &[&'a ResourceChange] {
        &self.data
    }

    /// Look up by exact plan address, managed resource or container data
    /// source.
    #[must_use]
    pub fn by_address(&self, address: &str) -> Option<&'a ResourceChange> {
        self.by_address.get(address).copied()
    }

    /// Resolve `type.name` (with optional instance key) as seen from `from`.
    ///
    /// The instance key is tried first. Among several candidates the one in
    /// the same module wins, otherwise the first in plan order.
    #[must_use]
    pub fn resolve_symbolic(
        &self,
        from: &ResourceChange,
        resource_type: &str,
        name: &str,
        index: Option<&str>,
    ) -> Option<&'a ResourceChange> {
        let key = format!("{resource_type}.{name}");

        if let Some(raw) = index {
            let unquoted = raw.trim().trim_matches('"');
            let same_module_instance = self.by_key.get(&key).and_then(|candidates| {
                candidates
                    .iter()
                    .map(|&i| self.resources[i])
                    .find(|r| r.module_address == from.module_address && r.index_key().as_deref() == Some(unquoted))
            });
            if let Some(found) = same_module_instance {
                return Some(found);
            }
            if let Some(&i) = self.by_instance.get(&format!("{key}[{unquoted}]")) {
                return Some(self.resources[i]);
            }
        }

        let candidates = self.by_key.get(&key)?;
        candidates
            .iter()
            .map(|&i| self.resources[i])
            .find(|r| r.module_address == from.module_address)
            .or_else(|| candidates.first().map(|&i| self.resources[i]))
    }

    /// Resolve a string that may be a symbolic reference (`aws_vpc.main.id`).
    #[must_use]
    pub fn resolve_reference_text(&self, from: &ResourceChange, text: &str) -> Option<&'a ResourceChange> {
        let (resource_type, name, index) = parse_reference(text)?;
        self.resolve_symbolic(from, resource_type, name, index)
    }

    /// Resolve a provider-assigned identifier (`id`, `arn`, `self_link`).
    #[must_use]
    pub fn resolve_identifier(&self, value: &str) -> Option<&'a ResourceChange> {
        self.by_identifier.get(value).map(|&i| self.resources[i])
    }

    /// Resolve a `name` attribute value.
    #[must_use]
    pub fn resolve_name(&self, value: &str) -> Option<&'a ResourceChange> {
        self.by_name.get(value).map(|&i| self.resources[i])
    }

    /// Resolve an attribute value: identifier first, then symbolic text,
    /// then (when allowed) the `name` attribute.
    #[must_use]
    pub fn resolve_value(&self, from: &ResourceChange, value: &str, allow_name: bool) -> Option<&'a ResourceChange> {
        if value.is_empty() {
            return None;
        }
        self.resolve_identifier(value)
            .or_else(|| self.resolve_reference_text(from, value))
            .or_else(|| if allow_name { self.resolve_name(value) } else { None })
            // GCP self links end in the resource name
            .or_else(|| {
                let tail = value.rsplit('/').next().filter(|t| *t != value)?;
                if allow_name { self.resolve_name(tail) } else { None }
            })
    }

    /// Resolve `data.type.name` (with optional instance key) against the
    /// container data sources, preferring the instance key and then the
    /// module of `from`.
    #[must_use]
    pub fn resolve_data(
        &self,
        from: &ResourceChange,
        resource_type: &str,
        name: &str,
        index: Option<&str>,
    ) -> Option<&'a ResourceChange> {
        let all: Vec<&'a ResourceChange> = self
            .data_by_key
            .get(&format!("{resource_type}.{name}"))?
            .iter()
            .map(|&i| self.data[i])
            .collect();
        let wanted = index.map(|raw| raw.trim().trim_matches('"'));
        let keyed: Vec<&'a ResourceChange> = all
            .iter()
            .copied()
            .filter(|r| wanted.is_some() && r.index_key().as_deref() == wanted)
            .collect();
        let candidates = if keyed.is_empty() { all } else { keyed };

        candidates
            .iter()
            .find(|r| r.module_address == from.module_address)
            .or_else(|| candidates.first())
            .copied()
    }

    /// Resolve `data.aws_vpc.main.id` style text.
    #[must_use]
    pub fn resolve_data_text(&self, from: &ResourceChange, text: &str) -> Option<&'a ResourceChange> {
        let rest = text.trim().strip_prefix("data.")?;
        let (resource_type, name, index) = parse_reference(rest)?;
        self.resolve_data(from, resource_type, name, index)
    }

    /// [`Self::resolve_value`] over the container data sources.
    #[must_use]
    pub fn resolve_data_value(&self, from: &ResourceChange, value: &str, allow_name: bool) -> Option<&'a ResourceChange> {
        if value.is_empty() {
            return None;
        }
        let by_name = |name: &str| {
            if allow_name {
                self.data_by_name.get(name).map(|&i| self.data[i])
            } else {
                None
            }
        };
        self.data_by_identifier
            .get(value)
            .map(|&i| self.data[i])
            .or_else(|| self.resolve_data_text(from, value))
            .or_else(|| by_name(value))
            .or_else(|| by_name(value.rsplit('/').next().filter(|t| *t != value)?))
    }
}

/// Parse `type.name[index]...` into its parts. Rejects non-resource roots.
#[must_use]
pub fn parse_reference(text: &str) -> Option<(&str, &str, Option<&str>)> {
    let caps = SYMBOLIC.captures(text.trim())?;
    let resource_type = caps.get(1)?.as_str();
    if NON_RESOURCE_ROOTS.contains(&resource_type) {
        return None;
    }
    Some((resource_type, caps.get(2)?.as_str(), caps.get(3).map(|m| m.as_str())))
}

/// Non-empty string values at a dotted attribute path. Arrays are
/// flattened at every level, so `vpc_config.subnet_ids` reads every subnet
/// id of every `vpc_config` block.
#[must_use]
pub fn attribute_strings<'a>(resource: &'a ResourceChange, path: &str) -> Vec<&'a str> {
    let Some(root) = resource.effective_attributes() else {
        return Vec::new();
    };

    let mut current: Vec<&Value> = vec![root];
    for segment in path.split('.') {
        current = current
            .into_iter()
            .flat_map(|v| match v {
                Value::Array(items) => items.iter().filter_map(|i| i.get(segment)).collect::<Vec<_>>(),
                other => other.get(segment).into_iter().collect(),
            })
            .collect();
    }

    current
        .into_iter()
        .flat_map(|v| match v {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        })
        .filter(|s| !s.is_empty())
        .collect()
}

/// Whether a reference root names something other than a resource.
#[must_use]
pub fn is_non_resource_root(root: &str) -> bool {
    NON_RESOURCE_ROOTS.contains(&root)
}
