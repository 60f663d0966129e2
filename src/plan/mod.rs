//! Infrastructure plan model and loading.
//!
//! A plan is the JSON document produced by `terraform show -json <planfile>`
//! (or the OpenTofu equivalent). Only the parts this pipeline needs are
//! modelled; attribute trees stay as `serde_json::Value` and are interpreted
//! by the reference scanner alone.
//!
//! # Accepted Shape
//!
//! ```json
//! {
//!   "format_version": "1.2",
//!   "resource_changes": [
//!     {
//!       "address": "aws_vpc.main",
//!       "mode": "managed",
//!       "type": "aws_vpc",
//!       "name": "main",
//!       "provider_name": "registry.terraform.io/hashicorp/aws",
//!       "change": { "actions": ["create"], "before": null, "after": { "cidr_block": "10.0.0.0/16" } }
//!     }
//!   ]
//! }
//! ```
//!
//! The flattened form with `actions`, `before` and `after` directly on the
//! resource entry is accepted as well.

mod address;

pub use address::{strip_indices, ResourceAddress};

use crate::error::{PlanTopoError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Resource mode indicating how the resource is managed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    /// A resource the plan creates, updates or deletes
    #[default]
    Managed,
    /// A read-only data source; never becomes a node
    Data,
}

/// One planned action on a resource.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Create a new resource
    Create,
    /// Read a data source
    Read,
    /// Update in place
    Update,
    /// Destroy the resource
    Delete,
    /// Nothing changes
    NoOp,
}

/// Summary of what a resource's actions amount to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    /// Resource will be created
    Create,
    /// Data source read
    Read,
    /// In-place update
    Update,
    /// Resource will be destroyed
    Delete,
    /// Delete followed by create (or the reverse)
    Replace,
    /// Unchanged
    NoOp,
}

impl ChangeType {
    /// Derive the change type from an ordered action list.
    #[must_use]
    pub fn from_actions(actions: &[Action]) -> Self {
        let has = |a: Action| actions.contains(&a);
        if has(Action::Delete) && has(Action::Create) {
            Self::Replace
        } else if has(Action::Delete) {
            Self::Delete
        } else if has(Action::Create) {
            Self::Create
        } else if has(Action::Update) {
            Self::Update
        } else if has(Action::Read) {
            Self::Read
        } else {
            Self::NoOp
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create"),
            Self::Read => write!(f, "read"),
            Self::Update => write!(f, "update"),
            Self::Delete => write!(f, "delete"),
            Self::Replace => write!(f, "replace"),
            Self::NoOp => write!(f, "no-op"),
        }
    }
}

/// One infrastructure resource and its proposed change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceChange {
    /// Unique address within the plan (e.g., `module.net.aws_vpc.main`)
    pub address: String,
    /// Module path, if the resource lives inside a module
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_address: Option<String>,
    /// Managed resource or data source
    #[serde(default)]
    pub mode: ResourceMode,
    /// Provider-specific resource type (e.g., `aws_instance`)
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Resource name from the configuration block label
    pub name: String,
    /// Instance key for `count`/`for_each` resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<Value>,
    /// Provider source (e.g., `registry.terraform.io/hashicorp/aws`)
    pub provider_name: String,
    /// Ordered list of planned actions
    #[serde(default)]
    pub actions: Vec<Action>,
    /// Attributes before the change
    #[serde(default)]
    pub before: Option<Value>,
    /// Attributes after the change
    #[serde(default)]
    pub after: Option<Value>,
}

impl ResourceChange {
    /// Whether this resource can become a topology node.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.mode == ResourceMode::Managed
    }

    /// Change type derived from the actions.
    #[must_use]
    pub fn change_type(&self) -> ChangeType {
        ChangeType::from_actions(&self.actions)
    }

    /// Post-change attributes, falling back to the pre-change ones for deletes.
    #[must_use]
    pub fn effective_attributes(&self) -> Option<&Value> {
        self.after
            .as_ref()
            .filter(|v| !v.is_null())
            .or_else(|| self.before.as_ref().filter(|v| !v.is_null()))
    }

    /// Look up a top-level attribute.
    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.effective_attributes()?.get(key)
    }

    /// The provider-assigned identifiers (`id`, `arn`, `self_link`) that other
    /// resources may use to refer to this one once applied.
    #[must_use]
    pub fn resolved_identifiers(&self) -> Vec<&str> {
        ["id", "arn", "self_link"]
            .iter()
            .filter_map(|k| self.attribute(k).and_then(Value::as_str))
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// The instance key rendered without quotes (`0`, `web`).
    #[must_use]
    pub fn index_key(&self) -> Option<String> {
        match self.index.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    /// Parsed form of [`Self::address`].
    #[must_use]
    pub fn parsed_address(&self) -> Option<ResourceAddress> {
        ResourceAddress::parse(&self.address)
    }

    /// The `type.name` reference key.
    #[must_use]
    pub fn reference_key(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }

    /// Human label: name plus instance key when present.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.index_key() {
            Some(key) => format!("{}[{key}]", self.name),
            None => self.name.clone(),
        }
    }
}

/// A parsed plan document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Plan {
    /// Plan JSON format version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    /// Tool version that produced the plan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    /// All resource changes in plan order
    pub resource_changes: Vec<ResourceChange>,
    /// Raw `configuration` block, if present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration: Option<Value>,
}

#[derive(Deserialize)]
struct RawChange {
    #[serde(default)]
    actions: Vec<Action>,
    #[serde(default)]
    before: Option<Value>,
    #[serde(default)]
    after: Option<Value>,
}

#[derive(Deserialize)]
struct RawResourceChange {
    address: String,
    #[serde(default)]
    module_address: Option<String>,
    #[serde(default)]
    mode: ResourceMode,
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    index: Option<Value>,
    #[serde(default)]
    provider_name: Option<String>,
    #[serde(default)]
    change: Option<RawChange>,
    #[serde(default)]
    actions: Option<Vec<Action>>,
    #[serde(default)]
    before: Option<Value>,
    #[serde(default)]
    after: Option<Value>,
}

impl From<RawResourceChange> for ResourceChange {
    fn from(raw: RawResourceChange) -> Self {
        let (actions, before, after) = match raw.change {
            Some(change) => (change.actions, change.before, change.after),
            None => (raw.actions.unwrap_or_default(), raw.before, raw.after),
        };
        let provider_name = raw
            .provider_name
            .unwrap_or_else(|| default_provider_for_type(&raw.resource_type));

        Self {
            address: raw.address,
            module_address: raw.module_address,
            mode: raw.mode,
            resource_type: raw.resource_type,
            name: raw.name,
            index: raw.index.filter(|v| !v.is_null()),
            provider_name,
            actions,
            before: before.filter(|v| !v.is_null()),
            after: after.filter(|v| !v.is_null()),
        }
    }
}

/// `aws_instance` -> `registry.terraform.io/hashicorp/aws`
fn default_provider_for_type(resource_type: &str) -> String {
    let prefix = resource_type.split('_').next().unwrap_or(resource_type);
    format!("registry.terraform.io/hashicorp/{prefix}")
}

impl Plan {
    /// Parse a plan from JSON text.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPlan` if the text is not JSON, has no
    /// `resource_changes` array, contains an entry missing required fields,
    /// or repeats an address.
    pub fn from_json(content: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(content).to_invalid_plan_error("malformed plan JSON")?;

        let Some(object) = root.as_object() else {
            return Err(crate::err!(InvalidPlan {
                message: "plan document must be a JSON object".to_string(),
            }));
        };

        let Some(entries) = object.get("resource_changes").and_then(Value::as_array) else {
            return Err(crate::err!(InvalidPlan {
                message: "missing resource_changes array".to_string(),
            }));
        };

        let mut resource_changes = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();
        for (i, entry) in entries.iter().enumerate() {
            let raw: RawResourceChange = serde_json::from_value(entry.clone())
                .to_invalid_plan_error(&format!("resource_changes[{i}]"))?;
            if !seen.insert(raw.address.clone()) {
                return Err(crate::err!(InvalidPlan {
                    message: format!("duplicate resource address '{}'", raw.address),
                }));
            }
            resource_changes.push(ResourceChange::from(raw));
        }

        let plan = Self {
            format_version: object.get("format_version").and_then(Value::as_str).map(String::from),
            terraform_version: object.get("terraform_version").and_then(Value::as_str).map(String::from),
            resource_changes,
            configuration: object.get("configuration").cloned(),
        };

        tracing::debug!(
            resources = plan.resource_changes.len(),
            managed = plan.managed().count(),
            has_configuration = plan.configuration.is_some(),
            "Parsed plan"
        );

        Ok(plan)
    }

    /// Read and parse a plan file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or `InvalidPlan`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_path(path)?;
        Self::from_json(&content).map_err(|e| match e {
            PlanTopoError::InvalidPlan { message, src_path, src_line } => PlanTopoError::InvalidPlan {
                message: format!("{}: {message}", path.display()),
                src_path,
                src_line,
            },
            other => other,
        })
    }

    /// Managed resources in plan order.
    pub fn managed(&self) -> impl Iterator<Item = &ResourceChange> {
        self.resource_changes.iter().filter(|r| r.is_managed())
    }

    /// Look up a resource by address.
    #[must_use]
    pub fn get(&self, address: &str) -> Option<&ResourceChange> {
        self.resource_changes.iter().find(|r| r.address == address)
    }
}

/// Expand CLI inputs into plan files.
///
/// Files are taken as given. Directories are walked up to `max_depth`
/// levels for `*.json` files, skipping hidden entries, and each directory's
/// findings are sorted so batches run in a stable order.
///
/// # Errors
///
/// Returns `FileNotFound` if an input does not exist.
pub fn find_plans(inputs: &[PathBuf], max_depth: usize) -> Result<Vec<PathBuf>> {
    let mut plans = Vec::new();
    for input in inputs {
        if input.is_file() {
            plans.push(input.clone());
            continue;
        }
        if !input.is_dir() {
            return Err(crate::err!(FileNotFound { path: input.clone() }));
        }

        let mut found = Vec::new();
        for entry in WalkDir::new(input)
            .max_depth(max_depth)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read directory entry");
                    continue;
                }
            };
            let path = entry.path();
            if entry.file_type().is_file() && path.extension().is_some_and(|ext| ext == "json") {
                found.push(path.to_path_buf());
            }
        }
        found.sort();
        tracing::debug!(dir = %input.display(), plans = found.len(), "Found plan files");
        plans.extend(found);
    }
    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan_json(changes: Value) -> String {
        json!({ "format_version": "1.2", "resource_changes": changes }).to_string()
    }

    #[test]
    fn test_parse_nested_change_shape() {
        let content = plan_json(json!([{
            "address": "aws_vpc.main",
            "mode": "managed",
            "type": "aws_vpc",
            "name": "main",
            "provider_name": "registry.terraform.io/hashicorp/aws",
            "change": { "actions": ["create"], "before": null, "after": { "id": "vpc-1" } }
        }]));

        let plan = Plan::from_json(&content).unwrap();
        assert_eq!(plan.resource_changes.len(), 1);
        let vpc = &plan.resource_changes[0];
        assert_eq!(vpc.actions, vec![Action::Create]);
        assert_eq!(vpc.change_type(), ChangeType::Create);
        assert_eq!(vpc.resolved_identifiers(), vec!["vpc-1"]);
        assert!(vpc.before.is_none());
        assert_eq!(plan.format_version.as_deref(), Some("1.2"));
    }

    #[test]
    fn test_parse_flattened_shape_and_default_provider() {
        let content = plan_json(json!([{
            "address": "aws_subnet.a",
            "type": "aws_subnet",
            "name": "a",
            "actions": ["delete", "create"],
            "after": { "vpc_id": "vpc-1" }
        }]));

        let plan = Plan::from_json(&content).unwrap();
        let subnet = &plan.resource_changes[0];
        assert_eq!(subnet.change_type(), ChangeType::Replace);
        assert_eq!(subnet.provider_name, "registry.terraform.io/hashicorp/aws");
        assert_eq!(subnet.mode, ResourceMode::Managed);
    }

    #[test]
    fn test_reject_malformed_json() {
        let err = Plan::from_json("{not json").unwrap_err();
        assert!(matches!(err, PlanTopoError::InvalidPlan { .. }));
    }

    #[test]
    fn test_reject_missing_resource_changes() {
        let err = Plan::from_json(r#"{"format_version": "1.2"}"#).unwrap_err();
        assert!(err.to_string().contains("resource_changes"));

        let err = Plan::from_json(r#"{"resource_changes": {}}"#).unwrap_err();
        assert!(matches!(err, PlanTopoError::InvalidPlan { .. }));

        let err = Plan::from_json("[]").unwrap_err();
        assert!(matches!(err, PlanTopoError::InvalidPlan { .. }));
    }

    #[test]
    fn test_reject_duplicate_address() {
        let entry = json!({ "address": "aws_vpc.a", "type": "aws_vpc", "name": "a" });
        let content = plan_json(json!([entry.clone(), entry]));
        let err = Plan::from_json(&content).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_data_resources_are_not_managed() {
        let content = plan_json(json!([
            { "address": "data.aws_ami.base", "mode": "data", "type": "aws_ami", "name": "base",
              "change": { "actions": ["read"] } },
            { "address": "aws_vpc.a", "type": "aws_vpc", "name": "a" }
        ]));
        let plan = Plan::from_json(&content).unwrap();
        let managed: Vec<_> = plan.managed().map(|r| r.address.as_str()).collect();
        assert_eq!(managed, vec!["aws_vpc.a"]);
        assert_eq!(plan.get("data.aws_ami.base").unwrap().change_type(), ChangeType::Read);
    }

    #[test]
    fn test_effective_attributes_fall_back_to_before() {
        let content = plan_json(json!([{
            "address": "aws_vpc.old", "type": "aws_vpc", "name": "old",
            "change": { "actions": ["delete"], "before": { "id": "vpc-9" }, "after": null }
        }]));
        let plan = Plan::from_json(&content).unwrap();
        let vpc = &plan.resource_changes[0];
        assert_eq!(vpc.change_type(), ChangeType::Delete);
        assert_eq!(vpc.resolved_identifiers(), vec!["vpc-9"]);
    }

    #[test]
    fn test_index_key_and_display_name() {
        let content = plan_json(json!([
            { "address": "aws_instance.web[0]", "type": "aws_instance", "name": "web", "index": 0 },
            { "address": "aws_instance.api[\"blue\"]", "type": "aws_instance", "name": "api", "index": "blue" }
        ]));
        let plan = Plan::from_json(&content).unwrap();
        assert_eq!(plan.resource_changes[0].display_name(), "web[0]");
        assert_eq!(plan.resource_changes[1].index_key().as_deref(), Some("blue"));
    }

    #[test]
    fn test_find_plans_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("prod")).unwrap();
        std::fs::create_dir_all(dir.path().join(".cache")).unwrap();
        std::fs::write(dir.path().join("b.json"), "{}").unwrap();
        std::fs::write(dir.path().join("prod/a.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        std::fs::write(dir.path().join(".cache/old.json"), "{}").unwrap();

        let plans = find_plans(&[dir.path().to_path_buf()], 10).unwrap();
        assert_eq!(plans, vec![dir.path().join("b.json"), dir.path().join("prod/a.json")]);
    }

    #[test]
    fn test_find_plans_missing_input() {
        let err = find_plans(&[PathBuf::from("/nonexistent/plan.json")], 10).unwrap_err();
        assert!(matches!(err, PlanTopoError::FileNotFound { .. }));
    }
}
