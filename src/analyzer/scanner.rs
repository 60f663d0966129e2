//! Reference scanning over attribute trees.
//!
//! This is the only place that interprets raw attribute values. Every
//! managed resource's post-change attributes are walked depth-first
//! (object keys in order, arrays by index) and every string is matched
//! against two patterns:
//!
//! - interpolation, `${aws_vpc.main.id}`: high confidence
//! - bare dotted paths with a known provider prefix, `aws_vpc.main.id`:
//!   high confidence if the string is nothing but the reference, medium
//!   when it is embedded in a larger string
//!
//! The optional `configuration` block of a plan carries the same kind of
//! information in structured form (`expressions.*.references` and
//! `depends_on`); it is read here as well.
//!
//! Matches that do not resolve to a managed resource of the same plan are
//! dropped silently. Most of them are unrelated strings. The exception is
//! `data.` references to container types (`${data.aws_vpc.main.id}`), which
//! resolve to the data source so the missing network can be reported.

use crate::analyzer::index::{is_non_resource_root, ResourceIndex};
use crate::config::AnalysisOptions;
use crate::error::Result;
use crate::plan::{Plan, ResourceChange};
use crate::types::Confidence;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Provider prefixes recognized by the bare reference pattern.
pub const DEFAULT_PROVIDER_PREFIXES: &[&str] = &[
    "aws_",
    "azurerm_",
    "azuread_",
    "google_",
    "kubernetes_",
    "helm_",
    "oci_",
    "digitalocean_",
    "alicloud_",
    "ibm_",
    "vsphere_",
    "cloudflare_",
    "openstack_",
];

static INTERPOLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$\{\s*([a-z][a-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_-]*)(?:\[([^\]]*)\])?"#).expect("Invalid regex")
});

static DATA_INTERPOLATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$\{\s*data\.([a-z][a-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_-]*)(?:\[([^\]]*)\])?"#).expect("Invalid regex")
});

// Whatever may follow a reference when the string is the reference alone.
static TRAVERSAL_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(?:\.[A-Za-z0-9_*-]+|\[[^\]]*\])*$"#).expect("Invalid regex"));

/// How a reference was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceSyntax {
    /// `${type.name...}`
    Interpolation,
    /// `type.name...`
    Bare,
    /// `configuration` expression reference
    Expression,
    /// `configuration` `depends_on` entry
    DependsOn,
}

/// A reference found in one resource's attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReference {
    pub source: String,
    pub target: String,
    /// Where in the source's attributes the reference was found
    pub attribute_path: String,
    pub confidence: Confidence,
    pub syntax: ReferenceSyntax,
}

/// Extracts cross-resource references.
#[derive(Debug, Clone)]
pub struct ReferenceScanner {
    bare: Regex,
}

impl ReferenceScanner {
    /// Build a scanner recognizing the default prefixes plus configured extras.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValue` if the resulting pattern does not compile.
    pub fn new(options: &AnalysisOptions) -> Result<Self> {
        let prefixes: Vec<String> = DEFAULT_PROVIDER_PREFIXES
            .iter()
            .map(|p| (*p).to_string())
            .chain(options.extra_provider_prefixes.iter().cloned())
            .map(|p| regex::escape(&p))
            .collect();
        let pattern = format!(
            r#"\b((?:{})[a-z0-9_]+)\.([A-Za-z_][A-Za-z0-9_-]*)(?:\[([^\]]*)\])?"#,
            prefixes.join("|")
        );
        let bare = Regex::new(&pattern).map_err(|e| {
            crate::err!(ConfigValue {
                key: "analysis.extra_provider_prefixes".to_string(),
                message: e.to_string(),
            })
        })?;
        Ok(Self { bare })
    }

    /// Scan every managed resource of the plan.
    ///
    /// References are deduplicated per `(source, target)`, keeping the
    /// highest confidence and the first attribute path at that confidence.
    /// Self references are dropped.
    #[must_use]
    pub fn scan(&self, plan: &Plan, index: &ResourceIndex<'_>) -> Vec<RawReference> {
        let mut found = Vec::new();

        for &resource in index.resources() {
            if let Some(after) = resource.after.as_ref() {
                let mut walker = Walker {
                    scanner: self,
                    index,
                    source: resource,
                    out: &mut found,
                };
                walker.visit(after, String::new());
            }
        }

        if let Some(configuration) = plan.configuration.as_ref() {
            scan_configuration(configuration, index, &mut found);
        }

        let refs = dedupe(found);
        tracing::debug!(references = refs.len(), "Reference scan complete");
        refs
    }

    fn scan_string(&self, text: &str, path: &str, walker: &mut Walker<'_, '_>) {
        for caps in INTERPOLATION.captures_iter(text) {
            let (Some(ty), Some(name)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            if is_non_resource_root(ty.as_str()) {
                continue;
            }
            walker.emit(
                ty.as_str(),
                name.as_str(),
                caps.get(3).map(|m| m.as_str()),
                path,
                Confidence::High,
                ReferenceSyntax::Interpolation,
            );
        }

        for caps in DATA_INTERPOLATION.captures_iter(text) {
            let (Some(ty), Some(name)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            walker.emit_data(
                ty.as_str(),
                name.as_str(),
                caps.get(3).map(|m| m.as_str()),
                path,
                Confidence::High,
                ReferenceSyntax::Interpolation,
            );
        }

        for caps in self.bare.captures_iter(text) {
            let (Some(whole), Some(ty), Some(name)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                continue;
            };
            let index = caps.get(3).map(|m| m.as_str());
            let rest = &text[whole.end()..];
            if let Some(before) = text[..whole.start()].strip_suffix("data.") {
                let exact = before.is_empty() && TRAVERSAL_ONLY.is_match(rest);
                let confidence = if exact { Confidence::High } else { Confidence::Medium };
                walker.emit_data(ty.as_str(), name.as_str(), index, path, confidence, ReferenceSyntax::Bare);
                continue;
            }
            let exact = whole.start() == 0 && TRAVERSAL_ONLY.is_match(rest);
            let confidence = if exact { Confidence::High } else { Confidence::Medium };
            walker.emit(ty.as_str(), name.as_str(), index, path, confidence, ReferenceSyntax::Bare);
        }
    }
}

struct Walker<'s, 'a> {
    scanner: &'s ReferenceScanner,
    index: &'s ResourceIndex<'a>,
    source: &'a ResourceChange,
    out: &'s mut Vec<RawReference>,
}

impl Walker<'_, '_> {
    fn visit(&mut self, value: &Value, path: String) {
        match value {
            Value::String(text) => {
                let scanner = self.scanner;
                scanner.scan_string(text, &path, self);
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.visit(item, format!("{path}[{i}]"));
                }
            }
            Value::Object(map) => {
                for (key, item) in map {
                    let child = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                    self.visit(item, child);
                }
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => {}
        }
    }

    fn emit(
        &mut self,
        resource_type: &str,
        name: &str,
        index: Option<&str>,
        path: &str,
        confidence: Confidence,
        syntax: ReferenceSyntax,
    ) {
        let target = self.index.resolve_symbolic(self.source, resource_type, name, index);
        self.push(target, path, confidence, syntax);
    }

    /// Like [`Self::emit`], for a `data.` reference.
    fn emit_data(
        &mut self,
        resource_type: &str,
        name: &str,
        index: Option<&str>,
        path: &str,
        confidence: Confidence,
        syntax: ReferenceSyntax,
    ) {
        let target = self.index.resolve_data(self.source, resource_type, name, index);
        self.push(target, path, confidence, syntax);
    }

    fn push(&mut self, target: Option<&ResourceChange>, path: &str, confidence: Confidence, syntax: ReferenceSyntax) {
        let Some(target) = target else {
            return;
        };
        if target.address == self.source.address {
            return;
        }
        self.out.push(RawReference {
            source: self.source.address.clone(),
            target: target.address.clone(),
            attribute_path: path.to_string(),
            confidence,
            syntax,
        });
    }
}

/// Read `expressions.*.references` and `depends_on` from the configuration
/// block, recursing through `module_calls`.
fn scan_configuration(configuration: &Value, index: &ResourceIndex<'_>, out: &mut Vec<RawReference>) {
    fn visit_module(module: &Value, module_path: Option<&str>, index: &ResourceIndex<'_>, out: &mut Vec<RawReference>) {
        for resource in module.get("resources").and_then(Value::as_array).into_iter().flatten() {
            if resource.get("mode").and_then(Value::as_str) == Some("data") {
                continue;
            }
            let (Some(ty), Some(name)) = (
                resource.get("type").and_then(Value::as_str),
                resource.get("name").and_then(Value::as_str),
            ) else {
                continue;
            };

            // Every planned instance of the configured resource is a source.
            let sources: Vec<&ResourceChange> = index
                .resources()
                .iter()
                .copied()
                .filter(|r| r.resource_type == ty && r.name == name && r.module_address.as_deref() == module_path)
                .collect();
            if sources.is_empty() {
                continue;
            }

            let mut refs: Vec<(String, String, ReferenceSyntax)> = Vec::new();
            if let Some(expressions) = resource.get("expressions") {
                collect_expression_refs(expressions, String::new(), &mut refs);
            }
            for dep in resource.get("depends_on").and_then(Value::as_array).into_iter().flatten() {
                if let Some(text) = dep.as_str() {
                    refs.push((text.to_string(), "depends_on".to_string(), ReferenceSyntax::DependsOn));
                }
            }

            for source in &sources {
                for (text, path, syntax) in &refs {
                    let target = index
                        .resolve_reference_text(source, text)
                        .or_else(|| index.resolve_data_text(source, text));
                    let Some(target) = target else {
                        continue;
                    };
                    if target.address == source.address {
                        continue;
                    }
                    out.push(RawReference {
                        source: source.address.clone(),
                        target: target.address.clone(),
                        attribute_path: path.clone(),
                        confidence: Confidence::High,
                        syntax: *syntax,
                    });
                }
            }
        }

        for (call_name, call) in module.get("module_calls").and_then(Value::as_object).into_iter().flatten() {
            let Some(child) = call.get("module") else {
                continue;
            };
            let child_path = match module_path {
                Some(parent) => format!("{parent}.module.{call_name}"),
                None => format!("module.{call_name}"),
            };
            visit_module(child, Some(&child_path), index, out);
        }
    }

    if let Some(root) = configuration.get("root_module") {
        visit_module(root, None, index, out);
    }
}

fn collect_expression_refs(value: &Value, path: String, out: &mut Vec<(String, String, ReferenceSyntax)>) {
    match value {
        Value::Object(map) => {
            if let Some(references) = map.get("references").and_then(Value::as_array) {
                for reference in references.iter().filter_map(Value::as_str) {
                    out.push((reference.to_string(), path.clone(), ReferenceSyntax::Expression));
                }
                return;
            }
            for (key, item) in map {
                let child = if path.is_empty() { key.clone() } else { format!("{path}.{key}") };
                collect_expression_refs(item, child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_expression_refs(item, path.clone(), out);
            }
        }
        _ => {}
    }
}

/// Keep one reference per `(source, target)`: highest confidence, earliest
/// occurrence among equals. Output follows first-occurrence order.
fn dedupe(found: Vec<RawReference>) -> Vec<RawReference> {
    let mut position: HashMap<(String, String), usize> = HashMap::new();
    let mut kept: Vec<RawReference> = Vec::new();

    for reference in found {
        let key = (reference.source.clone(), reference.target.clone());
        match position.get(&key) {
            Some(&i) => {
                if reference.confidence > kept[i].confidence {
                    kept[i] = reference;
                }
            }
            None => {
                position.insert(key, kept.len());
                kept.push(reference);
            }
        }
    }

    kept
}
