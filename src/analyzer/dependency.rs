//! The two-tier dependency analyzer.

use crate::analyzer::classifier::{Classification, RuleRegistry};
use crate::analyzer::index::ResourceIndex;
use crate::analyzer::patterns::match_patterns;
use crate::analyzer::scanner::{RawReference, ReferenceScanner, ReferenceSyntax};
use crate::analyzer::{Dependency, DependencyMetadata, DependencyOrigin, DependencyType, Relationship};
use crate::catalog::{self, ResourceCategory};
use crate::config::AnalysisOptions;
use crate::error::Result;
use crate::plan::Plan;
use crate::types::Confidence;
use std::collections::{HashMap, HashSet};

/// Turns a plan into a deduplicated, sorted dependency list.
///
/// The analyzer holds no per-plan state; one instance can analyze many
/// plans, including concurrently.
#[derive(Debug, Clone)]
pub struct DependencyAnalyzer {
    scanner: ReferenceScanner,
    registry: RuleRegistry,
    deep_scan: bool,
    pattern_matching: bool,
}

impl DependencyAnalyzer {
    /// Build an analyzer with the built-in rules plus configured ones.
    ///
    /// # Errors
    ///
    /// Returns `ConfigValue` if the configured provider prefixes cannot be
    /// compiled into a pattern.
    pub fn new(options: &AnalysisOptions) -> Result<Self> {
        let mut registry = RuleRegistry::with_defaults();
        registry.extend(&options.rules);
        Ok(Self {
            scanner: ReferenceScanner::new(options)?,
            registry,
            deep_scan: options.deep_scan,
            pattern_matching: options.pattern_matching,
        })
    }

    #[must_use]
    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Analyze one plan. Deterministic: output is sorted by
    /// `(source, target)`.
    #[must_use]
    pub fn analyze(&self, plan: &Plan) -> Vec<Dependency> {
        let index = ResourceIndex::new(plan);

        let mut primary: HashMap<(String, String), Dependency> = HashMap::new();
        if self.deep_scan {
            for reference in self.scanner.scan(plan, &index) {
                let Some(dep) = self.classify(&index, &reference) else {
                    continue;
                };
                let key = (dep.source.clone(), dep.target.clone());
                match primary.get(&key) {
                    Some(existing) if rank(existing) >= rank(&dep) => {}
                    _ => {
                        primary.insert(key, dep);
                    }
                }
            }
        }

        let mut dependencies: Vec<Dependency> = primary.values().cloned().collect();

        if self.pattern_matching {
            let mut seen: HashSet<(String, String)> = primary.keys().cloned().collect();
            let mut secondary = 0usize;
            for m in match_patterns(&index) {
                let reversed = (m.target.clone(), m.source.clone());
                if seen.contains(&reversed) || !seen.insert((m.source.clone(), m.target.clone())) {
                    continue;
                }
                let dep_type = match m.relationship {
                    Relationship::Security => DependencyType::Security,
                    Relationship::Network => DependencyType::Network,
                    Relationship::DependsOn => DependencyType::Explicit,
                    Relationship::Reference => DependencyType::Implicit,
                };
                dependencies.push(Dependency {
                    source: m.source,
                    target: m.target,
                    source_type: m.source_type,
                    target_type: m.target_type,
                    dep_type,
                    relationship: m.relationship,
                    metadata: DependencyMetadata {
                        attribute_path: m.attribute_path,
                        confidence: Confidence::Low,
                        origin: DependencyOrigin::Pattern,
                    },
                });
                secondary += 1;
            }
            tracing::debug!(secondary, "Pattern dependencies added");
        }

        dependencies.sort_by(|a, b| a.source.cmp(&b.source).then_with(|| a.target.cmp(&b.target)));

        tracing::debug!(
            dependencies = dependencies.len(),
            primary = primary.len(),
            data_sources = index.data_containers().len(),
            "Dependency analysis complete"
        );
        dependencies
    }

    /// Turn a raw reference into a typed dependency, orienting security
    /// relationships from the controlling resource to the controlled one.
    fn classify(&self, index: &ResourceIndex<'_>, reference: &RawReference) -> Option<Dependency> {
        let source = index.by_address(&reference.source)?;
        let target = index.by_address(&reference.target)?;

        if reference.syntax == ReferenceSyntax::DependsOn {
            return Some(Dependency {
                source: source.address.clone(),
                target: target.address.clone(),
                source_type: source.resource_type.clone(),
                target_type: target.resource_type.clone(),
                dep_type: DependencyType::Explicit,
                relationship: Relationship::DependsOn,
                metadata: DependencyMetadata {
                    attribute_path: reference.attribute_path.clone(),
                    confidence: Confidence::High,
                    origin: DependencyOrigin::Scan,
                },
            });
        }

        let classification = self
            .registry
            .classify(&source.resource_type, &target.resource_type, &reference.attribute_path);
        let (dep_type, relationship) = match classification {
            Classification::Network => (DependencyType::Network, Relationship::Network),
            Classification::Security => (DependencyType::Security, Relationship::Security),
            Classification::Dependency => (DependencyType::Implicit, Relationship::Reference),
        };

        let swap = relationship == Relationship::Security
            && catalog::category(&target.resource_type) == ResourceCategory::Security
            && catalog::category(&source.resource_type) != ResourceCategory::Security;
        let (source, target) = if swap { (target, source) } else { (source, target) };

        Some(Dependency {
            source: source.address.clone(),
            target: target.address.clone(),
            source_type: source.resource_type.clone(),
            target_type: target.resource_type.clone(),
            dep_type,
            relationship,
            metadata: DependencyMetadata {
                attribute_path: reference.attribute_path.clone(),
                confidence: reference.confidence,
                origin: DependencyOrigin::Scan,
            },
        })
    }
}

fn rank(dep: &Dependency) -> (Confidence, Relationship) {
    (dep.metadata.confidence, dep.relationship)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn plan(changes: Value) -> Plan {
        Plan::from_json(&json!({ "resource_changes": changes }).to_string()).unwrap()
    }

    fn resource(address: &str, after: Value) -> Value {
        let (ty, name) = address.split_once('.').unwrap();
        json!({ "address": address, "type": ty, "name": name,
                "change": { "actions": ["create"], "after": after } })
    }

    fn analyze(plan: &Plan) -> Vec<Dependency> {
        DependencyAnalyzer::new(&AnalysisOptions::default()).unwrap().analyze(plan)
    }

    #[test]
    fn test_symbolic_network_reference() {
        let plan = plan(json!([
            resource("aws_vpc.main", json!({})),
            resource("aws_subnet.a", json!({ "vpc_id": "${aws_vpc.main.id}" })),
        ]));
        let deps = analyze(&plan);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].pair(), ("aws_subnet.a", "aws_vpc.main"));
        assert_eq!(deps[0].dep_type, DependencyType::Network);
        assert_eq!(deps[0].relationship, Relationship::Network);
        assert_eq!(deps[0].metadata.confidence, Confidence::High);
        assert_eq!(deps[0].metadata.origin, DependencyOrigin::Scan);
    }

    #[test]
    fn test_security_reference_is_oriented_from_group() {
        let plan = plan(json!([
            resource("aws_security_group.web", json!({})),
            resource("aws_instance.web", json!({ "vpc_security_group_ids": ["aws_security_group.web.id"] })),
        ]));
        let deps = analyze(&plan);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].pair(), ("aws_security_group.web", "aws_instance.web"));
        assert_eq!(deps[0].relationship, Relationship::Security);
        assert_eq!(deps[0].source_type, "aws_security_group");
    }

    #[test]
    fn test_resolved_id_security_group_from_patterns() {
        let plan = plan(json!([
            resource("aws_security_group.web", json!({ "id": "sg-123" })),
            resource("aws_instance.web", json!({ "vpc_security_group_ids": ["sg-123"] })),
        ]));
        let deps = analyze(&plan);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].pair(), ("aws_security_group.web", "aws_instance.web"));
        assert_eq!(deps[0].dep_type, DependencyType::Security);
        assert_eq!(deps[0].metadata.confidence, Confidence::Low);
        assert_eq!(deps[0].metadata.origin, DependencyOrigin::Pattern);
    }

    #[test]
    fn test_primary_wins_over_pattern() {
        let plan = plan(json!([
            resource("aws_vpc.main", json!({ "id": "vpc-1" })),
            resource("aws_subnet.a", json!({ "vpc_id": "vpc-1", "tags": { "Parent": "aws_vpc.main" } })),
        ]));
        let deps = analyze(&plan);
        assert_eq!(deps.len(), 1);
        // The scan found it first, under an unclassified path.
        assert_eq!(deps[0].metadata.origin, DependencyOrigin::Scan);
        assert_eq!(deps[0].relationship, Relationship::Reference);
        assert_eq!(deps[0].metadata.attribute_path, "tags.Parent");
    }

    #[test]
    fn test_unclassified_reference_is_implicit() {
        let plan = plan(json!([
            resource("aws_iam_role.app", json!({})),
            resource("aws_instance.web", json!({ "iam_role": "${aws_iam_role.app.name}" })),
        ]));
        let deps = analyze(&plan);
        assert_eq!(deps[0].dep_type, DependencyType::Implicit);
        assert_eq!(deps[0].relationship, Relationship::Reference);
    }

    #[test]
    fn test_sources_can_be_disabled() {
        let plan = plan(json!([
            resource("aws_vpc.main", json!({ "id": "vpc-1" })),
            resource("aws_subnet.a", json!({ "vpc_id": "vpc-1" })),
        ]));
        let options = AnalysisOptions {
            pattern_matching: false,
            ..AnalysisOptions::default()
        };
        assert!(DependencyAnalyzer::new(&options).unwrap().analyze(&plan).is_empty());
    }

    #[test]
    fn test_network_read_through_data_source() {
        let content = json!({
            "resource_changes": [
                { "address": "data.aws_vpc.main", "mode": "data", "type": "aws_vpc", "name": "main",
                  "change": { "actions": ["read"], "after": { "id": "vpc-1" } } },
                resource("aws_subnet.a", json!({ "id": "subnet-1", "vpc_id": "vpc-1" }))
            ],
            "configuration": { "root_module": { "resources": [
                { "address": "aws_subnet.a", "mode": "managed", "type": "aws_subnet", "name": "a",
                  "expressions": { "vpc_id": { "references": ["data.aws_vpc.main.id", "data.aws_vpc.main"] } } }
            ] } }
        })
        .to_string();
        let deps = analyze(&Plan::from_json(&content).unwrap());
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].pair(), ("aws_subnet.a", "data.aws_vpc.main"));
        assert_eq!(deps[0].target_type, "aws_vpc");
        assert_eq!(deps[0].relationship, Relationship::Network);
        assert_eq!(deps[0].metadata.origin, DependencyOrigin::Scan);
    }

    #[test]
    fn test_unmanaged_network_id_is_a_low_confidence_dependency() {
        let plan = plan(json!([
            resource("aws_subnet.a", json!({ "vpc_id": "vpc-0abc" })),
        ]));
        let deps = analyze(&plan);
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].pair(), ("aws_subnet.a", "data.aws_vpc.vpc-0abc"));
        assert_eq!(deps[0].metadata.confidence, Confidence::Low);
        assert_eq!(deps[0].metadata.origin, DependencyOrigin::Pattern);
    }

    #[test]
    fn test_output_is_sorted_and_deterministic() {
        let plan = plan(json!([
            resource("aws_vpc.main", json!({ "id": "vpc-1" })),
            resource("aws_subnet.b", json!({ "vpc_id": "${aws_vpc.main.id}" })),
            resource("aws_subnet.a", json!({ "vpc_id": "${aws_vpc.main.id}" })),
        ]));
        let first = analyze(&plan);
        assert_eq!(first, analyze(&plan));
        assert_eq!(first[0].source, "aws_subnet.a");
        assert_eq!(first[1].source, "aws_subnet.b");
    }
}
