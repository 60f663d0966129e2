//! Dependency analysis module.
//!
//! This module recovers relationships between the resources of one plan.
//!
//! # Sources
//!
//! 1. **Reference scan** (primary): symbolic references found anywhere in
//!    the post-change attributes or the plan's `configuration` block,
//!    classified by the per-provider [`RuleRegistry`].
//!
//! 2. **Pattern matching** (secondary): well-known attribute names such as
//!    `vpc_id` or `security_group_ids` whose values are resolved runtime
//!    identifiers rather than references.
//!
//! When both sources report the same pair the primary result wins; pairs
//! only the pattern matchers found carry low confidence.
//!
//! # Example
//!
//! ```rust,no_run
//! use plantopo::analyzer::DependencyAnalyzer;
//! use plantopo::config::AnalysisOptions;
//! use plantopo::plan::Plan;
//!
//! let plan = Plan::from_path("plan.json").unwrap();
//! let analyzer = DependencyAnalyzer::new(&AnalysisOptions::default()).unwrap();
//! for dep in analyzer.analyze(&plan) {
//!     println!("{} -> {} ({})", dep.source, dep.target, dep.relationship);
//! }
//! ```

mod classifier;
mod dependency;
mod index;
mod patterns;
mod scanner;

pub use classifier::{path_matches, provider_of, Classification, Rule, RuleRegistry};
pub use dependency::DependencyAnalyzer;
pub use index::{attribute_strings, parse_reference, ResourceIndex};
pub use patterns::{match_patterns, PatternFamily, PatternMatch};
pub use scanner::{RawReference, ReferenceScanner, ReferenceSyntax, DEFAULT_PROVIDER_PREFIXES};

use crate::types::Confidence;
use serde::{Deserialize, Serialize};

/// Kind of reference behind a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Network placement or adjacency
    Network,
    /// Security control
    Security,
    /// Declared with `depends_on`
    Explicit,
    /// Any other attribute reference
    Implicit,
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Security => write!(f, "security"),
            Self::Explicit => write!(f, "explicit"),
            Self::Implicit => write!(f, "implicit"),
        }
    }
}

/// Relationship carried onto topology edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Reference,
    DependsOn,
    Security,
    Network,
}

impl std::fmt::Display for Relationship {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Security => write!(f, "security"),
            Self::DependsOn => write!(f, "depends_on"),
            Self::Reference => write!(f, "reference"),
        }
    }
}

/// Which analysis produced a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyOrigin {
    Scan,
    Pattern,
}

/// Where a dependency came from and how sure we are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyMetadata {
    pub attribute_path: String,
    pub confidence: Confidence,
    pub origin: DependencyOrigin,
}

/// A resolved relationship between two resources of the same plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Source resource address
    pub source: String,
    /// Target resource address
    pub target: String,
    pub source_type: String,
    pub target_type: String,
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
    pub relationship: Relationship,
    pub metadata: DependencyMetadata,
}

impl Dependency {
    /// The `(source, target)` key dependencies are deduplicated on.
    #[must_use]
    pub fn pair(&self) -> (&str, &str) {
        (&self.source, &self.target)
    }
}
