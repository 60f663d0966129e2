//! Configuration module for PlanTopo.
//!
//! This module handles loading and validating configuration from:
//! - YAML configuration files (`plantopo.yaml`)
//! - Environment variables
//! - CLI arguments
//!
//! # Configuration File Format
//!
//! ```yaml
//! # plantopo.yaml
//!
//! analysis:
//!   deep_scan: true
//!   pattern_matching: true
//!   extra_provider_prefixes: [mycloud_]
//!   rules:
//!     - provider: aws
//!       source_type: aws_instance
//!       target_type: aws_network_interface
//!       network: [network_interface]
//!
//! conversion:
//!   critical_types: [aws_ecs_service]
//!   standalone_types: [aws_ssm_parameter]
//!   external_source: ${PLANTOPO_SOURCE}
//!
//! layout:
//!   columns: 4
//!
//! duplicates:
//!   default_resolution: skip
//!
//! audit:
//!   max_hierarchy_depth: 8
//!
//! import:
//!   auto_repair_connections: false
//!
//! output:
//!   colored: true
//!   verbose: false
//!   pretty: true
//! ```

use crate::error::{PlanTopoError, Result, ResultExt};
use crate::validate::CollisionResolution;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Default configuration file names searched in the working directory.
pub const DEFAULT_CONFIG_FILES: [&str; 3] = ["plantopo.yaml", "plantopo.yml", ".plantopo.yaml"];

/// A custom classification rule added on top of the built-in provider table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Provider short name (e.g., `aws`)
    pub provider: String,
    /// Resource type holding the reference
    pub source_type: String,
    /// Resource type being referenced
    pub target_type: String,
    /// Attribute paths implying network adjacency
    #[serde(default)]
    pub network: Vec<String>,
    /// Attribute paths implying security control
    #[serde(default)]
    pub security: Vec<String>,
}

/// Dependency analysis options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    /// Run the reference scanner over attribute trees.
    pub deep_scan: bool,

    /// Run the attribute-name pattern matchers.
    pub pattern_matching: bool,

    /// Additional resource type prefixes recognized by the bare reference pattern.
    pub extra_provider_prefixes: Vec<String>,

    /// Custom classification rules.
    pub rules: Vec<RuleConfig>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            deep_scan: true,
            pattern_matching: true,
            extra_provider_prefixes: Vec::new(),
            rules: Vec::new(),
        }
    }
}

/// Graph conversion options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Extra resource types that must never end up orphaned.
    pub critical_types: Vec<String>,

    /// Extra resource types exempt from the orphan check.
    pub standalone_types: Vec<String>,

    /// Value stamped into every node's `external_source`.
    pub external_source: String,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            critical_types: Vec::new(),
            standalone_types: Vec::new(),
            external_source: "terraform".to_string(),
        }
    }
}

/// Placement options handed to the layout collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutOptions {
    /// Nodes per row in the grid layout.
    pub columns: usize,

    /// Horizontal distance between grid cells.
    pub spacing_x: f64,

    /// Vertical distance between grid rows.
    pub spacing_y: f64,

    /// Default device width.
    pub device_width: f64,

    /// Default device height.
    pub device_height: f64,

    /// Default boundary width.
    pub boundary_width: f64,

    /// Default boundary height.
    pub boundary_height: f64,

    /// Gap kept between existing content and auto-created boundaries.
    pub margin: f64,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            columns: 4,
            spacing_x: 250.0,
            spacing_y: 180.0,
            device_width: 120.0,
            device_height: 80.0,
            boundary_width: 400.0,
            boundary_height: 300.0,
            margin: 50.0,
        }
    }
}

/// Duplicate handling options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatesOptions {
    /// Resolution applied to collisions without an explicit decision.
    pub default_resolution: CollisionResolution,
}

/// Audit options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditOptions {
    /// Boundary nesting deeper than this is reported.
    pub max_hierarchy_depth: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self { max_hierarchy_depth: 8 }
    }
}

/// Import options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportOptions {
    /// Apply suggested connection repairs before the audit runs.
    pub auto_repair_connections: bool,
}

/// Output options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Use colored output.
    pub colored: bool,

    /// Verbose output mode.
    pub verbose: bool,

    /// Pretty-print JSON output.
    pub pretty: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            colored: true,
            verbose: false,
            pretty: true,
        }
    }
}

/// Main configuration structure with nested sections.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Dependency analysis options
    pub analysis: AnalysisOptions,

    /// Graph conversion options
    pub conversion: ConversionOptions,

    /// Layout options
    pub layout: LayoutOptions,

    /// Duplicate handling options
    pub duplicates: DuplicatesOptions,

    /// Audit options
    pub audit: AuditOptions,

    /// Import options
    pub import: ImportOptions,

    /// Output options
    pub output: OutputOptions,
}

impl Config {
    /// Load configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or a value is out of range.
    pub fn from_yaml(content: &str) -> Result<Self> {
        tracing::debug!("Parsing configuration from YAML");
        let expanded = expand_env_vars(content);

        let config: Config = serde_yaml::from_str(&expanded)
            .to_config_parse_error("invalid configuration YAML".to_string())?;
        config.check()?;

        tracing::debug!(
            custom_rules = config.analysis.rules.len(),
            deep_scan = config.analysis.deep_scan,
            pattern_matching = config.analysis.pattern_matching,
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).with_path(path)?;
        Self::from_yaml(&content)
    }

    /// Resolve the configuration: the explicit path if given, otherwise the
    /// first default file found in `dir`, otherwise built-in defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a discovered file cannot be read or parsed.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            tracing::debug!(path = %path.display(), "Loading configuration from explicit path");
            return Self::from_path(path);
        }

        let found: Option<PathBuf> = DEFAULT_CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|candidate| candidate.is_file());

        match found {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Found configuration file");
                Self::from_path(path)
            }
            None => {
                tracing::debug!("No configuration file found, using default configuration");
                Ok(Self::default())
            }
        }
    }

    fn check(&self) -> Result<()> {
        if self.layout.columns == 0 {
            return Err(crate::err!(ConfigValue {
                key: "layout.columns".to_string(),
                message: "must be at least 1".to_string(),
            }));
        }
        if self.audit.max_hierarchy_depth == 0 {
            return Err(crate::err!(ConfigValue {
                key: "audit.max_hierarchy_depth".to_string(),
                message: "must be at least 1".to_string(),
            }));
        }
        for (i, rule) in self.analysis.rules.iter().enumerate() {
            if rule.network.is_empty() && rule.security.is_empty() {
                return Err(crate::err!(ConfigValue {
                    key: format!("analysis.rules[{i}]"),
                    message: format!(
                        "rule {} -> {} lists no network or security paths",
                        rule.source_type, rule.target_type
                    ),
                }));
            }
        }
        if self.conversion.external_source.trim().is_empty() {
            return Err(PlanTopoError::ConfigMissing {
                key: "conversion.external_source".to_string(),
                src_path: file!(),
                src_line: line!(),
            });
        }
        Ok(())
    }

    /// Merge CLI arguments into the configuration.
    pub fn merge_cli_args(&mut self, args: &crate::cli::ImportArgs) {
        if let Some(resolution) = args.on_collision {
            self.duplicates.default_resolution = resolution;
        }
        if args.repair {
            self.import.auto_repair_connections = true;
        }
    }

    /// Generate an example YAML configuration.
    #[must_use]
    pub fn example_yaml() -> String {
        r#"# PlanTopo Configuration File

# Dependency analysis
analysis:
  # Scan attribute trees for symbolic references
  deep_scan: true

  # Match well-known attribute names (vpc_id, subnet_ids, ...) against resolved IDs
  pattern_matching: true

  # Extra resource type prefixes treated as references (e.g., in-house providers)
  extra_provider_prefixes: []

  # Custom classification rules
  # rules:
  #   - provider: aws
  #     source_type: aws_instance
  #     target_type: aws_network_interface
  #     network: [network_interface]

# Graph conversion
conversion:
  # Resource types that must never end up orphaned
  critical_types: []

  # Resource types that are legitimately standalone
  standalone_types: []

  # Label stamped into every imported node
  external_source: terraform

# Placement used when no layout engine is available
layout:
  columns: 4
  spacing_x: 250.0
  spacing_y: 180.0
  device_width: 120.0
  device_height: 80.0
  boundary_width: 400.0
  boundary_height: 300.0
  margin: 50.0

# Duplicate handling (skip | replace | create_new | manual)
duplicates:
  default_resolution: skip

# Integrity audit
audit:
  max_hierarchy_depth: 8

# Import behaviour
import:
  # Apply suggested connection repairs before auditing
  auto_repair_connections: false

# Output options
output:
  colored: true
  verbose: false
  pretty: true
"#
        .to_string()
    }
}

static BRACED_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("Invalid regex"));

static BARE_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)").expect("Invalid regex"));

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax. Unset variables are left untouched.
fn expand_env_vars(content: &str) -> String {
    let lookup = |caps: &regex::Captures<'_>| std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string());
    let braced = BRACED_VAR.replace_all(content, lookup);
    BARE_VAR.replace_all(&braced, lookup).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.analysis.deep_scan);
        assert!(config.analysis.pattern_matching);
        assert_eq!(config.audit.max_hierarchy_depth, 8);
        assert_eq!(config.duplicates.default_resolution, CollisionResolution::Skip);
        assert!(!config.import.auto_repair_connections);
        assert_eq!(config.conversion.external_source, "terraform");
    }

    #[test]
    fn test_config_from_yaml_nested() {
        let yaml = r#"
analysis:
  pattern_matching: false
  extra_provider_prefixes: [acme_]
conversion:
  critical_types: [aws_ecs_service]
layout:
  columns: 2
duplicates:
  default_resolution: replace
output:
  colored: false
"#;

        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.analysis.deep_scan);
        assert!(!config.analysis.pattern_matching);
        assert_eq!(config.analysis.extra_provider_prefixes, vec!["acme_".to_string()]);
        assert_eq!(config.conversion.critical_types.len(), 1);
        assert_eq!(config.layout.columns, 2);
        assert_eq!(config.layout.spacing_x, 250.0);
        assert_eq!(config.duplicates.default_resolution, CollisionResolution::Replace);
        assert!(!config.output.colored);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_custom_rules() {
        let yaml = r#"
analysis:
  rules:
    - provider: aws
      source_type: aws_instance
      target_type: aws_network_interface
      network: [network_interface]
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.analysis.rules.len(), 1);
        assert!(config.analysis.rules[0].security.is_empty());
    }

    #[test]
    fn test_rule_without_paths_is_rejected() {
        let yaml = r#"
analysis:
  rules:
    - provider: aws
      source_type: aws_instance
      target_type: aws_eip
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, PlanTopoError::ConfigValue { .. }));
    }

    #[test]
    fn test_zero_columns_is_rejected() {
        let err = Config::from_yaml("layout:\n  columns: 0\n").unwrap_err();
        assert_eq!(err.exit_code(), 19);
    }

    #[test]
    fn test_invalid_yaml_is_parse_error() {
        let err = Config::from_yaml("audit: [unclosed").unwrap_err();
        assert!(matches!(err, PlanTopoError::ConfigParse { .. }));
    }

    #[test]
    fn test_env_var_expansion_keeps_unset_vars() {
        let expanded = expand_env_vars("source: ${PLANTOPO_SURELY_UNSET_VAR_42}");
        assert_eq!(expanded, "source: ${PLANTOPO_SURELY_UNSET_VAR_42}");

        for pattern in ["no vars here", "$NOTAVAR123", "${NESTED${VAR}}"] {
            let _ = expand_env_vars(pattern);
        }
    }

    #[test]
    fn test_env_var_expansion_uses_path() {
        // PATH is set in any test environment
        let path = std::env::var("PATH").unwrap();
        assert_eq!(expand_env_vars("${PATH}"), path);
        assert_eq!(expand_env_vars("$PATH"), path);
    }

    #[test]
    fn test_example_yaml_is_valid() {
        let config = Config::from_yaml(&Config::example_yaml()).unwrap();
        assert_eq!(config.layout.columns, 4);
    }

    #[test]
    fn test_discover_falls_back_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config.audit.max_hierarchy_depth, 8);
    }

    #[test]
    fn test_discover_finds_default_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".plantopo.yaml"), "audit:\n  max_hierarchy_depth: 3\n").unwrap();
        let config = Config::discover(None, dir.path()).unwrap();
        assert_eq!(config.audit.max_hierarchy_depth, 3);
    }
}
