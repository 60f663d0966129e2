//! Command-line interface module.
//!
//! This module defines the CLI structure using Clap, including
//! all commands, arguments, and options.
//!
//! # Commands
//!
//! - `import`: Import plans into a topology and audit the result
//! - `audit`: Audit an existing topology file
//! - `graph`: Convert a plan and export the topology
//! - `init`: Create an example configuration file
//! - `validate`: Validate a configuration file
//!
//! # Example Usage
//!
//! ```bash
//! # Import a plan produced by `terraform show -json`
//! plantopo import plan.json
//!
//! # Import every plan in a directory against a stored topology
//! plantopo import ./plans --existing topology.json --topology-out topology.json
//!
//! # Markdown report, repairing invalid connections
//! plantopo import plan.json --repair --format markdown --output audit.md
//!
//! # Export the topology as a Mermaid diagram
//! plantopo graph plan.json --format mermaid
//! ```

use crate::types::{GraphFormat, ReportFormat};
use crate::validate::CollisionResolution;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// PlanTopo - Terraform/OpenTofu plan to topology importer.
#[derive(Parser, Debug)]
#[command(
    name = "plantopo",
    author,
    version,
    about = "Terraform/OpenTofu plan to network topology importer and integrity auditor",
    long_about = "PlanTopo reads Terraform/OpenTofu plan JSON, recovers the relationships \
                  between resources, builds a topology of devices and containment \
                  boundaries, reconciles it with an existing topology, and audits the result."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true, env = "PLANTOPO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import plans into a topology and audit the result
    #[command(visible_alias = "i")]
    Import(ImportArgs),

    /// Audit an existing topology file
    #[command(visible_alias = "a")]
    Audit(AuditArgs),

    /// Convert a plan and export the resulting topology
    #[command(visible_alias = "g")]
    Graph(GraphArgs),

    /// Create an example configuration file
    Init,

    /// Validate a configuration file
    Validate(ValidateArgs),
}

/// Arguments for the import command.
#[derive(Args, Debug)]
pub struct ImportArgs {
    /// Plan JSON files, or directories searched for `*.json` plans
    #[arg(value_name = "PLAN", required = true)]
    pub paths: Vec<PathBuf>,

    /// Existing topology JSON to reconcile against
    #[arg(short, long, value_name = "FILE")]
    pub existing: Option<PathBuf>,

    /// Report format
    #[arg(short, long, default_value = "text", value_enum)]
    pub format: ReportFormat,

    /// Report file path (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Write the merged topology of the last imported plan to this file
    #[arg(long, value_name = "FILE")]
    pub topology_out: Option<PathBuf>,

    /// Exit with code 1 when the audit reports warnings
    #[arg(long)]
    pub strict: bool,

    /// Apply suggested connection repairs before auditing
    #[arg(long)]
    pub repair: bool,

    /// Resolution for resources that already exist in the topology
    #[arg(long, value_name = "RESOLUTION", value_enum)]
    pub on_collision: Option<CollisionResolution>,

    /// Keep importing the remaining plans when one fails to load
    #[arg(long)]
    pub continue_on_error: bool,

    /// Maximum depth for recursive directory search
    #[arg(long, default_value = "10")]
    pub max_depth: usize,
}

/// Arguments for the audit command.
#[derive(Args, Debug)]
pub struct AuditArgs {
    /// Topology JSON file
    #[arg(value_name = "TOPOLOGY")]
    pub topology: PathBuf,

    /// Report format
    #[arg(short, long, default_value = "text", value_enum)]
    pub format: ReportFormat,

    /// Report file path (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Exit with code 1 when the audit reports warnings
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for the graph command.
#[derive(Args, Debug)]
pub struct GraphArgs {
    /// Plan JSON file
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    /// Output format for the graph
    #[arg(short, long, default_value = "dot", value_enum)]
    pub format: GraphFormat,

    /// Output file path (stdout if not specified)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(value_name = "FILE", default_value = "plantopo.yaml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parsing() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_import_command() {
        let cli = Cli::parse_from(["plantopo", "import", "plan.json"]);
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.paths, vec![PathBuf::from("plan.json")]);
                assert_eq!(args.format, ReportFormat::Text);
                assert_eq!(args.on_collision, None);
                assert!(!args.repair);
            }
            _ => panic!("Expected Import command"),
        }
    }

    #[test]
    fn test_import_with_options() {
        let cli = Cli::parse_from([
            "plantopo",
            "import",
            "./plans",
            "--existing",
            "topology.json",
            "--format",
            "markdown",
            "--output",
            "audit.md",
            "--on-collision",
            "create_new",
            "--repair",
            "--strict",
        ]);
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.existing, Some(PathBuf::from("topology.json")));
                assert_eq!(args.format, ReportFormat::Markdown);
                assert_eq!(args.output, Some(PathBuf::from("audit.md")));
                assert_eq!(args.on_collision, Some(CollisionResolution::CreateNew));
                assert!(args.repair);
                assert!(args.strict);
            }
            _ => panic!("Expected Import command"),
        }
    }

    #[test]
    fn test_import_requires_a_plan() {
        assert!(Cli::try_parse_from(["plantopo", "import"]).is_err());
    }

    #[test]
    fn test_graph_command() {
        let cli = Cli::parse_from(["plantopo", "graph", "plan.json", "--format", "mermaid"]);
        match cli.command {
            Commands::Graph(args) => {
                assert_eq!(args.plan, PathBuf::from("plan.json"));
                assert_eq!(args.format, GraphFormat::Mermaid);
            }
            _ => panic!("Expected Graph command"),
        }
    }

    #[test]
    fn test_audit_command() {
        let cli = Cli::parse_from(["plantopo", "audit", "topology.json", "--format", "html"]);
        match cli.command {
            Commands::Audit(args) => {
                assert_eq!(args.topology, PathBuf::from("topology.json"));
                assert_eq!(args.format, ReportFormat::Html);
            }
            _ => panic!("Expected Audit command"),
        }
    }

    #[test]
    fn test_validate_command() {
        let cli = Cli::parse_from(["plantopo", "validate", "custom.yaml"]);
        match cli.command {
            Commands::Validate(args) => {
                assert_eq!(args.config, PathBuf::from("custom.yaml"));
            }
            _ => panic!("Expected Validate command"),
        }
    }

    #[test]
    fn test_global_options() {
        let cli = Cli::parse_from(["plantopo", "-vvv", "--config", "custom.yaml", "import", "plan.json"]);
        assert_eq!(cli.verbose, 3);
        assert_eq!(cli.config, Some(PathBuf::from("custom.yaml")));
    }

    #[test]
    fn test_alias() {
        let cli = Cli::parse_from(["plantopo", "i", "plan.json"]);
        assert!(matches!(cli.command, Commands::Import(_)));
    }
}
