//! Integration tests for PlanTopo.
//!
//! These tests drive the import pipeline and the CLI end to end over the
//! plan and topology fixtures in `tests/fixtures`.

use plantopo::{Config, Importer, Plan, Topology, TopologyFile, TopologySource};
use std::path::PathBuf;

/// Get the path to the test fixtures directory.
fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn network_plan() -> Plan {
    Plan::from_path(fixtures_path().join("plans/network.json")).unwrap()
}

fn topology(name: &str) -> Topology {
    TopologyFile::new(fixtures_path().join("topologies").join(name))
        .snapshot()
        .unwrap()
}

mod import_tests {
    use super::*;
    use plantopo::analyzer::Relationship;
    use plantopo::validate::CollisionResolution;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_subnet_parented_through_resolved_id() {
        let importer = Importer::new(Config::default()).unwrap();
        let result = importer.import("network.json", &network_plan(), &Topology::default());

        let subnet = result.topology.node("aws_subnet.a").unwrap();
        assert!(subnet.is_boundary());
        assert_eq!(subnet.parent_id.as_deref(), Some("aws_vpc.main"));

        let web = result.topology.node("aws_instance.web").unwrap();
        assert_eq!(web.parent_id.as_deref(), Some("aws_subnet.a"));
        assert!(result.accepted());
    }

    #[test]
    fn test_security_group_edge_from_resolved_id() {
        let importer = Importer::new(Config::default()).unwrap();
        let result = importer.import("network.json", &network_plan(), &Topology::default());

        let edge = result
            .topology
            .edges
            .iter()
            .find(|e| e.source == "aws_instance.web" && e.target == "aws_security_group.web")
            .unwrap();
        assert_eq!(edge.relationship, Relationship::Security);
        assert!(result
            .topology
            .edges
            .iter()
            .all(|e| !e.source.starts_with("aws_subnet") && !e.target.starts_with("aws_subnet")));
    }

    #[test]
    fn test_reimport_against_saved_topology_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let file = TopologyFile::new(dir.path().join("topology.json"));
        let importer = Importer::new(Config::default()).unwrap();

        let first = importer.import("network.json", &network_plan(), &Topology::default());
        file.save(&first.topology).unwrap();

        let second = importer.import("network.json", &network_plan(), &file.snapshot().unwrap());
        assert_eq!(second.history.new_resources, 0);
        assert_eq!(second.history.nodes_added, 0);
        assert_eq!(second.history.collisions, first.history.new_resources);
        assert_eq!(second.topology.nodes.len(), first.topology.nodes.len());
        assert_eq!(second.topology.edges, first.topology.edges);
    }

    #[test]
    fn test_manual_resolution_override() {
        let importer = Importer::new(Config::default()).unwrap();
        let first = importer.import("network.json", &network_plan(), &Topology::default());

        let overrides = HashMap::from([("aws_instance.web".to_string(), CollisionResolution::Manual)]);
        let second = importer.import_with_overrides("network.json", &network_plan(), &first.topology, &overrides);
        assert_eq!(second.history.pending, 1);
        assert_eq!(second.merge.manual[0].address, "aws_instance.web");
    }
}

mod missing_boundary_tests {
    use super::*;
    use plantopo::graph::BoundaryType;
    use pretty_assertions::assert_eq;

    fn shared_network_plan() -> Plan {
        Plan::from_path(fixtures_path().join("external/shared_network.json")).unwrap()
    }

    #[test]
    fn test_networks_outside_the_plan_are_suggested() {
        let importer = Importer::new(Config::default()).unwrap();
        let result = importer.import("shared_network.json", &shared_network_plan(), &Topology::default());
        let boundary = &result.report.boundary;

        let missing: Vec<(&str, BoundaryType, &str)> = boundary
            .missing_boundaries
            .iter()
            .map(|m| (m.address.as_str(), m.boundary_type, m.label.as_str()))
            .collect();
        assert_eq!(
            missing,
            vec![
                ("data.aws_subnet.subnet-0ff1ce", BoundaryType::SecurityZone, "subnet-0ff1ce"),
                ("data.aws_vpc.shared", BoundaryType::NetworkSegment, "shared"),
            ]
        );
        assert!(boundary.missing_boundaries.iter().all(|m| m.can_auto_create));

        let subnet = boundary
            .suggestions
            .iter()
            .find(|s| s.address == "data.aws_subnet.subnet-0ff1ce")
            .unwrap();
        assert_eq!(subnet.children, vec!["aws_instance.batch".to_string()]);
        let vpc = boundary.suggestions.iter().find(|s| s.address == "data.aws_vpc.shared").unwrap();
        assert!(vpc.children.is_empty());
        assert_eq!(vpc.to_node().label, "shared");
        assert!(result.accepted());
    }

    #[test]
    fn test_existing_label_blocks_auto_create() {
        let importer = Importer::new(Config::default()).unwrap();
        let mut existing = Topology::default();
        let mut shared = plantopo::graph::Node::boundary("hand-drawn-vpc", BoundaryType::NetworkSegment);
        shared.label = "shared".to_string();
        existing.nodes.push(shared);

        let result = importer.import("shared_network.json", &shared_network_plan(), &existing);
        let vpc = result
            .report
            .boundary
            .missing_boundaries
            .iter()
            .find(|m| m.address == "data.aws_vpc.shared")
            .unwrap();
        assert!(!vpc.can_auto_create);
        assert!(result
            .report
            .boundary
            .suggestions
            .iter()
            .all(|s| s.address != "data.aws_vpc.shared"));
    }

    #[test]
    fn test_module_move_keeps_references_resolved() {
        let importer = Importer::new(Config::default()).unwrap();
        let first = importer.import("network.json", &network_plan(), &Topology::default());

        let mut moved = network_plan();
        for change in &mut moved.resource_changes {
            change.address = format!("module.net.{}", change.address);
            change.module_address = Some("module.net".to_string());
        }
        let second = importer.import("moved.json", &moved, &first.topology);

        assert_eq!(second.history.new_resources, 0);
        assert!(second.report.boundary.missing_boundaries.is_empty());
        assert_eq!(second.report.status, first.report.status);
        assert_eq!(second.topology.nodes.len(), first.topology.nodes.len());
    }
}

mod audit_tests {
    use super::*;
    use plantopo::audit::IssueCategory;
    use plantopo::validate::{apply_repairs, connection};
    use plantopo::AuditStatus;

    #[test]
    fn test_parent_cycle_fails_audit() {
        let importer = Importer::new(Config::default()).unwrap();
        let report = importer.audit(&topology("cycle.json"));

        assert_eq!(report.status, AuditStatus::Fail);
        assert!(report
            .critical_issues
            .iter()
            .any(|i| i.category == IssueCategory::Hierarchy));
    }

    #[test]
    fn test_edge_into_own_boundary_is_repaired() {
        let topology = topology("boundary_edge.json");
        let importer = Importer::new(Config::default()).unwrap();

        let before = importer.audit(&topology);
        assert_eq!(before.status, AuditStatus::Fail);
        assert!(before
            .critical_issues
            .iter()
            .any(|i| i.category == IssueCategory::Connection));

        let validation = connection::validate(&topology.nodes, &topology.edges);
        let outcome = apply_repairs(&topology.edges, &validation);
        assert_eq!(outcome.removed, vec!["edge:aws_instance.web->aws_subnet.a".to_string()]);
        assert!(outcome.edges.is_empty());

        let after = importer.audit(&Topology::new(topology.nodes, outcome.edges));
        assert!(after.issues().all(|i| i.category != IssueCategory::Connection));
    }
}

mod cli_tests {
    use super::*;
    use assert_cmd::Command;
    use predicates::prelude::*;

    fn plantopo(dir: &std::path::Path) -> Command {
        let mut cmd = Command::cargo_bin("plantopo").unwrap();
        cmd.current_dir(dir).env_remove("PLANTOPO_CONFIG").env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn test_import_json_report() {
        let dir = tempfile::tempdir().unwrap();
        let output = plantopo(dir.path())
            .arg("import")
            .arg(fixtures_path().join("plans/network.json"))
            .args(["--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(report["import"]["new_resources"], 4);
        assert_ne!(report["audit"]["status"], "fail");
    }

    #[test]
    fn test_import_writes_topology_for_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("topology.json");

        plantopo(dir.path())
            .arg("import")
            .arg(fixtures_path().join("plans"))
            .arg("--topology-out")
            .arg(&out)
            .args(["--format", "json"])
            .assert()
            .success();
        assert!(out.exists());

        let output = plantopo(dir.path())
            .arg("import")
            .arg(fixtures_path().join("plans/network.json"))
            .arg("--existing")
            .arg(&out)
            .args(["--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(report["import"]["new_resources"], 0);
    }

    #[test]
    fn test_broken_plan_stops_batch() {
        let dir = tempfile::tempdir().unwrap();
        plantopo(dir.path())
            .arg("import")
            .arg(fixtures_path().join("broken"))
            .assert()
            .code(15)
            .stderr(predicate::str::contains("resource_changes"));
    }

    #[test]
    fn test_continue_on_error_skips_broken_plan() {
        let dir = tempfile::tempdir().unwrap();
        plantopo(dir.path())
            .arg("import")
            .arg(fixtures_path().join("broken"))
            .args(["--continue-on-error", "--format", "markdown"])
            .assert()
            .success()
            .stdout(predicate::str::contains("# Integrity Audit"));
    }

    #[test]
    fn test_import_report_lists_missing_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        let output = plantopo(dir.path())
            .arg("import")
            .arg(fixtures_path().join("external/shared_network.json"))
            .args(["--format", "json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();

        let report: serde_json::Value = serde_json::from_slice(&output).unwrap();
        let missing = report["audit"]["boundary"]["missing_boundaries"].as_array().unwrap();
        assert_eq!(missing.len(), 2);
        let suggestions = report["audit"]["boundary"]["suggestions"].as_array().unwrap();
        assert!(suggestions.iter().any(|s| s["id"] == "auto:data.aws_vpc.shared"));
        assert_eq!(report["audit"]["status"], "warning");
    }

    #[test]
    fn test_strict_import_fails_on_missing_boundaries() {
        let dir = tempfile::tempdir().unwrap();
        plantopo(dir.path())
            .arg("import")
            .arg(fixtures_path().join("external/shared_network.json"))
            .arg("--strict")
            .assert()
            .code(1);
    }

    #[test]
    fn test_audit_cycle_exits_with_failure() {
        let dir = tempfile::tempdir().unwrap();
        plantopo(dir.path())
            .arg("audit")
            .arg(fixtures_path().join("topologies/cycle.json"))
            .args(["--format", "json"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains("\"status\": \"fail\""));
    }

    #[test]
    fn test_graph_mermaid() {
        let dir = tempfile::tempdir().unwrap();
        plantopo(dir.path())
            .arg("graph")
            .arg(fixtures_path().join("plans/network.json"))
            .args(["--format", "mermaid"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("graph LR"))
            .stdout(predicate::str::contains("subgraph"));
    }

    #[test]
    fn test_init_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        plantopo(dir.path()).arg("init").assert().success();
        assert!(dir.path().join("plantopo.yaml").exists());

        plantopo(dir.path())
            .args(["validate", "plantopo.yaml"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));

        plantopo(dir.path()).arg("init").assert().failure();
    }

    #[test]
    fn test_missing_plan_path() {
        let dir = tempfile::tempdir().unwrap();
        plantopo(dir.path())
            .args(["import", "does-not-exist.json"])
            .assert()
            .code(14);
    }
}
