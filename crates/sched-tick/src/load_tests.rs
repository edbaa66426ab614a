// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use super::*;
use sched_flow::StepRegistry;

const BLUEPRINT_YAML: &str = r#"
worker:
  role: implement
  model: sonnet
  max_instances: 2
  interval_seconds: 0
  spawn_mode: task-bound
  max_turns: 10
"#;

const FLOW_YAML: &str = r#"
name: default
initial_state: incoming
transitions:
  "incoming -> provisional":
    agent: worker
    runs: []
"#;

#[test]
fn load_blueprints_merges_every_yaml_file_in_the_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("workers.yaml"), BLUEPRINT_YAML).expect("write");
    std::fs::write(dir.path().join("notes.txt"), "ignored").expect("write");

    let blueprints = load_blueprints(dir.path()).expect("load");
    assert_eq!(blueprints.len(), 1);
    assert!(blueprints.contains_key("worker"));
}

#[test]
fn load_blueprints_on_a_missing_directory_returns_an_empty_map() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("does-not-exist");
    let blueprints = load_blueprints(&missing).expect("load");
    assert!(blueprints.is_empty());
}

#[test]
fn load_flows_keys_by_the_flows_own_name_field() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("default.yaml"), FLOW_YAML).expect("write");

    let flows = load_flows(dir.path()).expect("load");
    assert!(flows.contains_key("default"));
}

#[test]
fn validate_all_passes_when_every_reference_resolves() {
    let root = tempfile::tempdir().expect("tempdir");
    let blueprints_dir = root.path().join("blueprints");
    let flows_dir = root.path().join("flows");
    std::fs::create_dir_all(&blueprints_dir).expect("mkdir");
    std::fs::create_dir_all(&flows_dir).expect("mkdir");
    std::fs::write(blueprints_dir.join("workers.yaml"), BLUEPRINT_YAML).expect("write");
    std::fs::write(flows_dir.join("default.yaml"), FLOW_YAML).expect("write");

    let blueprints = load_blueprints(&blueprints_dir).expect("load blueprints");
    let flows = load_flows(&flows_dir).expect("load flows");
    let steps = StepRegistry::new();

    validate_all(&flows, &blueprints, &steps).expect("validate");
}

#[test]
fn validate_all_rejects_a_transition_that_names_an_unknown_blueprint() {
    let root = tempfile::tempdir().expect("tempdir");
    let flows_dir = root.path().join("flows");
    std::fs::create_dir_all(&flows_dir).expect("mkdir");
    std::fs::write(flows_dir.join("default.yaml"), FLOW_YAML).expect("write");

    let flows = load_flows(&flows_dir).expect("load flows");
    let blueprints = HashMap::new();
    let steps = StepRegistry::new();

    let result = validate_all(&flows, &blueprints, &steps);
    assert!(result.is_err());
}
