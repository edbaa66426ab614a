// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use super::*;

const SAMPLE_FLOW: &str = r#"
name: implement
description: default implement/review/merge flow
transitions:
  "incoming -> claimed":
    agent: implement
    runs: []
  "claimed -> provisional":
    runs: [push_branch, create_pr, submit_to_server]
  "provisional -> done":
    agent: gatekeeper
    runs: [post_review_comment, merge_pr]
    conditions:
      - name: tests_pass
        type: script
        script: ./scripts/check_ci.sh
        on_fail: incoming
      - name: human_signoff
        type: manual
"#;

#[test]
fn parses_transition_keys_into_from_and_to() {
    let flow = parse_flow(SAMPLE_FLOW).unwrap();
    assert_eq!(flow.name, "implement");
    let t = flow.transition("claimed", "provisional").unwrap();
    assert_eq!(t.runs, vec!["push_branch", "create_pr", "submit_to_server"]);
}

#[test]
fn parses_conditions_in_declared_order() {
    let flow = parse_flow(SAMPLE_FLOW).unwrap();
    let t = flow.transition("provisional", "done").unwrap();
    assert_eq!(t.conditions.len(), 2);
    assert_eq!(t.conditions[0].name, "tests_pass");
    assert_eq!(t.conditions[1].name, "human_signoff");
}

#[test]
fn unknown_condition_type_is_rejected() {
    let yaml = r#"
name: bad
transitions:
  "a -> b":
    conditions:
      - name: x
        type: telepathy
"#;
    let err = parse_flow(yaml).unwrap_err();
    assert!(matches!(err, FlowError::UnknownConditionType { .. }));
}

#[test]
fn defaults_initial_state_to_first_transitions_from_when_absent() {
    let flow = parse_flow(SAMPLE_FLOW).unwrap();
    assert_eq!(flow.initial_state, "incoming");
}

#[test]
fn parses_blueprint_map_and_fills_name_from_key() {
    let yaml = r#"
implement:
  role: implement
  model: sonnet
  max_instances: 2
  interval_seconds: 30
  spawn_mode: task-bound
  max_turns: 40
  allowed_tools: ["Edit", "Bash"]
"#;
    let blueprints = parse_blueprints(yaml).unwrap();
    let bp = blueprints.get("implement").unwrap();
    assert_eq!(bp.name, "implement");
    assert_eq!(bp.claim_from, "incoming");
}
