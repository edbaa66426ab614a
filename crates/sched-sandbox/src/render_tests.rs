// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use super::*;
use sched_core::TaskId;

fn task() -> Task {
    Task {
        id: TaskId::new("t1"),
        state: "claimed".to_string(),
        title: "Fix the thing".to_string(),
        body: "Do the thing carefully.".to_string(),
        role: "implement".to_string(),
        priority: 0,
        project_id: None,
        branch: Some("feature/t1".to_string()),
        version: 3,
        claimed_by: Some("impl-1".to_string()),
        lease_expires_at: None,
        pr_number: None,
        pr_url: None,
        blocked_by: None,
        flow: "implement".to_string(),
        failure_reason: None,
        execution_notes: None,
        rejection_count: 0,
    }
}

#[test]
fn prompt_includes_title_body_and_instructions() {
    let prompt = render_prompt(&task(), "Write tests too.", None);
    assert!(prompt.contains("Fix the thing"));
    assert!(prompt.contains("Do the thing carefully."));
    assert!(prompt.contains("Write tests too."));
    assert!(!prompt.contains("Prior rejection feedback"));
}

#[test]
fn prompt_appends_rejection_history_when_present() {
    let prompt = render_prompt(&task(), "", Some("tests were failing on line 12"));
    assert!(prompt.contains("Prior rejection feedback"));
    assert!(prompt.contains("line 12"));
}

#[test]
fn manifest_carries_identifying_fields() {
    let manifest = render_manifest(&task());
    assert_eq!(manifest["task_id"], "t1");
    assert_eq!(manifest["branch"], "feature/t1");
}

#[test]
fn env_file_has_one_var_per_line() {
    let env = render_env(&task());
    assert!(env.contains("SCHED_TASK_ID=t1"));
    assert!(env.contains("SCHED_TASK_BRANCH=feature/t1"));
}

#[test]
fn helper_script_substitutes_interpreter_path() {
    let rendered = render_helper_script("#!{{interpreter}}\necho hi\n", "/usr/bin/env bash");
    assert_eq!(rendered, "#!/usr/bin/env bash\necho hi\n");
}
