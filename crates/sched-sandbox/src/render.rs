// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Renders the files written into a sandbox's `.sched/` directory: the
//! worker prompt, the task manifest, the environment file, and any
//! per-blueprint helper scripts.

use sched_core::Task;

pub struct RenderedSandbox {
    pub prompt: String,
    pub manifest: serde_json::Value,
    pub env_file: String,
    /// `(file_name, contents)` pairs written alongside the prompt.
    pub helper_scripts: Vec<(String, String)>,
}

/// Builds the worker prompt: task body, acceptance criteria carried in
/// `instructions`, and rejection-feedback history when this is a resubmit.
pub fn render_prompt(task: &Task, instructions: &str, rejection_history: Option<&str>) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("# {}\n\n", task.title));
    prompt.push_str(&task.body);
    prompt.push('\n');
    if !instructions.trim().is_empty() {
        prompt.push_str("\n## Instructions\n\n");
        prompt.push_str(instructions);
        prompt.push('\n');
    }
    if let Some(history) = rejection_history {
        if !history.trim().is_empty() {
            prompt.push_str("\n## Prior rejection feedback\n\n");
            prompt.push_str(history);
            prompt.push('\n');
        }
    }
    prompt
}

pub fn render_manifest(task: &Task) -> serde_json::Value {
    serde_json::json!({
        "task_id": task.id.as_str(),
        "role": task.role,
        "flow": task.flow,
        "branch": task.branch,
        "project_id": task.project_id,
        "rejection_count": task.rejection_count,
    })
}

pub fn render_env(task: &Task) -> String {
    let mut lines = vec![
        format!("SCHED_TASK_ID={}", task.id.as_str()),
        format!("SCHED_TASK_ROLE={}", task.role),
        format!("SCHED_TASK_FLOW={}", task.flow),
    ];
    if let Some(branch) = &task.branch {
        lines.push(format!("SCHED_TASK_BRANCH={branch}"));
    }
    lines.join("\n") + "\n"
}

/// Substitutes `{{interpreter}}` in a helper-script template with the
/// configured interpreter path (e.g. `/usr/bin/env bash`).
pub fn render_helper_script(template: &str, interpreter_path: &str) -> String {
    template.replace("{{interpreter}}", interpreter_path)
}

pub fn render_sandbox(
    task: &Task,
    instructions: &str,
    rejection_history: Option<&str>,
    helper_script_templates: &[(String, String)],
    interpreter_path: &str,
) -> RenderedSandbox {
    RenderedSandbox {
        prompt: render_prompt(task, instructions, rejection_history),
        manifest: render_manifest(task),
        env_file: render_env(task),
        helper_scripts: helper_script_templates
            .iter()
            .map(|(name, tmpl)| (name.clone(), render_helper_script(tmpl, interpreter_path)))
            .collect(),
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
