// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Maps a finished worker's result document onto a state transition. The
//! task's physical `state` is `"claimed"` the whole time a worker has it,
//! regardless of which state it was claimed *from* — so the dispatch
//! table keys off `blueprint.claim_from` (the logical state the task sat
//! in before this worker picked it up), not `task.state` itself.

use crate::error::DispatchError;
use sched_core::{Blueprint, Decision, Flow, Outcome, ResultDocument, Task};
use sched_flow::{evaluate_conditions, AgentConditionSpawner, ConditionVerdict, PrHost, StepContext, StepOutputs, StepRegistry};
use sched_sandbox::SandboxManager;
use sched_store::Store;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct ResultContext<'a> {
    pub flow: &'a Flow,
    pub blueprint: &'a Blueprint,
    pub store: &'a dyn Store,
    pub sandbox: &'a SandboxManager,
    pub steps: &'a StepRegistry,
    pub pr_host: &'a dyn PrHost,
    pub agent_spawner: &'a dyn AgentConditionSpawner,
}

/// Routes one finished worker's result document to the right transition
/// according to its outcome/decision table.
pub async fn dispatch_result(
    ctx: &ResultContext<'_>,
    task: &Task,
    result: &ResultDocument,
) -> Result<(), DispatchError> {
    let claim_from = ctx.blueprint.claim_from.as_str();

    // The lease monitor runs independently of this dispatch and may have
    // already requeued the task (back to `claim_from`) between the worker
    // finishing and this tick picking up its result document. A task this
    // orchestrator no longer owns must not be clobbered by a late result.
    if task.state != "claimed" {
        warn!(
            task_id = %task.id,
            blueprint = %ctx.blueprint.name,
            current_state = %task.state,
            "task is no longer claimed (likely requeued by the lease monitor); skipping stale result"
        );
        return Ok(());
    }

    match (result.outcome, result.decision) {
        (Outcome::Failed, _) => run_transition(ctx, task, claim_from, "failed", result).await,

        (Outcome::NeedsContinuation, _) => {
            info!(
                task_id = %task.id,
                blueprint = %ctx.blueprint.name,
                "worker reported needs_continuation; releasing claim so it can resume"
            );
            ctx.store
                .update(
                    task.id.as_str(),
                    serde_json::json!({ "state": claim_from, "claimed_by": null, "lease_expires_at": null }),
                    task.version,
                )
                .await?;
            Ok(())
        }

        (Outcome::Done, _) if claim_from == "incoming" => {
            run_transition(ctx, task, claim_from, "provisional", result).await
        }

        (Outcome::Done, Some(Decision::Approve)) if claim_from == "provisional" => {
            run_transition(ctx, task, claim_from, "done", result).await
        }

        (Outcome::Done, Some(Decision::Reject)) if claim_from == "provisional" => {
            reject_cycle(ctx, task, result).await
        }

        (outcome, decision) => {
            warn!(
                task_id = %task.id,
                blueprint = %ctx.blueprint.name,
                ?outcome,
                ?decision,
                "no dispatch rule for this outcome/decision pair; leaving task untouched"
            );
            Ok(())
        }
    }
}

async fn sandbox_path_or_repo_root(ctx: &ResultContext<'_>, task_id: &str) -> PathBuf {
    ctx.sandbox
        .get(task_id)
        .await
        .map(|h| h.path)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolves `from -> to`'s declared conditions (if any) before running its
/// `runs` list. A `Fail` verdict reroutes to the condition's own target
/// instead; a `Pending` verdict defers the whole dispatch to a later tick.
async fn run_transition(
    ctx: &ResultContext<'_>,
    task: &Task,
    from: &str,
    to: &str,
    result: &ResultDocument,
) -> Result<(), DispatchError> {
    let transition = ctx.flow.transition(from, to);
    let sandbox_path = sandbox_path_or_repo_root(ctx, task.id.as_str()).await;

    if let Some(t) = transition {
        if !t.conditions.is_empty() {
            let verdict = evaluate_conditions(&t.conditions, &sandbox_path, from, ctx.agent_spawner, task.id.as_str()).await?;
            match verdict {
                ConditionVerdict::Pass => {}
                ConditionVerdict::Pending => return Ok(()),
                ConditionVerdict::Fail { route_to } => {
                    return finalize_transition(ctx, task, &route_to, result, &[], &sandbox_path).await;
                }
            }
        }
    }
    let runs = transition.map(|t| t.runs.clone()).unwrap_or_default();
    finalize_transition(ctx, task, to, result, &runs, &sandbox_path).await
}

async fn finalize_transition(
    ctx: &ResultContext<'_>,
    task: &Task,
    to: &str,
    result: &ResultDocument,
    runs: &[String],
    sandbox_path: &Path,
) -> Result<(), DispatchError> {
    let outputs = StepOutputs::default();
    if !runs.is_empty() {
        let step_ctx = StepContext {
            task,
            result,
            sandbox_path,
            store: ctx.store,
            pr_host: ctx.pr_host,
            sandbox: ctx.sandbox,
            outputs: &outputs,
        };
        if let Err(e) = ctx.steps.execute(&runs.to_vec(), &step_ctx).await {
            warn!(task_id = %task.id, error = %e, "transition steps failed; routing to failed");
            let current = ctx.store.get(task.id.as_str()).await?;
            ctx.store
                .update(
                    task.id.as_str(),
                    serde_json::json!({ "state": "failed", "failure_reason": e.to_string() }),
                    current.version,
                )
                .await?;
            ctx.sandbox.destroy_sandbox(task.id.as_str(), false).await?;
            return Err(DispatchError::Step(e));
        }
    }

    // A step may already have performed the state change this transition
    // wants (e.g. `submit_to_server` calls `Store::submit`, which sets
    // `state: provisional` itself) and bumped the version doing it — so
    // re-read before deciding what, if anything, still needs applying.
    let current = ctx.store.get(task.id.as_str()).await?;
    let mut fields = serde_json::Map::new();
    if current.state != to {
        fields.insert("state".to_string(), serde_json::Value::String(to.to_string()));
        if to == "failed" {
            fields.insert(
                "failure_reason".to_string(),
                serde_json::Value::String(
                    result
                        .reason
                        .clone()
                        .unwrap_or_else(|| "worker reported failure".to_string()),
                ),
            );
        }
    }
    if let Some(pr) = outputs.pr_info() {
        if current.pr_number != Some(pr.pr_number) {
            fields.insert("pr_number".to_string(), serde_json::json!(pr.pr_number));
            fields.insert("pr_url".to_string(), serde_json::json!(pr.pr_url));
        }
    }
    if let Some(branch) = outputs.branch_name() {
        if current.branch.as_deref() != Some(branch.as_str()) {
            fields.insert("branch".to_string(), serde_json::json!(branch));
        }
    }

    if !fields.is_empty() {
        ctx.store
            .update(task.id.as_str(), serde_json::Value::Object(fields), current.version)
            .await?;
    }
    if to == "done" || to == "failed" {
        ctx.sandbox.destroy_sandbox(task.id.as_str(), false).await?;
    }
    Ok(())
}

/// A review rejection routes the task back to `incoming` and runs the
/// `provisional -> incoming` transition's `runs` (typically
/// `reject_with_feedback`), unless the blueprint's `max_rejections` bound
/// has been hit — at which point the task is force-failed instead of
/// spinning forever (see `Task::rejection_count`).
async fn reject_cycle(ctx: &ResultContext<'_>, task: &Task, result: &ResultDocument) -> Result<(), DispatchError> {
    let sandbox_path = sandbox_path_or_repo_root(ctx, task.id.as_str()).await;

    if task.rejection_count + 1 >= ctx.blueprint.max_rejections {
        let reason = result
            .comment
            .clone()
            .unwrap_or_else(|| "rejected too many times".to_string());
        ctx.store
            .update(
                task.id.as_str(),
                serde_json::json!({
                    "state": "failed",
                    "failure_reason": format!("exceeded max_rejections ({}): {reason}", ctx.blueprint.max_rejections),
                }),
                task.version,
            )
            .await?;
        ctx.sandbox.destroy_sandbox(task.id.as_str(), false).await?;
        return Ok(());
    }

    let transition = ctx.flow.transition("provisional", "incoming");
    let runs = transition.map(|t| t.runs.clone()).unwrap_or_default();
    let outputs = StepOutputs::default();
    if !runs.is_empty() {
        let step_ctx = StepContext {
            task,
            result,
            sandbox_path: &sandbox_path,
            store: ctx.store,
            pr_host: ctx.pr_host,
            sandbox: ctx.sandbox,
            outputs: &outputs,
        };
        ctx.steps.execute(&runs, &step_ctx).await?;
    }

    ctx.store
        .update(
            task.id.as_str(),
            serde_json::json!({
                "state": "incoming",
                "claimed_by": null,
                "lease_expires_at": null,
                "rejection_count": task.rejection_count + 1,
            }),
            task.version,
        )
        .await?;
    Ok(())
}

#[cfg(test)]
#[path = "result_handler_tests.rs"]
mod tests;
