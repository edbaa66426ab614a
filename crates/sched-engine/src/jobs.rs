// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! The periodic jobs run once per tick alongside the guard/spawn
//! pipeline. Each is isolated: a failing job is logged and skipped so it
//! never takes the rest of the tick down with it.

use crate::error::JobError;
use crate::result_handler::{dispatch_result, ResultContext};
use sched_core::{Blueprint, Flow, ResultDocument, SchedulerState};
use sched_flow::{AgentConditionSpawner, PrHost, StepRegistry};
use sched_pool::{PoolRegistry, ProcessLiveness};
use sched_sandbox::SandboxManager;
use sched_store::Store;
use std::collections::HashMap;
use tracing::{debug, info, warn};

const REGISTER_INTERVAL_SECONDS: u64 = 300;
const REQUEUE_INTERVAL_SECONDS: u64 = 60;
const PROVISIONAL_INTERVAL_SECONDS: u64 = 60;
const PROJECT_COMPLETION_INTERVAL_SECONDS: u64 = 60;
const SWEEP_INTERVAL_SECONDS: u64 = 3600;

/// Shared, read-only handles every job needs. Built once per tick by
/// `sched-tick`'s wiring and borrowed for the duration of the tick.
pub struct JobContext<'a> {
    pub store: &'a dyn Store,
    pub pool: &'a PoolRegistry,
    pub sandbox: &'a SandboxManager,
    pub liveness: &'a dyn ProcessLiveness,
    pub blueprints: &'a HashMap<String, Blueprint>,
    pub flows: &'a HashMap<String, Flow>,
    pub steps: &'a StepRegistry,
    pub pr_host: &'a dyn PrHost,
    pub agent_spawner: &'a dyn AgentConditionSpawner,
    pub orchestrator_id: &'a str,
    pub cluster: &'a str,
    pub machine_id: &'a str,
}

/// A pool entry's `task_id` naming an `agent`-kind condition worker rather
/// than a real task (see `condition_spawn::condition_sandbox_id`).
fn is_condition_worker(task_id: &str) -> bool {
    task_id.contains("__condition__")
}

/// Runs every job that's due, recording `last_run` on success.
/// `check_finished_agents` has no interval of its own — every tick needs
/// to notice a worker that just finished, so it always runs.
pub async fn run_due_jobs(ctx: &JobContext<'_>, state: &mut SchedulerState, now_ms: u64) {
    if state.is_due("register_orchestrator", REGISTER_INTERVAL_SECONDS, now_ms) {
        match register_orchestrator(ctx).await {
            Ok(()) => state.record_run("register_orchestrator", now_ms),
            Err(e) => warn!(error = %e, "register_orchestrator failed"),
        }
    }

    if let Err(e) = check_finished_agents(ctx).await {
        warn!(error = %e, "check_finished_agents failed");
    }

    if state.is_due("requeue_expired_leases", REQUEUE_INTERVAL_SECONDS, now_ms) {
        match requeue_expired_leases(ctx, now_ms).await {
            Ok(()) => state.record_run("requeue_expired_leases", now_ms),
            Err(e) => warn!(error = %e, "requeue_expired_leases failed"),
        }
    }

    if state.is_due("process_provisional_tasks", PROVISIONAL_INTERVAL_SECONDS, now_ms) {
        match process_provisional_tasks(ctx, state).await {
            Ok(()) => state.record_run("process_provisional_tasks", now_ms),
            Err(e) => warn!(error = %e, "process_provisional_tasks failed"),
        }
    }

    if state.is_due("check_project_completion", PROJECT_COMPLETION_INTERVAL_SECONDS, now_ms) {
        match check_project_completion(ctx).await {
            Ok(()) => state.record_run("check_project_completion", now_ms),
            Err(e) => warn!(error = %e, "check_project_completion failed"),
        }
    }

    if state.is_due("sweep_stale_worktrees", SWEEP_INTERVAL_SECONDS, now_ms) {
        match sweep_stale_worktrees(ctx).await {
            Ok(()) => state.record_run("sweep_stale_worktrees", now_ms),
            Err(e) => warn!(error = %e, "sweep_stale_worktrees failed"),
        }
    }
}

/// Idempotent presence beacon. Run on its own interval rather
/// than once at startup, since a long-lived daemon-style deployment would
/// otherwise look dead to the store after its first heartbeat expires.
async fn register_orchestrator(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let capabilities: Vec<String> = ctx.blueprints.keys().cloned().collect();
    ctx.store
        .register(ctx.orchestrator_id, ctx.cluster, ctx.machine_id, &capabilities)
        .await?;
    info!(orchestrator_id = ctx.orchestrator_id, "registered with store");
    Ok(())
}

/// Scans the pool for task-bound workers that have written a result
/// document and routes each through the dispatcher. Runs every tick: a
/// worker could finish between any two ticks.
async fn check_finished_agents(ctx: &JobContext<'_>) -> Result<(), JobError> {
    for entry in ctx.pool.list_all()? {
        let Some(task_id) = entry.record.task_id.clone() else {
            continue;
        };
        if is_condition_worker(&task_id) {
            continue;
        }

        let Some(handle) = ctx.sandbox.get(&task_id).await else {
            continue;
        };
        let result_path = handle.result_document_path();
        if !result_path.exists() {
            continue;
        }

        let contents = tokio::fs::read_to_string(&result_path).await?;
        let result: ResultDocument = match serde_json::from_str(&contents) {
            Ok(r) => r,
            Err(e) => {
                warn!(task_id, error = %e, "malformed result document; leaving for next tick");
                continue;
            }
        };

        let task = ctx.store.get(&task_id).await?;
        let blueprint = ctx
            .blueprints
            .get(&entry.blueprint)
            .ok_or_else(|| JobError::UnknownBlueprint(entry.blueprint.clone()))?;
        let flow = ctx
            .flows
            .get(&task.flow)
            .ok_or_else(|| JobError::UnknownFlow(task.flow.clone(), task_id.clone()))?;

        let result_ctx = ResultContext {
            flow,
            blueprint,
            store: ctx.store,
            sandbox: ctx.sandbox,
            steps: ctx.steps,
            pr_host: ctx.pr_host,
            agent_spawner: ctx.agent_spawner,
        };
        dispatch_result(&result_ctx, &task, &result).await?;
        ctx.pool.remove(&entry.blueprint, entry.pid)?;
        info!(task_id, blueprint = %entry.blueprint, "dispatched finished agent result");
    }
    Ok(())
}

/// A safety net for workers that die without ever writing a result
/// document (killed, crashed, OOM). Only releases a claim once its lease
/// has actually expired, so a worker that just started and hasn't been
/// seen alive yet by this tick's liveness check isn't punished early.
async fn requeue_expired_leases(ctx: &JobContext<'_>, now_ms: u64) -> Result<(), JobError> {
    let now = chrono::DateTime::from_timestamp_millis(now_ms as i64).unwrap_or_else(chrono::Utc::now);

    for entry in ctx.pool.list_all()? {
        let Some(task_id) = entry.record.task_id.clone() else {
            continue;
        };
        if is_condition_worker(&task_id) {
            continue;
        }
        if ctx.liveness.is_live(entry.pid, entry.record.started_at_ms) {
            continue;
        }
        let already_finished = ctx
            .sandbox
            .get(&task_id)
            .await
            .map(|h| h.result_document_path().exists())
            .unwrap_or(false);
        if already_finished {
            // check_finished_agents will dispatch this normally next tick.
            continue;
        }

        let task = match ctx.store.get(&task_id).await {
            Ok(t) => t,
            Err(_) => {
                ctx.pool.remove(&entry.blueprint, entry.pid)?;
                continue;
            }
        };
        if task.state != "claimed" || task.claimed_by.as_deref() != Some(entry.blueprint.as_str()) {
            // Already resolved by someone else; just drop our stale pool file.
            ctx.pool.remove(&entry.blueprint, entry.pid)?;
            continue;
        }
        let expired = task
            .lease_expires_at
            .as_deref()
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|lease| lease.with_timezone(&chrono::Utc) <= now)
            .unwrap_or(true);
        if !expired {
            continue;
        }

        let blueprint = ctx
            .blueprints
            .get(&entry.blueprint)
            .ok_or_else(|| JobError::UnknownBlueprint(entry.blueprint.clone()))?;
        ctx.store
            .update(
                &task_id,
                serde_json::json!({
                    "state": blueprint.claim_from,
                    "claimed_by": null,
                    "lease_expires_at": null,
                }),
                task.version,
            )
            .await?;
        ctx.pool.remove(&entry.blueprint, entry.pid)?;
        warn!(task_id, blueprint = %entry.blueprint, "released expired lease from a dead worker");
    }
    Ok(())
}

/// A lightweight consistency check over the last poll's provisional-task
/// snapshot. The store's poll summary only reports queue depths and the
/// id list, not full task bodies, so this can flag an inconsistency
/// (a provisional task with no PR attached) but can't repair it on its
/// own — repair happens through the normal gatekeeper claim/dispatch path.
async fn process_provisional_tasks(ctx: &JobContext<'_>, state: &SchedulerState) -> Result<(), JobError> {
    let Some(poll) = state.poll_cache.as_ref() else {
        return Ok(());
    };
    for task_id in &poll.provisional_tasks {
        let task = match ctx.store.get(task_id).await {
            Ok(t) => t,
            Err(e) => {
                debug!(task_id, error = %e, "provisional task vanished since the last poll");
                continue;
            }
        };
        if task.state != "provisional" {
            continue;
        }
        if task.pr_number.is_none() {
            warn!(task_id, "task sitting in provisional with no pr_number recorded");
        }
    }
    Ok(())
}

/// The remote store has no "list a project's children" call (see
/// `Store`'s narrow surface), so project completion can't be swept from
/// here directly. It's instead driven entirely by the project's own flow
/// transitions (`create_project_pr` / `merge_project_pr`) running through
/// the normal claim/guard/dispatch path for whichever blueprint owns them.
async fn check_project_completion(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let _ = ctx;
    debug!("check_project_completion: no project-listing endpoint; relying on per-task flow transitions");
    Ok(())
}

/// Removes worktree directories left behind by a crashed or otherwise
/// interrupted tick. Gated on no agents running anywhere in the pool so a
/// worktree backing an in-progress worker is never touched.
async fn sweep_stale_worktrees(ctx: &JobContext<'_>) -> Result<(), JobError> {
    let any_live = ctx
        .pool
        .list_all()?
        .iter()
        .any(|e| ctx.liveness.is_live(e.pid, e.record.started_at_ms));
    if any_live {
        debug!("sweep_stale_worktrees: agents still running; skipping this tick");
        return Ok(());
    }

    for dir_name in ctx.sandbox.worktree_dir_names().await? {
        let task_id = dir_name.split("__condition__").next().unwrap_or(&dir_name);
        let still_claimed = matches!(ctx.store.get(task_id).await, Ok(task) if task.state == "claimed");
        if still_claimed {
            continue;
        }
        ctx.sandbox.force_remove(&dir_name).await?;
        info!(worktree = dir_name, "swept stale worktree");
    }
    Ok(())
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
