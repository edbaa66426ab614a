// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Composes one scheduler tick: a due-jobs pass, then a
//! guard-chain-into-spawn pass for every configured blueprint. Each pass
//! is isolated the same way `jobs::run_due_jobs` isolates its jobs — one
//! blueprint's guard chain erroring never stops the rest from running.

use crate::error::EngineError;
use crate::guard::{default_chain, run_guard_chain, Guard, GuardChainOutcome, GuardContext, GuardLimits};
use crate::jobs::{run_due_jobs, JobContext};
use crate::spawn::SpawnStrategy;
use sched_core::{Blueprint, Flow, PollSummary, SchedulerState};
use sched_flow::{AgentConditionSpawner, PrHost, StepRegistry};
use sched_pool::{PoolRegistry, ProcessLiveness};
use sched_store::Store;
use std::collections::HashMap;
use tracing::{info, warn};

/// Everything one tick needs, built once by `sched-tick`'s wiring and
/// borrowed for the tick's duration.
pub struct TickContext<'a> {
    pub store: &'a dyn Store,
    pub pool: &'a PoolRegistry,
    pub sandbox: &'a sched_sandbox::SandboxManager,
    pub liveness: &'a dyn ProcessLiveness,
    pub blueprints: &'a HashMap<String, Blueprint>,
    pub flows: &'a HashMap<String, Flow>,
    pub steps: &'a StepRegistry,
    pub pr_host: &'a dyn PrHost,
    pub agent_spawner: &'a dyn AgentConditionSpawner,
    pub spawn_strategy: &'a SpawnStrategy,
    pub limits: GuardLimits,
    pub orchestrator_id: &'a str,
    pub cluster: &'a str,
    pub machine_id: &'a str,
}

/// What happened to one blueprint's guard chain this tick, returned for
/// logging and for the `[[test]] scenarios` integration suite to assert
/// against without scraping log output.
#[derive(Debug)]
pub enum BlueprintOutcome {
    Spawned { pid: u32 },
    Halted { guard: &'static str, reason: String },
    Errored(String),
}

#[derive(Debug, Default)]
pub struct TickSummary {
    pub blueprints: Vec<(String, BlueprintOutcome)>,
}

fn job_ctx<'a>(ctx: &'a TickContext<'a>) -> JobContext<'a> {
    JobContext {
        store: ctx.store,
        pool: ctx.pool,
        sandbox: ctx.sandbox,
        liveness: ctx.liveness,
        blueprints: ctx.blueprints,
        flows: ctx.flows,
        steps: ctx.steps,
        pr_host: ctx.pr_host,
        agent_spawner: ctx.agent_spawner,
        orchestrator_id: ctx.orchestrator_id,
        cluster: ctx.cluster,
        machine_id: ctx.machine_id,
    }
}

/// Runs one tick to completion. Never returns an error for a single
/// blueprint or job failing — only a poll failure (nothing else in the
/// tick can proceed without a fresh queue snapshot) bubbles up.
pub async fn run_tick(
    ctx: &TickContext<'_>,
    state: &mut SchedulerState,
    now_ms: u64,
) -> Result<TickSummary, EngineError> {
    let poll = ctx
        .store
        .poll(ctx.orchestrator_id)
        .await
        .map_err(crate::error::JobError::Store)?;
    info!(
        registered = poll.registered,
        provisional = poll.provisional_tasks.len(),
        "polled store"
    );
    state.poll_cache = Some(poll.clone());

    let jctx = job_ctx(ctx);
    run_due_jobs(&jctx, state, now_ms).await;

    let chain = default_chain();
    let mut summary = TickSummary::default();
    let mut names: Vec<&String> = ctx.blueprints.keys().collect();
    names.sort();
    for name in names {
        let blueprint = &ctx.blueprints[name];
        let outcome = run_one_blueprint(ctx, &chain, blueprint, &poll, state, now_ms).await;
        summary.blueprints.push((name.clone(), outcome));
    }
    Ok(summary)
}

async fn run_one_blueprint(
    ctx: &TickContext<'_>,
    chain: &[Box<dyn Guard>],
    blueprint: &Blueprint,
    poll: &PollSummary,
    state: &SchedulerState,
    now_ms: u64,
) -> BlueprintOutcome {
    let mut guard_ctx = GuardContext {
        blueprint,
        pool: ctx.pool,
        liveness: ctx.liveness,
        scheduler_state: state,
        poll,
        store: ctx.store,
        pr_host: ctx.pr_host,
        limits: ctx.limits,
        now_ms,
        claimed_task: None,
    };

    let outcome = match run_guard_chain(chain, &mut guard_ctx).await {
        Ok(o) => o,
        Err(e) => {
            warn!(blueprint = %blueprint.name, error = %e, "guard chain errored");
            return BlueprintOutcome::Errored(e.to_string());
        }
    };

    match outcome {
        GuardChainOutcome::Halted { guard, reason } => BlueprintOutcome::Halted { guard, reason },
        GuardChainOutcome::Proceed(task) => match ctx.spawn_strategy.spawn(blueprint, Some(&task), now_ms).await {
            Ok(pid) => BlueprintOutcome::Spawned { pid },
            Err(e) => {
                warn!(blueprint = %blueprint.name, task_id = %task.id, error = %e, "spawn failed after claim");
                BlueprintOutcome::Errored(e.to_string())
            }
        },
    }
}

#[cfg(test)]
#[path = "tick_tests.rs"]
mod tests;
