// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! The eight-guard chain every blueprint runs through before a worker is
//! spawned. Guards are evaluated in a fixed order and short-circuit at the
//! first halt; only `claim_task` mutates the store, and `pr_mergeable` is
//! the one exception that may undo that mutation by releasing the claim it
//! just took.

use crate::error::GuardError;
use async_trait::async_trait;
use sched_core::{Blueprint, PollSummary, SchedulerState, Task};
use sched_flow::PrHost;
use sched_pool::{PoolRegistry, ProcessLiveness};
use sched_store::{ClaimRequest, Store};
use tracing::{debug, info};

/// Queue-depth ceilings enforced by the backpressure guard. Not part of
/// [`Blueprint`] because they bound the whole pipeline's in-flight work
/// rather than one blueprint's own instance count.
#[derive(Debug, Clone, Copy)]
pub struct GuardLimits {
    pub max_claimed: u32,
    pub max_provisional: u32,
}

pub struct GuardContext<'a> {
    pub blueprint: &'a Blueprint,
    pub pool: &'a PoolRegistry,
    pub liveness: &'a dyn ProcessLiveness,
    pub scheduler_state: &'a SchedulerState,
    pub poll: &'a PollSummary,
    pub store: &'a dyn Store,
    pub pr_host: &'a dyn PrHost,
    pub limits: GuardLimits,
    pub now_ms: u64,
    /// Set by `claim_task` on success; cleared again by `task_description`
    /// or `pr_mergeable` if either releases the claim.
    pub claimed_task: Option<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardVerdict {
    Proceed,
    Halt(String),
}

#[async_trait]
pub trait Guard: Send + Sync {
    fn name(&self) -> &'static str;
    async fn check(&self, ctx: &mut GuardContext<'_>) -> Result<GuardVerdict, GuardError>;
}

/// Guard 1: a paused blueprint never spawns.
pub struct EnabledGuard;

#[async_trait]
impl Guard for EnabledGuard {
    fn name(&self) -> &'static str {
        "enabled"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> Result<GuardVerdict, GuardError> {
        if ctx.blueprint.paused {
            Ok(GuardVerdict::Halt("blueprint is paused".to_string()))
        } else {
            Ok(GuardVerdict::Proceed)
        }
    }
}

/// Guard 2: refuse to exceed `max_instances` live workers for this
/// blueprint.
pub struct PoolCapacityGuard;

#[async_trait]
impl Guard for PoolCapacityGuard {
    fn name(&self) -> &'static str {
        "pool_capacity"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> Result<GuardVerdict, GuardError> {
        let live = ctx
            .pool
            .live_count(&ctx.blueprint.name, ctx.liveness)
            .map_err(GuardError::Pool)?;
        if live as u32 >= ctx.blueprint.max_instances {
            Ok(GuardVerdict::Halt(format!(
                "pool at capacity ({live}/{})",
                ctx.blueprint.max_instances
            )))
        } else {
            Ok(GuardVerdict::Proceed)
        }
    }
}

/// Guard 3: don't spawn again before `interval_seconds` has elapsed since
/// this blueprint's last spawn.
pub struct IntervalGuard;

#[async_trait]
impl Guard for IntervalGuard {
    fn name(&self) -> &'static str {
        "interval"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> Result<GuardVerdict, GuardError> {
        let job = spawn_job_name(&ctx.blueprint.name);
        if ctx
            .scheduler_state
            .is_due(&job, ctx.blueprint.interval_seconds, ctx.now_ms)
        {
            Ok(GuardVerdict::Proceed)
        } else {
            Ok(GuardVerdict::Halt("interval not yet elapsed".to_string()))
        }
    }
}

/// Guard 4: refuse to spawn while this blueprint's role already has too
/// much work in flight, independent of any single blueprint's own cap.
pub struct BackpressureGuard;

#[async_trait]
impl Guard for BackpressureGuard {
    fn name(&self) -> &'static str {
        "backpressure"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> Result<GuardVerdict, GuardError> {
        let counts = ctx
            .poll
            .queue_counts
            .get(&ctx.blueprint.role)
            .copied()
            .unwrap_or_default();
        if counts.claimed >= ctx.limits.max_claimed {
            return Ok(GuardVerdict::Halt(format!(
                "claimed queue at capacity ({}/{})",
                counts.claimed, ctx.limits.max_claimed
            )));
        }
        if counts.provisional >= ctx.limits.max_provisional {
            return Ok(GuardVerdict::Halt(format!(
                "provisional queue at capacity ({}/{})",
                counts.provisional, ctx.limits.max_provisional
            )));
        }
        Ok(GuardVerdict::Proceed)
    }
}

/// Guard 5: an optional user-supplied script that must exit zero before
/// this blueprint is allowed to claim anything this tick.
pub struct PreCheckGuard;

#[async_trait]
impl Guard for PreCheckGuard {
    fn name(&self) -> &'static str {
        "pre_check"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> Result<GuardVerdict, GuardError> {
        let Some(script) = &ctx.blueprint.pre_check_script else {
            return Ok(GuardVerdict::Proceed);
        };
        let output = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            tokio::process::Command::new(script).output(),
        )
        .await
        .map_err(|_| GuardError::PreCheckTimedOut {
            script: script.clone(),
        })?
        .map_err(|source| GuardError::Io {
            guard: "pre_check",
            source,
        })?;
        if output.status.success() {
            Ok(GuardVerdict::Proceed)
        } else {
            Ok(GuardVerdict::Halt(format!(
                "pre-check script {script} exited non-zero"
            )))
        }
    }
}

/// Guard 6: the sole state-mutating guard. Atomically claims one task
/// matching this blueprint's role and `claim_from` state.
pub struct ClaimTaskGuard;

#[async_trait]
impl Guard for ClaimTaskGuard {
    fn name(&self) -> &'static str {
        "claim_task"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> Result<GuardVerdict, GuardError> {
        let task_type = ctx.blueprint.allowed_task_types.first().map(String::as_str);
        let claimed = ctx
            .store
            .claim(ClaimRequest {
                blueprint: &ctx.blueprint.name,
                role: &ctx.blueprint.role,
                from_state: &ctx.blueprint.claim_from,
                task_type,
            })
            .await;
        match claimed {
            Ok(Some(task)) => {
                info!(blueprint = %ctx.blueprint.name, task_id = %task.id, "claimed task");
                ctx.claimed_task = Some(task);
                Ok(GuardVerdict::Proceed)
            }
            Ok(None) | Err(sched_core::StoreError::NotAvailable) => {
                Ok(GuardVerdict::Halt("no matching task available".to_string()))
            }
            Err(source) => Err(GuardError::Store {
                guard: "claim_task",
                source,
            }),
        }
    }
}

/// Guard 7: a task with an empty prompt body can never produce useful
/// worker output; fail it immediately rather than let it occupy a slot.
pub struct TaskDescriptionGuard;

#[async_trait]
impl Guard for TaskDescriptionGuard {
    fn name(&self) -> &'static str {
        "task_description"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> Result<GuardVerdict, GuardError> {
        let Some(task) = &ctx.claimed_task else {
            return Ok(GuardVerdict::Proceed);
        };
        if !task.body_is_empty() {
            return Ok(GuardVerdict::Proceed);
        }
        ctx.store
            .update(
                task.id.as_str(),
                serde_json::json!({ "state": "failed", "failure_reason": "empty task body" }),
                task.version,
            )
            .await
            .map_err(|source| GuardError::Store {
                guard: "task_description",
                source,
            })?;
        ctx.claimed_task = None;
        Ok(GuardVerdict::Halt(
            "task body empty; moved to failed".to_string(),
        ))
    }
}

/// Guard 8: review-type blueprints (those claiming from `provisional`)
/// refuse to spawn a reviewer against a PR that can no longer merge
/// cleanly; the claim is released with rebase guidance instead.
pub struct PrMergeableGuard;

#[async_trait]
impl Guard for PrMergeableGuard {
    fn name(&self) -> &'static str {
        "pr_mergeable"
    }

    async fn check(&self, ctx: &mut GuardContext<'_>) -> Result<GuardVerdict, GuardError> {
        if !ctx.blueprint.reviews_provisional() {
            return Ok(GuardVerdict::Proceed);
        }
        let Some(task) = &ctx.claimed_task else {
            return Ok(GuardVerdict::Proceed);
        };
        let Some(pr_number) = task.pr_number else {
            return Ok(GuardVerdict::Proceed);
        };
        let mergeable = ctx
            .pr_host
            .pr_mergeable(pr_number)
            .await
            .map_err(|message| GuardError::Forge {
                guard: "pr_mergeable",
                message,
            })?;
        if mergeable {
            return Ok(GuardVerdict::Proceed);
        }

        let task_id = task.id.as_str().to_string();
        ctx.store
            .update(
                &task_id,
                serde_json::json!({
                    "state": "incoming",
                    "claimed_by": null,
                    "lease_expires_at": null,
                    "execution_notes": "PR has merge conflicts; rebase before re-claiming",
                }),
                task.version,
            )
            .await
            .map_err(|source| GuardError::Store {
                guard: "pr_mergeable",
                source,
            })?;
        debug!(task_id = %task_id, "pr not mergeable; released claim back to incoming");
        ctx.claimed_task = None;
        Ok(GuardVerdict::Halt(
            "PR not mergeable; claim released".to_string(),
        ))
    }
}

pub fn spawn_job_name(blueprint: &str) -> String {
    format!("spawn:{blueprint}")
}

/// The guard chain in spec order. Built fresh by the caller each tick so
/// tests can substitute a subset.
pub fn default_chain() -> Vec<Box<dyn Guard>> {
    vec![
        Box::new(EnabledGuard),
        Box::new(PoolCapacityGuard),
        Box::new(IntervalGuard),
        Box::new(BackpressureGuard),
        Box::new(PreCheckGuard),
        Box::new(ClaimTaskGuard),
        Box::new(TaskDescriptionGuard),
        Box::new(PrMergeableGuard),
    ]
}

#[derive(Debug)]
pub enum GuardChainOutcome {
    Proceed(Task),
    Halted {
        guard: &'static str,
        reason: String,
    },
}

pub async fn run_guard_chain(
    chain: &[Box<dyn Guard>],
    ctx: &mut GuardContext<'_>,
) -> Result<GuardChainOutcome, GuardError> {
    for guard in chain {
        match guard.check(ctx).await? {
            GuardVerdict::Proceed => continue,
            GuardVerdict::Halt(reason) => {
                return Ok(GuardChainOutcome::Halted {
                    guard: guard.name(),
                    reason,
                });
            }
        }
    }
    match ctx.claimed_task.take() {
        Some(task) => Ok(GuardChainOutcome::Proceed(task)),
        None => Ok(GuardChainOutcome::Halted {
            guard: "claim_task",
            reason: "guard chain completed without a claimed task".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
