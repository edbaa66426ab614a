// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Evaluates a transition's conditions in declared order: cheap
//! deterministic `script` checks first, so an expensive `agent` or
//! `manual` check never fires once a cheaper one has already rejected.

use crate::error::ConditionError;
use sched_core::{Condition, ConditionKind};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

const SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of evaluating one condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionVerdict {
    Pass,
    /// Failed; route to this state (falls back to the evaluator's default
    /// when the condition declared no `on_fail`).
    Fail { route_to: String },
    /// An `agent` condition whose worker has not yet reported back, or a
    /// `manual` condition awaiting an external flag.
    Pending,
}

/// Spawns an `agent`-kind condition's worker. Implemented by `sched-engine`
/// (which owns the spawn strategy); `sched-flow` only needs the narrow
/// capability of "has this agent condition already been decided, and if
/// so, with what verdict".
#[async_trait::async_trait]
pub trait AgentConditionSpawner: Send + Sync {
    /// Returns `Some(true)` for approve, `Some(false)` for reject, `None`
    /// if the worker hasn't reported back yet (spawning it if needed).
    async fn evaluate(&self, task_id: &str, blueprint: &str) -> Result<Option<bool>, ConditionError>;
}

/// Evaluates `conditions` against `sandbox_path` in order, stopping at the
/// first non-pass. `default_fail_state` is used when a failing condition
/// did not declare its own `on_fail`.
pub async fn evaluate_conditions(
    conditions: &[Condition],
    sandbox_path: &Path,
    default_fail_state: &str,
    agent_spawner: &dyn AgentConditionSpawner,
    task_id: &str,
) -> Result<ConditionVerdict, ConditionError> {
    for condition in conditions {
        let verdict = evaluate_one(condition, sandbox_path, default_fail_state, agent_spawner, task_id).await?;
        if verdict != ConditionVerdict::Pass {
            return Ok(verdict);
        }
    }
    Ok(ConditionVerdict::Pass)
}

async fn evaluate_one(
    condition: &Condition,
    sandbox_path: &Path,
    default_fail_state: &str,
    agent_spawner: &dyn AgentConditionSpawner,
    task_id: &str,
) -> Result<ConditionVerdict, ConditionError> {
    let fail_route = || ConditionVerdict::Fail {
        route_to: condition
            .on_fail
            .clone()
            .unwrap_or_else(|| default_fail_state.to_string()),
    };

    match condition.kind {
        ConditionKind::Script => {
            let script = condition
                .script
                .as_deref()
                .ok_or_else(|| ConditionError::Script("condition has no script path".to_string()))?;
            let passed = run_script(script, sandbox_path).await?;
            Ok(if passed { ConditionVerdict::Pass } else { fail_route() })
        }
        ConditionKind::Agent => {
            let blueprint = condition
                .agent
                .as_deref()
                .ok_or_else(|| ConditionError::Script("agent condition has no blueprint".to_string()))?;
            match agent_spawner.evaluate(task_id, blueprint).await? {
                Some(true) => Ok(ConditionVerdict::Pass),
                Some(false) => Ok(fail_route()),
                None => Ok(ConditionVerdict::Pending),
            }
        }
        ConditionKind::Manual => Ok(ConditionVerdict::Pending),
    }
}

async fn run_script(script: &str, sandbox_path: &Path) -> Result<bool, ConditionError> {
    let output = tokio::time::timeout(
        SCRIPT_TIMEOUT,
        Command::new(script).current_dir(sandbox_path).output(),
    )
    .await
    .map_err(|_| ConditionError::Script(format!("{script} timed out after {SCRIPT_TIMEOUT:?}")))?
    .map_err(ConditionError::Io)?;
    Ok(output.status.success())
}

#[cfg(test)]
#[path = "condition_tests.rs"]
mod tests;
