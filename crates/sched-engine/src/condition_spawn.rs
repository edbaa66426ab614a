// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Implements [`sched_flow::AgentConditionSpawner`] on top of the same
//! sandbox-as-result-channel mechanism a normal task-bound worker uses.
//! An `agent`-kind condition gets its own sandbox, named
//! `<task_id>__condition__<blueprint>` so it never collides with the
//! task's own worktree; the result document it writes is the verdict.
//! Because the sandbox and its `result.json` live on disk, this survives
//! across tick-sized process lifetimes without any extra bookkeeping.

use crate::spawn::WorkerLauncher;
use sched_core::{Blueprint, Decision, ResultDocument};
use sched_flow::{AgentConditionSpawner, ConditionError};
use sched_pool::PoolRegistry;
use sched_sandbox::{render_sandbox, SandboxManager};
use sched_store::Store;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

fn condition_sandbox_id(task_id: &str, blueprint: &str) -> String {
    format!("{task_id}__condition__{blueprint}")
}

pub struct EngineConditionSpawner {
    repo_path: PathBuf,
    sandbox: Arc<SandboxManager>,
    pool: Arc<PoolRegistry>,
    store: Arc<dyn Store>,
    launcher: Arc<dyn WorkerLauncher>,
    blueprints: Arc<HashMap<String, Blueprint>>,
    now_ms: u64,
}

impl EngineConditionSpawner {
    pub fn new(
        repo_path: impl Into<PathBuf>,
        sandbox: Arc<SandboxManager>,
        pool: Arc<PoolRegistry>,
        store: Arc<dyn Store>,
        launcher: Arc<dyn WorkerLauncher>,
        blueprints: Arc<HashMap<String, Blueprint>>,
        now_ms: u64,
    ) -> Self {
        Self {
            repo_path: repo_path.into(),
            sandbox,
            pool,
            store,
            launcher,
            blueprints,
            now_ms,
        }
    }
}

#[async_trait::async_trait]
impl AgentConditionSpawner for EngineConditionSpawner {
    async fn evaluate(&self, task_id: &str, blueprint: &str) -> Result<Option<bool>, ConditionError> {
        let condition_id = condition_sandbox_id(task_id, blueprint);

        if let Some(handle) = self.sandbox.get(&condition_id).await {
            let result_path = handle.result_document_path();
            if !result_path.exists() {
                return Ok(None);
            }
            let contents = tokio::fs::read_to_string(&result_path)
                .await
                .map_err(ConditionError::Io)?;
            let doc: ResultDocument = serde_json::from_str(&contents)
                .map_err(|e| ConditionError::Script(format!("malformed condition result document: {e}")))?;
            self.sandbox
                .destroy_sandbox(&condition_id, false)
                .await
                .map_err(|e| ConditionError::Script(e.to_string()))?;
            let approved = matches!(doc.decision, Some(Decision::Approve));
            info!(task_id, blueprint, approved, "agent condition resolved");
            return Ok(Some(approved));
        }

        let bp = self
            .blueprints
            .get(blueprint)
            .ok_or_else(|| ConditionError::Script(format!("unknown blueprint '{blueprint}' for agent condition")))?;
        let task = self
            .store
            .get(task_id)
            .await
            .map_err(|e| ConditionError::Script(e.to_string()))?;

        let rendered = render_sandbox(&task, &task.body, None, &[], "/usr/bin/env bash");
        let handle = self
            .sandbox
            .ensure_sandbox(&self.repo_path, &condition_id, &rendered)
            .await
            .map_err(|e| ConditionError::Script(e.to_string()))?;
        let pid = self
            .launcher
            .launch(bp, Some(&handle), Some(&task))
            .await
            .map_err(|e| ConditionError::Script(e.to_string()))?;
        self.pool
            .record_spawn(blueprint, pid, self.now_ms, Some(condition_id))
            .map_err(|e| ConditionError::Script(e.to_string()))?;
        info!(task_id, blueprint, pid, "spawned agent condition worker");
        Ok(None)
    }
}

#[cfg(test)]
#[path = "condition_spawn_tests.rs"]
mod tests;
