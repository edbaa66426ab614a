// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Turns a guard chain's `Proceed` into a running worker process (spec
//! §4.7). `TaskBound` is the common case: ensure a sandbox, render the
//! prompt into it, launch the worker there, and record its pid in the
//! pool. `Taskless` and `Lightweight` skip the sandbox but still go
//! through the same launch-then-record sequence.

use crate::error::SpawnError;
use async_trait::async_trait;
use sched_core::{Blueprint, SandboxHandle, SpawnMode, Task};
use sched_pool::PoolRegistry;
use sched_sandbox::{render_sandbox, SandboxManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Launches a blueprint's worker process. Implemented for real by
/// `sched-tick`'s binary (a `tokio::process::Command` wrapping the
/// configured model CLI); swapped for a fake in tests the same way
/// `Store`/`PrHost` are.
#[async_trait]
pub trait WorkerLauncher: Send + Sync {
    /// Returns the OS pid of the spawned process. `sandbox` is `None` for
    /// taskless/lightweight blueprints.
    async fn launch(
        &self,
        blueprint: &Blueprint,
        sandbox: Option<&SandboxHandle>,
        task: Option<&Task>,
    ) -> Result<u32, SpawnError>;
}

pub struct SpawnStrategy {
    repo_path: PathBuf,
    sandbox: Arc<SandboxManager>,
    pool: Arc<PoolRegistry>,
    launcher: Arc<dyn WorkerLauncher>,
}

impl SpawnStrategy {
    pub fn new(
        repo_path: impl Into<PathBuf>,
        sandbox: Arc<SandboxManager>,
        pool: Arc<PoolRegistry>,
        launcher: Arc<dyn WorkerLauncher>,
    ) -> Self {
        Self {
            repo_path: repo_path.into(),
            sandbox,
            pool,
            launcher,
        }
    }

    pub async fn spawn(
        &self,
        blueprint: &Blueprint,
        task: Option<&Task>,
        now_ms: u64,
    ) -> Result<u32, SpawnError> {
        match blueprint.spawn_mode {
            SpawnMode::TaskBound => {
                let task = task.ok_or(SpawnError::MissingTask)?;
                self.spawn_task_bound(blueprint, task, now_ms).await
            }
            SpawnMode::Taskless | SpawnMode::Lightweight => {
                self.spawn_without_sandbox(blueprint, now_ms).await
            }
        }
    }

    async fn spawn_task_bound(
        &self,
        blueprint: &Blueprint,
        task: &Task,
        now_ms: u64,
    ) -> Result<u32, SpawnError> {
        let rendered = render_sandbox(task, &task.body, None, &[], "/usr/bin/env bash");
        let handle = self
            .sandbox
            .ensure_sandbox(&self.repo_path, task.id.as_str(), &rendered)
            .await?;
        let pid = self.launcher.launch(blueprint, Some(&handle), Some(task)).await?;
        self.pool
            .record_spawn(&blueprint.name, pid, now_ms, Some(task.id.as_str().to_string()))?;
        info!(blueprint = %blueprint.name, pid, task_id = %task.id, "spawned task-bound worker");
        Ok(pid)
    }

    async fn spawn_without_sandbox(&self, blueprint: &Blueprint, now_ms: u64) -> Result<u32, SpawnError> {
        let pid = self.launcher.launch(blueprint, None, None).await?;
        self.pool.record_spawn(&blueprint.name, pid, now_ms, None)?;
        info!(blueprint = %blueprint.name, pid, spawn_mode = ?blueprint.spawn_mode, "spawned worker");
        Ok(pid)
    }
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
