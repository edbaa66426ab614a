// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Real [`sched_engine::WorkerLauncher`]: spawns the configured model CLI
//! as a detached subprocess against the sandbox's prompt file.

use async_trait::async_trait;
use sched_core::{Blueprint, SandboxHandle, Task};
use sched_engine::error::SpawnError;
use sched_engine::WorkerLauncher;
use tokio::process::Command;
use tracing::info;

/// Launches `<worker_command> --role <role> --model <model> [--prompt <path>]`,
/// letting the process run detached from this tick's own lifetime — the
/// tick never waits on the worker, it only records the pid.
pub struct ProcessLauncher {
    worker_command: String,
}

impl ProcessLauncher {
    pub fn new(worker_command: impl Into<String>) -> Self {
        Self {
            worker_command: worker_command.into(),
        }
    }
}

#[async_trait]
impl WorkerLauncher for ProcessLauncher {
    async fn launch(
        &self,
        blueprint: &Blueprint,
        sandbox: Option<&SandboxHandle>,
        task: Option<&Task>,
    ) -> Result<u32, SpawnError> {
        let mut command = Command::new(&self.worker_command);
        command
            .arg("--role")
            .arg(&blueprint.role)
            .arg("--model")
            .arg(&blueprint.model)
            .arg("--max-turns")
            .arg(blueprint.max_turns.to_string());

        if let Some(handle) = sandbox {
            command
                .current_dir(&handle.path)
                .arg("--prompt")
                .arg(handle.prompt_path())
                .arg("--env-file")
                .arg(handle.env_path());
        }
        if let Some(task) = task {
            command.arg("--task-id").arg(task.id.as_str());
        }

        command
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());

        let child = command
            .spawn()
            .map_err(|e| SpawnError::Launch(format!("{}: {e}", self.worker_command)))?;
        let pid = child
            .id()
            .ok_or_else(|| SpawnError::Launch("spawned worker has no pid".to_string()))?;
        info!(blueprint = %blueprint.name, pid, "worker launched");

        // Dropping `child` here does not kill it (kill_on_drop is unset);
        // tokio's runtime reaps it via the orphan queue once it exits, so
        // this tick never blocks waiting on a worker that may run for
        // hours.
        drop(child);
        Ok(pid)
    }
}
