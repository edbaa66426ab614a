// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Sandbox descriptor: the data shape, not the manager (see `sched-sandbox`).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A per-task isolated working directory, always detached-HEAD.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxHandle {
    pub task_id: String,
    pub path: PathBuf,
    /// Commit the worktree was created from (the base branch head at
    /// claim time).
    pub base_commit: String,
}

impl SandboxHandle {
    pub fn result_document_path(&self) -> PathBuf {
        self.path.join(".sched").join("result.json")
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.path.join(".sched").join("task.json")
    }

    pub fn prompt_path(&self) -> PathBuf {
        self.path.join(".sched").join("prompt.md")
    }

    pub fn env_path(&self) -> PathBuf {
        self.path.join(".sched").join("env")
    }
}

#[cfg(test)]
#[path = "sandbox_tests.rs"]
mod tests;
