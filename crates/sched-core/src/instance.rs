// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Agent instance: one running worker attributed to a blueprint.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Unique identifier for a live or recently-terminated agent instance.
    pub struct InstanceId;
}

/// A single worker process attributed to a blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentInstance {
    pub id: InstanceId,
    pub blueprint: String,
    pub pid: u32,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox_path: Option<PathBuf>,
}

impl AgentInstance {
    pub fn pool_file_name(&self) -> String {
        format!("{}-{}", self.blueprint, self.pid)
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
