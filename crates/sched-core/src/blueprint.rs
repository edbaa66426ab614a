// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Agent blueprint: configuration for a class of workers.

use crate::task::DEFAULT_MAX_REJECTIONS;
use serde::{Deserialize, Serialize};

/// How a blueprint's worker is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpawnMode {
    /// Ensure a sandbox, render the task prompt, invoke the worker there.
    TaskBound,
    /// No sandbox, no task — a read-only analyst-style invocation.
    Taskless,
    /// In-process or simple invocation; no working tree at all.
    Lightweight,
}

/// Configuration for a class of workers, loaded from a blueprint file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Blueprint {
    /// Filled in from the map key when loaded from a blueprint file; not a
    /// field of the YAML body itself.
    #[serde(default)]
    pub name: String,
    pub role: String,
    pub model: String,
    pub max_instances: u32,
    pub interval_seconds: u64,
    pub spawn_mode: SpawnMode,
    pub max_turns: u32,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub allowed_task_types: Vec<String>,
    /// State this blueprint claims from. Defaults to `incoming`; the
    /// gatekeeper blueprint overrides this to `provisional`.
    #[serde(default = "default_claim_from")]
    pub claim_from: String,
    /// Bound on `provisional -> incoming` rejection cycles before a task
    /// claimed by this blueprint is force-failed.
    #[serde(default = "default_max_rejections")]
    pub max_rejections: u32,
    /// Set to pause this blueprint entirely (guard `enabled` fails).
    #[serde(default)]
    pub paused: bool,
    /// Optional path to a user-supplied pre-check script (guard
    /// `pre_check`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_check_script: Option<String>,
}

fn default_claim_from() -> String {
    "incoming".to_string()
}

fn default_max_rejections() -> u32 {
    DEFAULT_MAX_REJECTIONS
}

impl Blueprint {
    /// Whether this blueprint's guard chain should run the `pr_mergeable`
    /// guard (review-type blueprints claim from `provisional`).
    pub fn reviews_provisional(&self) -> bool {
        self.claim_from == "provisional"
    }
}

#[cfg(test)]
#[path = "blueprint_tests.rs"]
mod tests;
