// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Task identifier and record.
//!
//! A task is the unit of work the remote store owns. The scheduler never
//! holds the authoritative copy — every `Task` value in this crate is a
//! snapshot fetched from (or about to be sent to) the store adapter.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Unique identifier for a task.
    pub struct TaskId;
}

/// Sentinel stored in `blocked_by` to indicate a task is paused rather than
/// waiting on a specific other task.
pub const BLOCKED_BY_PAUSED: &str = "paused";

/// Default bound on `provisional -> incoming` rejection cycles before a task
/// is force-failed rather than allowed to spin forever (see design notes on
/// cyclic flow graphs).
pub const DEFAULT_MAX_REJECTIONS: u32 = 5;

/// Core lifecycle states every flow must route through. Flows may declare
/// additional project-defined states, so this is intentionally not the full
/// set of legal `Task::state` values — it is the set the engine itself
/// reasons about directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreState {
    Incoming,
    Claimed,
    Provisional,
    Done,
    Failed,
    /// Non-core state name declared by a flow (e.g. `needs_continuation`,
    /// a project's `children_complete`). Carried verbatim.
    Custom(String),
}

impl CoreState {
    pub fn as_str(&self) -> &str {
        match self {
            CoreState::Incoming => "incoming",
            CoreState::Claimed => "claimed",
            CoreState::Provisional => "provisional",
            CoreState::Done => "done",
            CoreState::Failed => "failed",
            CoreState::Custom(s) => s,
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "incoming" => CoreState::Incoming,
            "claimed" => CoreState::Claimed,
            "provisional" => CoreState::Provisional,
            "done" => CoreState::Done,
            "failed" => CoreState::Failed,
            other => CoreState::Custom(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CoreState::Done | CoreState::Failed)
    }
}

impl fmt::Display for CoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A unit of work tracked by the remote store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Current state, as reported by the store. May be a core state or a
    /// project-defined state declared by `flow`.
    pub state: String,
    pub title: String,
    /// Prompt body handed to the worker.
    pub body: String,
    /// Role tag (e.g. `implement`, `gatekeeper`) matched against a
    /// blueprint's `role` and a flow transition's `agent`.
    pub role: String,
    pub priority: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Optimistic-lock version; every `update` call must echo the version
    /// it read or the store returns `conflict`.
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    /// Id of a blocking task, or [`BLOCKED_BY_PAUSED`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    pub flow: String,
    /// Short failure summary, always present once `state == "failed"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Captured traceback / step-failure detail for human review.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_notes: Option<String>,
    /// Count of `provisional -> incoming` rejection cycles this task has
    /// gone through. Checked against the blueprint's `max_rejections`.
    #[serde(default)]
    pub rejection_count: u32,
}

impl Task {
    pub fn core_state(&self) -> CoreState {
        CoreState::from_str(&self.state)
    }

    pub fn is_claimed(&self) -> bool {
        self.state == "claimed"
    }

    /// Invariant (b): a task in `claimed` has a non-null `claimed_by` and
    /// `lease_expires_at`.
    pub fn claim_invariant_holds(&self) -> bool {
        if self.state != "claimed" {
            return true;
        }
        self.claimed_by.is_some() && self.lease_expires_at.is_some()
    }

    /// Invariant (c): `provisional` implies either a recorded `pr_number`
    /// or a project marker (`project_id` set).
    pub fn provisional_invariant_holds(&self) -> bool {
        if self.state != "provisional" {
            return true;
        }
        self.pr_number.is_some() || self.project_id.is_some()
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_by.is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.blocked_by.as_deref() == Some(BLOCKED_BY_PAUSED)
    }

    pub fn body_is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
