// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Scheduler-state file: per-job `last_run` timestamps and the cached
//! poll summary, persisted between ticks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Batched read from the store, cached for the lifetime of one tick so
/// every guard/job that would otherwise issue an independent read shares
/// this single snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PollSummary {
    /// Per-blueprint-role queue depth, keyed by role tag.
    #[serde(default)]
    pub queue_counts: HashMap<String, QueueCounts>,
    /// Tasks currently in `provisional`, summarized for
    /// `process_provisional_tasks` / `check_project_completion`.
    #[serde(default)]
    pub provisional_tasks: Vec<String>,
    #[serde(default)]
    pub registered: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueCounts {
    #[serde(default)]
    pub incoming: u32,
    #[serde(default)]
    pub claimed: u32,
    #[serde(default)]
    pub provisional: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRunRecord {
    /// Epoch milliseconds of the last successful run.
    pub last_run_ms: u64,
}

/// The JSON document tracking per-job last-run timestamps and the cached
/// poll summary. Rewritten atomically (write-to-temp + rename) each tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerState {
    #[serde(default)]
    pub jobs: HashMap<String, JobRunRecord>,
    #[serde(default)]
    pub poll_cache: Option<PollSummary>,
}

impl SchedulerState {
    pub fn last_run_ms(&self, job: &str) -> Option<u64> {
        self.jobs.get(job).map(|r| r.last_run_ms)
    }

    pub fn record_run(&mut self, job: &str, now_ms: u64) {
        self.jobs
            .entry(job.to_string())
            .or_default()
            .last_run_ms = now_ms;
    }

    pub fn is_due(&self, job: &str, interval_seconds: u64, now_ms: u64) -> bool {
        match self.last_run_ms(job) {
            None => true,
            Some(last) => now_ms.saturating_sub(last) >= interval_seconds * 1000,
        }
    }
}

#[cfg(test)]
#[path = "scheduler_state_tests.rs"]
mod tests;
