// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! The result document: the sole channel by which a worker communicates
//! its outcome to the scheduler.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Done,
    Failed,
    NeedsContinuation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// JSON written by the worker to a fixed path inside the sandbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultDocument {
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ResultDocument {
    /// Infer a result when the worker produced no document at all (crash
    /// with no protocol violation to report, per §4.8 / §7).
    pub fn infer(has_commits: bool) -> Self {
        Self {
            outcome: if has_commits {
                Outcome::NeedsContinuation
            } else {
                Outcome::Failed
            },
            decision: None,
            comment: None,
            reason: Some(if has_commits {
                "inferred: commits present, no result document".to_string()
            } else {
                "inferred: no commits, no result document".to_string()
            }),
        }
    }
}

#[cfg(test)]
#[path = "result_doc_tests.rs"]
mod tests;
