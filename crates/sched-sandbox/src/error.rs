// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("filesystem operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sandbox for task {task_id} was not left in detached-HEAD state")]
    DetachedHeadInvariantViolated { task_id: String },

    #[error("no sandbox tracked for task {task_id}")]
    NotFound { task_id: String },

    #[error("push failed: {0}")]
    Push(String),

    #[error("background task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}
