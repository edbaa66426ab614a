// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use thiserror::Error;

/// A guard in the chain failed to even evaluate (its own halt/proceed
/// verdict is not an error — this is for the guard's plumbing breaking).
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("guard '{guard}' store call failed: {source}")]
    Store {
        guard: &'static str,
        #[source]
        source: sched_core::StoreError,
    },

    #[error("guard '{guard}' forge call failed: {message}")]
    Forge { guard: &'static str, message: String },

    #[error("guard '{guard}' io error: {source}")]
    Io {
        guard: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("pre-check script '{script}' timed out")]
    PreCheckTimedOut { script: String },

    #[error("pool error: {0}")]
    Pool(#[from] sched_pool::PoolError),
}

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("sandbox error: {0}")]
    Sandbox(#[from] sched_sandbox::SandboxError),

    #[error("store error: {0}")]
    Store(#[from] sched_core::StoreError),

    #[error("pool error: {0}")]
    Pool(#[from] sched_pool::PoolError),

    #[error("failed to launch worker process: {0}")]
    Launch(String),

    #[error("task-bound spawn requires a claimed task")]
    MissingTask,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("step execution failed: {0}")]
    Step(#[from] sched_flow::StepError),

    #[error("store error: {0}")]
    Store(#[from] sched_core::StoreError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] sched_sandbox::SandboxError),

    #[error("condition evaluation failed: {0}")]
    Condition(#[from] sched_flow::ConditionError),
}

#[derive(Debug, Error)]
pub enum JobError {
    #[error("store error: {0}")]
    Store(#[from] sched_core::StoreError),

    #[error("pool error: {0}")]
    Pool(#[from] sched_pool::PoolError),

    #[error("sandbox error: {0}")]
    Sandbox(#[from] sched_sandbox::SandboxError),

    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("unknown blueprint '{0}' referenced by a pool entry")]
    UnknownBlueprint(String),

    #[error("unknown flow '{0}' referenced by task '{1}'")]
    UnknownFlow(String, String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Guard(#[from] GuardError),
    #[error(transparent)]
    Spawn(#[from] SpawnError),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error(transparent)]
    Job(#[from] JobError),
}
