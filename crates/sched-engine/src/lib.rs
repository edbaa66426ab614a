// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Composes the other five crates into one scheduler tick (§4.6-§4.10):
//! the guard chain a blueprint must clear before spawning, the spawn
//! strategy that turns a claim into a running worker, the result handler
//! that routes a finished worker's verdict through its flow, and the
//! periodic jobs that run alongside both. `tick::run_tick` is the single
//! entry point `sched-tick`'s binary calls once per invocation.

pub mod condition_spawn;
pub mod error;
pub mod guard;
pub mod jobs;
pub mod result_handler;
pub mod spawn;
pub mod tick;

pub use condition_spawn::EngineConditionSpawner;
pub use error::{DispatchError, EngineError, GuardError, JobError, SpawnError};
pub use guard::{
    default_chain, run_guard_chain, Guard, GuardChainOutcome, GuardContext, GuardLimits, GuardVerdict,
};
pub use jobs::{run_due_jobs, JobContext};
pub use result_handler::{dispatch_result, ResultContext};
pub use spawn::{SpawnStrategy, WorkerLauncher};
pub use tick::{run_tick, BlueprintOutcome, TickContext, TickSummary};
