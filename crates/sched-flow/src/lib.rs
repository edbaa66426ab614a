// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Flow/blueprint loading and validation (§4.4), condition evaluation
//! (§4.5), and the step registry & executor (§4.3) — everything needed to
//! take a claimed task from one state to the next once its transition's
//! conditions have passed.

pub mod condition;
pub mod error;
pub mod loader;
pub mod steps;
pub mod validate;

pub use condition::{evaluate_conditions, AgentConditionSpawner, ConditionVerdict};
pub use error::{ConditionError, FlowError, StepError};
pub use loader::{parse_blueprints, parse_flow};
pub use steps::{FakePrHost, PrHost, Step, StepContext, StepOutputs, StepRegistry};
pub use validate::validate_flow;
