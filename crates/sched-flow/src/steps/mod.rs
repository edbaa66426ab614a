// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Named, side-effectful steps executed in declared order by a
//! transition's `runs` list. Steps are registered by name at process
//! start; an unregistered name is a load-time validation failure, never
//! a runtime branch.

mod builtin;
pub mod forge;

pub use forge::{FakePrHost, ForgeCall, HttpPrHost, PrHost};

use crate::error::StepError;
use async_trait::async_trait;
use sched_core::{ResultDocument, Task};
use sched_sandbox::SandboxManager;
use sched_store::{PrInfo, Store};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Side channel for values one step produces that a later step in the
/// same `runs` list (or the dispatcher afterward) needs — e.g. `create_pr`
/// records the PR it opened so `submit_to_server` can attach it.
#[derive(Default)]
pub struct StepOutputs {
    pr_info: Mutex<Option<PrInfo>>,
    branch_name: Mutex<Option<String>>,
}

impl StepOutputs {
    pub fn set_pr_info(&self, info: PrInfo) {
        *self.pr_info.lock().expect("poisoned") = Some(info);
    }

    pub fn pr_info(&self) -> Option<PrInfo> {
        self.pr_info.lock().expect("poisoned").clone()
    }

    pub fn set_branch_name(&self, name: String) {
        *self.branch_name.lock().expect("poisoned") = Some(name);
    }

    pub fn branch_name(&self) -> Option<String> {
        self.branch_name.lock().expect("poisoned").clone()
    }
}

pub struct StepContext<'a> {
    pub task: &'a Task,
    pub result: &'a ResultDocument,
    pub sandbox_path: &'a Path,
    pub store: &'a dyn Store,
    pub pr_host: &'a dyn PrHost,
    pub sandbox: &'a SandboxManager,
    pub outputs: &'a StepOutputs,
}

#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError>;
}

/// All registered step names, built at process start. Unregistered names
/// fail flow validation (`sched-flow::validate`) rather than failing at
/// dispatch time.
pub struct StepRegistry {
    steps: HashMap<&'static str, Arc<dyn Step>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            steps: HashMap::new(),
        };
        for step in builtin::all() {
            registry.register(step);
        }
        registry
    }

    pub fn register(&mut self, step: Arc<dyn Step>) {
        self.steps.insert(step.name(), step);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.contains_key(name)
    }

    pub fn known_names(&self) -> std::collections::HashSet<&str> {
        self.steps.keys().copied().collect()
    }

    /// Runs `names` in order against `ctx`, stopping at the first error:
    /// execution stops and the error propagates to the flow dispatcher,
    /// which routes the failure.
    pub async fn execute(&self, names: &[String], ctx: &StepContext<'_>) -> Result<(), StepError> {
        for name in names {
            let step = self
                .steps
                .get(name.as_str())
                .ok_or_else(|| StepError::Unregistered { step: name.clone() })?;
            step.run(ctx).await?;
        }
        Ok(())
    }
}

impl Default for StepRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
