// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("failed to parse flow YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("flow '{flow}' references unknown state '{state}' (not a transition endpoint or the initial state)")]
    UnknownState { flow: String, state: String },

    #[error("flow '{flow}' transition '{transition}' on_fail target '{target}' is not a known state")]
    UnknownFailTarget {
        flow: String,
        transition: String,
        target: String,
    },

    #[error("flow '{flow}' transition '{transition}' references unconfigured blueprint '{agent}'")]
    UnknownAgent {
        flow: String,
        transition: String,
        agent: String,
    },

    #[error("flow '{flow}' transition '{transition}' references unregistered step '{step}'")]
    UnknownStep {
        flow: String,
        transition: String,
        step: String,
    },

    #[error("flow '{flow}' transition '{transition}' condition '{condition}' has unknown type '{kind}'; must be script, agent, or manual")]
    UnknownConditionType {
        flow: String,
        transition: String,
        condition: String,
        kind: String,
    },

    #[error("flow '{flow}' transition '{transition}' is unreachable from the initial state '{initial}'")]
    UnreachableTransition {
        flow: String,
        transition: String,
        initial: String,
    },

    #[error("flow '{flow}' has no transitions")]
    Empty { flow: String },
}

#[derive(Debug, Error)]
pub enum ConditionError {
    #[error("script condition failed to run: {0}")]
    Script(String),

    #[error("condition is pending an external decision")]
    Pending,

    #[error("io error evaluating condition: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum StepError {
    #[error("step '{step}' failed: {source}")]
    Store {
        step: String,
        #[source]
        source: sched_core::StoreError,
    },

    #[error("step '{step}' failed: {source}")]
    Sandbox {
        step: String,
        #[source]
        source: sched_sandbox::SandboxError,
    },

    #[error("step '{step}' subprocess failed: {message}")]
    Subprocess { step: String, message: String },

    #[error("step '{step}' forge call failed: {message}")]
    Forge { step: String, message: String },

    #[error("step '{step}' is not registered")]
    Unregistered { step: String },

    #[error("step '{step}' io error: {source}")]
    Io {
        step: String,
        #[source]
        source: std::io::Error,
    },
}
