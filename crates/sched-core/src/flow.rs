// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Flow data model: the in-memory shape of a parsed, validated flow.
//!
//! Parsing and validation live in `sched-flow`; this module only defines
//! the types so `sched-core` consumers (engine, store) don't need to
//! depend on the YAML parser.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A gate kind on a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Script,
    Agent,
    Manual,
}

/// A single gate on a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ConditionKind,
    /// `script` conditions: path to the script to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    /// `agent` conditions: blueprint name to spawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// State to route to if this condition fails. Falls back to the
    /// evaluator's configured default (typically `incoming`) when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_fail: Option<String>,
}

/// An edge in the flow graph: `from_state -> to_state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    /// Blueprint name whose worker advances this transition, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// Gates evaluated in order before `runs` may execute.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Step names executed, in order, before the state change is
    /// committed. Must all resolve in the step registry (validated at
    /// load, see `sched-flow::validate`).
    #[serde(default)]
    pub runs: Vec<String>,
}

impl Transition {
    pub fn key(&self) -> (String, String) {
        (self.from.clone(), self.to.clone())
    }
}

/// A named, YAML-declared state machine over a task's lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flow {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub initial_state: String,
    /// States that end the task's lifecycle under this flow. Used by the
    /// reachability validator and by `Task::core_state` consumers.
    #[serde(default)]
    pub terminal_states: Vec<String>,
    pub transitions: Vec<Transition>,
    /// Flow used for project children, when this flow belongs to a
    /// project task. Keyed separately so a project's own top-level
    /// transitions (for the project task itself) stay distinct from its
    /// children's flow (see design notes on pointer graphs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_flow: Option<Box<Flow>>,
}

impl Flow {
    /// Find the transition leaving `from` for state `to`, if declared.
    pub fn transition(&self, from: &str, to: &str) -> Option<&Transition> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.to == to)
    }

    /// Find the (assumed unique) transition agents use to advance out of
    /// `from` toward the given `to`. Multiple transitions may leave a
    /// state (e.g. approve vs reject); callers disambiguate by `to`.
    pub fn transitions_from(&self, from: &str) -> Vec<&Transition> {
        self.transitions.iter().filter(|t| t.from == from).collect()
    }

    /// All state names mentioned anywhere in the flow (as `from`, `to`, or
    /// the initial state), for the reachability validator.
    pub fn all_states(&self) -> BTreeMap<String, ()> {
        let mut states = BTreeMap::new();
        states.insert(self.initial_state.clone(), ());
        for t in &self.transitions {
            states.insert(t.from.clone(), ());
            states.insert(t.to.clone(), ());
            for c in &t.conditions {
                if let Some(on_fail) = &c.on_fail {
                    states.insert(on_fail.clone(), ());
                }
            }
        }
        states
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.terminal_states.iter().any(|s| s == state) || state == "done" || state == "failed"
    }
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
