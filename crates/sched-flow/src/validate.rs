// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Flow validation rules. Run once at load time; a failing flow must
//! never reach the scheduler loop.

use crate::error::FlowError;
use sched_core::Flow;
use std::collections::{HashSet, VecDeque};

/// Validates `flow` against the set of configured blueprint names and the
/// set of registered step names. Recurses into `child_flow` when present.
pub fn validate_flow(
    flow: &Flow,
    known_blueprints: &HashSet<&str>,
    known_steps: &HashSet<&str>,
) -> Result<(), FlowError> {
    if flow.transitions.is_empty() {
        return Err(FlowError::Empty {
            flow: flow.name.clone(),
        });
    }

    let known_states = flow.all_states();

    for t in &flow.transitions {
        if !known_states.contains_key(t.from.as_str()) && t.from != flow.initial_state {
            return Err(FlowError::UnknownState {
                flow: flow.name.clone(),
                state: t.from.clone(),
            });
        }
        if !known_states.contains_key(t.to.as_str()) {
            return Err(FlowError::UnknownState {
                flow: flow.name.clone(),
                state: t.to.clone(),
            });
        }
        if let Some(agent) = &t.agent {
            if !known_blueprints.contains(agent.as_str()) {
                return Err(FlowError::UnknownAgent {
                    flow: flow.name.clone(),
                    transition: format!("{} -> {}", t.from, t.to),
                    agent: agent.clone(),
                });
            }
        }
        for step in &t.runs {
            if !known_steps.contains(step.as_str()) {
                return Err(FlowError::UnknownStep {
                    flow: flow.name.clone(),
                    transition: format!("{} -> {}", t.from, t.to),
                    step: step.clone(),
                });
            }
        }
        for condition in &t.conditions {
            if let Some(agent) = &condition.agent {
                if !known_blueprints.contains(agent.as_str()) {
                    return Err(FlowError::UnknownAgent {
                        flow: flow.name.clone(),
                        transition: format!("{} -> {}", t.from, t.to),
                        agent: agent.clone(),
                    });
                }
            }
            if let Some(on_fail) = &condition.on_fail {
                if !known_states.contains_key(on_fail.as_str()) && on_fail != &flow.initial_state {
                    return Err(FlowError::UnknownFailTarget {
                        flow: flow.name.clone(),
                        transition: format!("{} -> {}", t.from, t.to),
                        target: on_fail.clone(),
                    });
                }
            }
        }
    }

    check_reachability(flow)?;

    if let Some(child) = &flow.child_flow {
        validate_flow(child, known_blueprints, known_steps)?;
    }

    Ok(())
}

/// BFS over the transition graph from `initial_state`; every transition's
/// `from` state must be reachable, or it can never fire.
fn check_reachability(flow: &Flow) -> Result<(), FlowError> {
    let mut reachable: HashSet<&str> = HashSet::new();
    reachable.insert(flow.initial_state.as_str());
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(flow.initial_state.as_str());

    while let Some(state) = queue.pop_front() {
        for t in flow.transitions_from(state) {
            if reachable.insert(t.to.as_str()) {
                queue.push_back(t.to.as_str());
            }
        }
    }

    for t in &flow.transitions {
        if !reachable.contains(t.from.as_str()) {
            return Err(FlowError::UnreachableTransition {
                flow: flow.name.clone(),
                transition: format!("{} -> {}", t.from, t.to),
                initial: flow.initial_state.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
