// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Parses flow and blueprint YAML files into the immutable `sched-core`
//! types, then hands them to [`crate::validate`] before a caller ever sees
//! them: a flow that fails to validate fails the tick loudly.

use crate::error::FlowError;
use sched_core::{Blueprint, Condition, ConditionKind, Flow, Transition};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawFlow {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    initial_state: Option<String>,
    #[serde(default)]
    terminal_states: Option<Vec<String>>,
    #[serde(default)]
    child_flow: Option<Box<RawFlow>>,
    #[serde(default)]
    transitions: BTreeMap<String, RawTransition>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct RawTransition {
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    runs: Vec<String>,
    #[serde(default)]
    conditions: Vec<RawCondition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCondition {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    script: Option<String>,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    on_fail: Option<String>,
}

/// Parses a flow definition file's contents into a [`Flow`]. Does **not**
/// validate; call [`crate::validate::validate_flow`] before use.
pub fn parse_flow(yaml: &str) -> Result<Flow, FlowError> {
    let raw: RawFlow = serde_yaml::from_str(yaml)?;
    convert_flow(raw)
}

fn convert_flow(raw: RawFlow) -> Result<Flow, FlowError> {
    let mut transitions = Vec::with_capacity(raw.transitions.len());
    for (key, raw_transition) in raw.transitions {
        let (from, to) = split_transition_key(&raw.name, &key)?;
        let conditions = raw_transition
            .conditions
            .into_iter()
            .map(|c| convert_condition(&raw.name, &key, c))
            .collect::<Result<Vec<_>, _>>()?;
        transitions.push(Transition {
            from,
            to,
            agent: raw_transition.agent,
            conditions,
            runs: raw_transition.runs,
        });
    }

    let initial_state = raw.initial_state.unwrap_or_else(|| {
        transitions
            .first()
            .map(|t| t.from.clone())
            .unwrap_or_else(|| "incoming".to_string())
    });
    let terminal_states = raw
        .terminal_states
        .unwrap_or_else(|| vec!["done".to_string(), "failed".to_string()]);

    let child_flow = match raw.child_flow {
        Some(child) => Some(Box::new(convert_flow(*child)?)),
        None => None,
    };

    Ok(Flow {
        name: raw.name,
        description: raw.description,
        initial_state,
        terminal_states,
        transitions,
        child_flow,
    })
}

fn split_transition_key(flow_name: &str, key: &str) -> Result<(String, String), FlowError> {
    let mut parts = key.splitn(2, "->").map(str::trim);
    match (parts.next(), parts.next()) {
        (Some(from), Some(to)) if !from.is_empty() && !to.is_empty() => {
            Ok((from.to_string(), to.to_string()))
        }
        _ => Err(FlowError::UnknownState {
            flow: flow_name.to_string(),
            state: key.to_string(),
        }),
    }
}

fn convert_condition(
    flow_name: &str,
    transition_key: &str,
    raw: RawCondition,
) -> Result<Condition, FlowError> {
    let kind = match raw.kind.as_str() {
        "script" => ConditionKind::Script,
        "agent" => ConditionKind::Agent,
        "manual" => ConditionKind::Manual,
        other => {
            return Err(FlowError::UnknownConditionType {
                flow: flow_name.to_string(),
                transition: transition_key.to_string(),
                condition: raw.name,
                kind: other.to_string(),
            })
        }
    };
    Ok(Condition {
        name: raw.name,
        kind,
        script: raw.script,
        agent: raw.agent,
        on_fail: raw.on_fail,
    })
}

/// Parses a blueprint definition file (a YAML mapping of name to blueprint
/// body) into named [`Blueprint`] values, keyed by their map key.
pub fn parse_blueprints(yaml: &str) -> Result<BTreeMap<String, Blueprint>, FlowError> {
    let mut blueprints: BTreeMap<String, Blueprint> = serde_yaml::from_str(yaml)?;
    for (name, blueprint) in blueprints.iter_mut() {
        blueprint.name = name.clone();
    }
    Ok(blueprints)
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
