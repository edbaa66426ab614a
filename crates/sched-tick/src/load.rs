// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Loads blueprint and flow YAML files from the runtime directory and
//! validates every flow before the tick runs. A failing flow must never
//! reach the scheduler loop — this is the load-time configuration-failure
//! path that maps to a nonzero exit code.

use sched_core::{Blueprint, Flow};
use sched_flow::{validate_flow, FlowError};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read '{path}': {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: FlowError,
    },

    #[error("flow validation failed: {0}")]
    Validation(#[from] FlowError),
}

fn yaml_files(dir: &Path) -> Result<Vec<std::path::PathBuf>, LoadError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })? {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("yaml") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads every `*.yaml` file under `blueprints_dir`, merging each file's
/// mapping of blueprint name to definition into one table.
pub fn load_blueprints(blueprints_dir: &Path) -> Result<HashMap<String, Blueprint>, LoadError> {
    let mut all = HashMap::new();
    for path in yaml_files(blueprints_dir)? {
        let contents = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let parsed = sched_flow::parse_blueprints(&contents).map_err(|source| LoadError::Parse {
            path: path.clone(),
            source,
        })?;
        all.extend(parsed);
    }
    Ok(all)
}

/// Loads every `*.yaml` file under `flows_dir`, one flow per file, keyed
/// by the flow's own `name` field.
pub fn load_flows(flows_dir: &Path) -> Result<HashMap<String, Flow>, LoadError> {
    let mut all = HashMap::new();
    for path in yaml_files(flows_dir)? {
        let contents = std::fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let flow = sched_flow::parse_flow(&contents).map_err(|source| LoadError::Parse {
            path: path.clone(),
            source,
        })?;
        all.insert(flow.name.clone(), flow);
    }
    Ok(all)
}

/// Validates every flow against the configured blueprints and the
/// registered step names. Any single failure is unrecoverable: the
/// caller maps it to the configuration-failure exit code.
pub fn validate_all(
    flows: &HashMap<String, Flow>,
    blueprints: &HashMap<String, Blueprint>,
    steps: &sched_flow::StepRegistry,
) -> Result<(), LoadError> {
    let known_blueprints: HashSet<&str> = blueprints.keys().map(|s| s.as_str()).collect();
    let known_steps: HashSet<&str> = steps.known_names();
    for flow in flows.values() {
        validate_flow(flow, &known_blueprints, &known_steps)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
