// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Persists `SchedulerState` to disk between ticks. Atomic write (temp +
//! rename), matching the pattern `sched-pool::PoolRegistry::record_spawn`
//! already uses.

use sched_core::SchedulerState;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateFileError {
    #[error("io error reading/writing scheduler state at '{path}': {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed scheduler state at '{path}': {source}")]
    Parse {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load(path: &Path) -> Result<SchedulerState, StateFileError> {
    if !path.exists() {
        return Ok(SchedulerState::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|source| StateFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| StateFileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn save(path: &Path, state: &SchedulerState) -> Result<(), StateFileError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| StateFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let tmp_path = path.with_extension("json.tmp");
    let body = serde_json::to_vec_pretty(state).map_err(|source| StateFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(&tmp_path, body).map_err(|source| StateFileError::Io {
        path: tmp_path.clone(),
        source,
    })?;
    std::fs::rename(&tmp_path, path).map_err(|source| StateFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(test)]
#[path = "state_file_tests.rs"]
mod tests;
