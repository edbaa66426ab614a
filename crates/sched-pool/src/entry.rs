// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! The on-disk shape of one pool file: `<blueprint>-<pid>`, containing the
//! instance's start timestamp and bound task id.

use crate::error::PoolError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolRecord {
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// A pool entry as read back from disk: filename-derived identity plus the
/// parsed record.
#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub blueprint: String,
    pub pid: u32,
    pub record: PoolRecord,
}

impl PoolEntry {
    pub fn file_name(&self) -> String {
        format!("{}-{}", self.blueprint, self.pid)
    }

    /// Parses a `<blueprint>-<pid>` file name. The blueprint portion may
    /// itself contain hyphens, so the pid is taken from the last segment.
    pub fn parse_file_name(name: &str) -> Result<(String, u32), PoolError> {
        let (blueprint, pid_str) = name
            .rsplit_once('-')
            .ok_or_else(|| PoolError::BadFileName(name.to_string()))?;
        let pid: u32 = pid_str
            .parse()
            .map_err(|_| PoolError::BadFileName(name.to_string()))?;
        Ok((blueprint.to_string(), pid))
    }
}
