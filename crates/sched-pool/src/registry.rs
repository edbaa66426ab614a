// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! One file per live worker instance under `$SCHED_HOME/pool/`, named
//! `<blueprint>-<pid>`. Liveness is delegated to a
//! [`ProcessLiveness`] so capacity checks and the orphan sweep stay
//! testable without real processes.

use crate::entry::{PoolEntry, PoolRecord};
use crate::error::PoolError;
use crate::liveness::ProcessLiveness;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct PoolRegistry {
    root: PathBuf,
}

impl PoolRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn record_spawn(
        &self,
        blueprint: &str,
        pid: u32,
        started_at_ms: u64,
        task_id: Option<String>,
    ) -> Result<(), PoolError> {
        std::fs::create_dir_all(&self.root)?;
        let record = PoolRecord { started_at_ms, task_id };
        let path = self.root.join(format!("{blueprint}-{pid}"));
        let tmp_path = self.root.join(format!(".{blueprint}-{pid}.tmp"));
        std::fs::write(&tmp_path, serde_json::to_vec(&record).expect("PoolRecord always serializes"))?;
        std::fs::rename(&tmp_path, &path)?;
        debug!(blueprint, pid, "pool entry recorded");
        Ok(())
    }

    pub fn remove(&self, blueprint: &str, pid: u32) -> Result<(), PoolError> {
        let path = self.root.join(format!("{blueprint}-{pid}"));
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    pub fn list_all(&self) -> Result<Vec<PoolEntry>, PoolError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut entries = Vec::new();
        for dirent in std::fs::read_dir(&self.root)? {
            let dirent = dirent?;
            let name = dirent.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') {
                continue;
            }
            let (blueprint, pid) = PoolEntry::parse_file_name(&name)?;
            let contents = std::fs::read_to_string(dirent.path())?;
            let record: PoolRecord = serde_json::from_str(&contents)
                .map_err(|source| PoolError::Malformed { name: name.into_owned(), source })?;
            entries.push(PoolEntry { blueprint, pid, record });
        }
        Ok(entries)
    }

    pub fn for_blueprint(&self, blueprint: &str) -> Result<Vec<PoolEntry>, PoolError> {
        Ok(self
            .list_all()?
            .into_iter()
            .filter(|e| e.blueprint == blueprint)
            .collect())
    }

    /// Guard 2 ("pool capacity"): live instances for `blueprint`.
    pub fn live_count(&self, blueprint: &str, liveness: &dyn ProcessLiveness) -> Result<usize, PoolError> {
        Ok(self
            .for_blueprint(blueprint)?
            .into_iter()
            .filter(|e| liveness.is_live(e.pid, e.record.started_at_ms))
            .count())
    }

    /// Removes pool files whose process has exited or whose pid was
    /// recycled by an unrelated process.
    pub fn sweep_dead(&self, liveness: &dyn ProcessLiveness) -> Result<Vec<PoolEntry>, PoolError> {
        let mut removed = Vec::new();
        for entry in self.list_all()? {
            if !liveness.is_live(entry.pid, entry.record.started_at_ms) {
                self.remove(&entry.blueprint, entry.pid)?;
                info!(blueprint = %entry.blueprint, pid = entry.pid, "swept dead pool entry");
                removed.push(entry);
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
