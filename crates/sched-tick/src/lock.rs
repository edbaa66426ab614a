// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Single-instance tick lock: a held lock means the previous
//! tick is still running, so the new invocation exits 0 immediately
//! rather than racing it.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// RAII guard over an exclusively-locked tick-lock file. Unlocked (and
/// the file left on disk, per `fs2`'s advisory-lock model) on drop.
pub struct TickLock {
    file: File,
}

/// Returns `Ok(None)` when the lock is already held elsewhere.
pub fn acquire(path: &Path) -> std::io::Result<Option<TickLock>> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).write(true).open(path)?;
    if file.try_lock_exclusive().is_err() {
        return Ok(None);
    }
    let mut file = file;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(Some(TickLock { file }))
}

impl Drop for TickLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
