// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Pool & process tracking: one PID file per live worker instance under
//! `$SCHED_HOME/pool/`, liveness checks that survive PID recycling, and
//! capacity enforcement for the guard chain's "pool capacity" guard.

mod entry;
mod error;
mod liveness;
mod registry;

pub use entry::{PoolEntry, PoolRecord};
pub use error::PoolError;
pub use liveness::{ProcessLiveness, SysinfoLiveness};
pub use registry::PoolRegistry;

#[cfg(any(test, feature = "test-support"))]
pub use liveness::FakeLiveness;

use sched_core::Clock;

/// Thin convenience wrapper pairing a [`PoolRegistry`] with a [`Clock`] so
/// callers don't thread `epoch_ms()` through every spawn call site.
pub struct PoolManager<C: Clock> {
    registry: PoolRegistry,
    clock: C,
}

impl<C: Clock> PoolManager<C> {
    pub fn new(root: impl Into<std::path::PathBuf>, clock: C) -> Self {
        Self {
            registry: PoolRegistry::new(root),
            clock,
        }
    }

    pub fn registry(&self) -> &PoolRegistry {
        &self.registry
    }

    pub fn record_spawn_now(&self, blueprint: &str, pid: u32, task_id: Option<String>) -> Result<(), PoolError> {
        self.registry.record_spawn(blueprint, pid, self.clock.epoch_ms(), task_id)
    }
}

#[cfg(test)]
mod manager_tests {
    use super::*;
    use sched_core::FakeClock;

    #[test]
    fn record_spawn_now_uses_the_injected_clock() {
        let dir = tempfile::tempdir().unwrap();
        let clock = FakeClock::new(12_345_000);
        let manager = PoolManager::new(dir.path(), clock);
        manager.record_spawn_now("implement", 42, None).unwrap();

        let entries = manager.registry().list_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].record.started_at_ms, 12_345_000);
    }
}
