// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Whether a pool entry's PID still refers to the process that created it.
//!
//! A bare `kill(pid, 0)` can't tell a live original process from an
//! unrelated process that reused the same PID after the original exited.
//! Comparing the OS-reported process start time against the one we
//! recorded at spawn time catches that
//! case; `sysinfo` gives us the start time for free alongside existence.

use sysinfo::{Pid, ProcessesToUpdate, System};

/// Processes whose reported start time differs from ours by more than
/// this are treated as a different process entirely (PID recycled).
/// Generous enough to absorb second-resolution rounding between the two
/// clocks.
const START_TIME_TOLERANCE_MS: u64 = 2_000;

pub trait ProcessLiveness: Send + Sync {
    /// True if `pid` is running and its start time is consistent with
    /// `recorded_start_ms`.
    fn is_live(&self, pid: u32, recorded_start_ms: u64) -> bool;
}

#[derive(Debug, Default)]
pub struct SysinfoLiveness;

impl ProcessLiveness for SysinfoLiveness {
    fn is_live(&self, pid: u32, recorded_start_ms: u64) -> bool {
        let mut sys = System::new();
        let sys_pid = Pid::from_u32(pid);
        sys.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        match sys.process(sys_pid) {
            Some(process) => {
                let actual_start_ms = process.start_time().saturating_mul(1000);
                actual_start_ms.abs_diff(recorded_start_ms) <= START_TIME_TOLERANCE_MS
            }
            None => false,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeLiveness;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::ProcessLiveness;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Test double: a fixed set of pids considered live, regardless of
    /// recorded start time.
    #[derive(Default)]
    pub struct FakeLiveness {
        live_pids: Mutex<HashSet<u32>>,
    }

    impl FakeLiveness {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn mark_live(&self, pid: u32) {
            self.live_pids.lock().expect("poisoned").insert(pid);
        }

        pub fn mark_dead(&self, pid: u32) {
            self.live_pids.lock().expect("poisoned").remove(&pid);
        }
    }

    impl ProcessLiveness for FakeLiveness {
        fn is_live(&self, pid: u32, _recorded_start_ms: u64) -> bool {
            self.live_pids.lock().expect("poisoned").contains(&pid)
        }
    }
}
