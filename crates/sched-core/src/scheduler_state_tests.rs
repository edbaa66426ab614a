// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use super::*;

#[test]
fn job_never_run_is_always_due() {
    let state = SchedulerState::default();
    assert!(state.is_due("register_orchestrator", 300, 1_000));
}

#[test]
fn job_due_only_after_interval_elapses() {
    let mut state = SchedulerState::default();
    state.record_run("requeue_expired_leases", 1_000);
    assert!(!state.is_due("requeue_expired_leases", 60, 1_000 + 59_000));
    assert!(state.is_due("requeue_expired_leases", 60, 1_000 + 60_000));
}

#[test]
fn record_run_updates_last_run_ms() {
    let mut state = SchedulerState::default();
    state.record_run("job", 5_000);
    assert_eq!(state.last_run_ms("job"), Some(5_000));
    state.record_run("job", 9_000);
    assert_eq!(state.last_run_ms("job"), Some(9_000));
}
