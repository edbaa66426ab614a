// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use super::*;
use sched_core::{Blueprint, QueueCounts, SpawnMode, TaskId};
use sched_flow::FakePrHost;
use sched_pool::FakeLiveness;
use sched_store::FakeStore;

fn blueprint(name: &str) -> Blueprint {
    Blueprint {
        name: name.to_string(),
        role: "implement".to_string(),
        model: "sonnet".to_string(),
        max_instances: 2,
        interval_seconds: 60,
        spawn_mode: SpawnMode::TaskBound,
        max_turns: 10,
        allowed_tools: Vec::new(),
        allowed_task_types: Vec::new(),
        claim_from: "incoming".to_string(),
        max_rejections: 5,
        paused: false,
        pre_check_script: None,
    }
}

fn task(id: &str, state: &str, role: &str) -> Task {
    Task {
        id: TaskId::new(id),
        state: state.to_string(),
        title: "title".to_string(),
        body: "do the thing".to_string(),
        role: role.to_string(),
        priority: 0,
        project_id: None,
        branch: None,
        version: 1,
        claimed_by: None,
        lease_expires_at: None,
        pr_number: None,
        pr_url: None,
        blocked_by: None,
        flow: "default".to_string(),
        failure_reason: None,
        execution_notes: None,
        rejection_count: 0,
    }
}

fn no_limits() -> GuardLimits {
    GuardLimits {
        max_claimed: 1000,
        max_provisional: 1000,
    }
}

#[tokio::test]
async fn enabled_guard_halts_a_paused_blueprint() {
    let mut bp = blueprint("implement");
    bp.paused = true;
    let store = FakeStore::new(vec![]);
    let pr_host = FakePrHost::new();
    let pool = sched_pool::PoolRegistry::new(tempfile::tempdir().unwrap().path());
    let liveness = FakeLiveness::new();
    let state = SchedulerState::default();
    let poll = PollSummary::default();

    let mut ctx = GuardContext {
        blueprint: &bp,
        pool: &pool,
        liveness: &liveness,
        scheduler_state: &state,
        poll: &poll,
        store: &store,
        pr_host: &pr_host,
        limits: no_limits(),
        now_ms: 0,
        claimed_task: None,
    };

    let verdict = EnabledGuard.check(&mut ctx).await.unwrap();
    assert_eq!(verdict, GuardVerdict::Halt("blueprint is paused".to_string()));
}

#[tokio::test]
async fn pool_capacity_guard_halts_once_max_instances_are_live() {
    let bp = blueprint("implement");
    let store = FakeStore::new(vec![]);
    let pr_host = FakePrHost::new();
    let dir = tempfile::tempdir().unwrap();
    let pool = sched_pool::PoolRegistry::new(dir.path());
    pool.record_spawn("implement", 1, 0, None).unwrap();
    pool.record_spawn("implement", 2, 0, None).unwrap();
    let liveness = FakeLiveness::new();
    liveness.mark_live(1);
    liveness.mark_live(2);
    let state = SchedulerState::default();
    let poll = PollSummary::default();

    let mut ctx = GuardContext {
        blueprint: &bp,
        pool: &pool,
        liveness: &liveness,
        scheduler_state: &state,
        poll: &poll,
        store: &store,
        pr_host: &pr_host,
        limits: no_limits(),
        now_ms: 0,
        claimed_task: None,
    };

    let verdict = PoolCapacityGuard.check(&mut ctx).await.unwrap();
    assert!(matches!(verdict, GuardVerdict::Halt(_)));
}

#[tokio::test]
async fn interval_guard_halts_before_the_interval_elapses() {
    let bp = blueprint("implement");
    let store = FakeStore::new(vec![]);
    let pr_host = FakePrHost::new();
    let pool = sched_pool::PoolRegistry::new(tempfile::tempdir().unwrap().path());
    let liveness = FakeLiveness::new();
    let mut state = SchedulerState::default();
    state.record_run(&spawn_job_name("implement"), 1_000);
    let poll = PollSummary::default();

    let mut ctx = GuardContext {
        blueprint: &bp,
        pool: &pool,
        liveness: &liveness,
        scheduler_state: &state,
        poll: &poll,
        store: &store,
        pr_host: &pr_host,
        limits: no_limits(),
        now_ms: 1_500,
        claimed_task: None,
    };

    let verdict = IntervalGuard.check(&mut ctx).await.unwrap();
    assert!(matches!(verdict, GuardVerdict::Halt(_)));
}

#[yare::parameterized(
    under_both_limits = { 1, 1, GuardVerdict::Proceed },
    claimed_at_limit = { 3, 0, GuardVerdict::Halt("claimed queue at capacity (3/3)".to_string()) },
    provisional_at_limit = { 0, 5, GuardVerdict::Halt("provisional queue at capacity (5/5)".to_string()) },
)]
#[tokio::test]
async fn backpressure_guard_enforces_role_wide_queue_limits(
    claimed: u32,
    provisional: u32,
    expected: GuardVerdict,
) {
    let bp = blueprint("implement");
    let store = FakeStore::new(vec![]);
    let pr_host = FakePrHost::new();
    let pool = sched_pool::PoolRegistry::new(tempfile::tempdir().unwrap().path());
    let liveness = FakeLiveness::new();
    let state = SchedulerState::default();
    let mut poll = PollSummary::default();
    poll.queue_counts.insert(
        "implement".to_string(),
        QueueCounts {
            incoming: 0,
            claimed,
            provisional,
        },
    );

    let mut ctx = GuardContext {
        blueprint: &bp,
        pool: &pool,
        liveness: &liveness,
        scheduler_state: &state,
        poll: &poll,
        store: &store,
        pr_host: &pr_host,
        limits: GuardLimits {
            max_claimed: 3,
            max_provisional: 5,
        },
        now_ms: 0,
        claimed_task: None,
    };

    let verdict = BackpressureGuard.check(&mut ctx).await.unwrap();
    assert_eq!(verdict, expected);
}

#[tokio::test]
async fn claim_task_guard_proceeds_and_records_the_claimed_task() {
    let bp = blueprint("implement");
    let store = FakeStore::new(vec![task("t1", "incoming", "implement")]);
    let pr_host = FakePrHost::new();
    let pool = sched_pool::PoolRegistry::new(tempfile::tempdir().unwrap().path());
    let liveness = FakeLiveness::new();
    let state = SchedulerState::default();
    let poll = PollSummary::default();

    let mut ctx = GuardContext {
        blueprint: &bp,
        pool: &pool,
        liveness: &liveness,
        scheduler_state: &state,
        poll: &poll,
        store: &store,
        pr_host: &pr_host,
        limits: no_limits(),
        now_ms: 0,
        claimed_task: None,
    };

    let verdict = ClaimTaskGuard.check(&mut ctx).await.unwrap();
    assert_eq!(verdict, GuardVerdict::Proceed);
    assert_eq!(ctx.claimed_task.as_ref().unwrap().id, TaskId::new("t1"));
}

#[tokio::test]
async fn task_description_guard_fails_a_task_with_an_empty_body() {
    let bp = blueprint("implement");
    let mut empty_task = task("t1", "claimed", "implement");
    empty_task.body = "   ".to_string();
    let store = FakeStore::new(vec![empty_task.clone()]);
    let pr_host = FakePrHost::new();
    let pool = sched_pool::PoolRegistry::new(tempfile::tempdir().unwrap().path());
    let liveness = FakeLiveness::new();
    let state = SchedulerState::default();
    let poll = PollSummary::default();

    let mut ctx = GuardContext {
        blueprint: &bp,
        pool: &pool,
        liveness: &liveness,
        scheduler_state: &state,
        poll: &poll,
        store: &store,
        pr_host: &pr_host,
        limits: no_limits(),
        now_ms: 0,
        claimed_task: Some(empty_task),
    };

    let verdict = TaskDescriptionGuard.check(&mut ctx).await.unwrap();
    assert!(matches!(verdict, GuardVerdict::Halt(_)));
    assert!(ctx.claimed_task.is_none());
    assert_eq!(store.tasks()[0].state, "failed");
}

#[tokio::test]
async fn pr_mergeable_guard_releases_claim_when_pr_has_conflicts() {
    let mut bp = blueprint("gatekeeper");
    bp.claim_from = "provisional".to_string();
    let mut reviewed = task("t1", "claimed", "gatekeeper");
    reviewed.pr_number = Some(42);
    let store = FakeStore::new(vec![reviewed.clone()]);
    let pr_host = FakePrHost::new();
    pr_host.set_mergeable(false);
    let pool = sched_pool::PoolRegistry::new(tempfile::tempdir().unwrap().path());
    let liveness = FakeLiveness::new();
    let state = SchedulerState::default();
    let poll = PollSummary::default();

    let mut ctx = GuardContext {
        blueprint: &bp,
        pool: &pool,
        liveness: &liveness,
        scheduler_state: &state,
        poll: &poll,
        store: &store,
        pr_host: &pr_host,
        limits: no_limits(),
        now_ms: 0,
        claimed_task: Some(reviewed),
    };

    let verdict = PrMergeableGuard.check(&mut ctx).await.unwrap();
    assert!(matches!(verdict, GuardVerdict::Halt(_)));
    assert!(ctx.claimed_task.is_none());
    assert_eq!(store.tasks()[0].state, "incoming");
    assert!(store.tasks()[0].claimed_by.is_none());
}

#[tokio::test]
async fn full_chain_halts_at_enabled_without_ever_calling_claim() {
    let mut bp = blueprint("implement");
    bp.paused = true;
    let store = FakeStore::new(vec![task("t1", "incoming", "implement")]);
    let pr_host = FakePrHost::new();
    let pool = sched_pool::PoolRegistry::new(tempfile::tempdir().unwrap().path());
    let liveness = FakeLiveness::new();
    let state = SchedulerState::default();
    let poll = PollSummary::default();

    let mut ctx = GuardContext {
        blueprint: &bp,
        pool: &pool,
        liveness: &liveness,
        scheduler_state: &state,
        poll: &poll,
        store: &store,
        pr_host: &pr_host,
        limits: no_limits(),
        now_ms: 0,
        claimed_task: None,
    };

    let outcome = run_guard_chain(&default_chain(), &mut ctx).await.unwrap();
    assert!(matches!(
        outcome,
        GuardChainOutcome::Halted { guard: "enabled", .. }
    ));
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn full_chain_proceeds_with_the_claimed_task_when_every_guard_passes() {
    let bp = blueprint("implement");
    let store = FakeStore::new(vec![task("t1", "incoming", "implement")]);
    let pr_host = FakePrHost::new();
    let pool = sched_pool::PoolRegistry::new(tempfile::tempdir().unwrap().path());
    let liveness = FakeLiveness::new();
    let state = SchedulerState::default();
    let poll = PollSummary::default();

    let mut ctx = GuardContext {
        blueprint: &bp,
        pool: &pool,
        liveness: &liveness,
        scheduler_state: &state,
        poll: &poll,
        store: &store,
        pr_host: &pr_host,
        limits: no_limits(),
        now_ms: 0,
        claimed_task: None,
    };

    let outcome = run_guard_chain(&default_chain(), &mut ctx).await.unwrap();
    match outcome {
        GuardChainOutcome::Proceed(task) => assert_eq!(task.id, TaskId::new("t1")),
        other => panic!("expected Proceed, got {other:?}"),
    }
}
