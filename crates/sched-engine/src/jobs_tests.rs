// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use super::*;
use sched_core::{Blueprint, Flow, PollSummary, SpawnMode, Task, TaskId, Transition};
use sched_flow::{ConditionError, FakePrHost, StepRegistry};
use sched_pool::FakeLiveness;
use sched_store::FakeStore;
use std::sync::Arc;

struct NeverSpawner;

#[async_trait::async_trait]
impl AgentConditionSpawner for NeverSpawner {
    async fn evaluate(&self, _task_id: &str, _blueprint: &str) -> Result<Option<bool>, ConditionError> {
        panic!("no condition should be evaluated by job tests");
    }
}

fn blueprint(claim_from: &str) -> Blueprint {
    Blueprint {
        name: "worker".to_string(),
        role: "implement".to_string(),
        model: "sonnet".to_string(),
        max_instances: 2,
        interval_seconds: 60,
        spawn_mode: SpawnMode::TaskBound,
        max_turns: 10,
        allowed_tools: Vec::new(),
        allowed_task_types: Vec::new(),
        claim_from: claim_from.to_string(),
        max_rejections: 5,
        paused: false,
        pre_check_script: None,
    }
}

fn task(id: &str, state: &str, lease_expires_at: Option<&str>) -> Task {
    Task {
        id: TaskId::new(id),
        state: state.to_string(),
        title: "title".to_string(),
        body: "body".to_string(),
        role: "implement".to_string(),
        priority: 0,
        project_id: None,
        branch: None,
        version: 1,
        claimed_by: Some("worker".to_string()),
        lease_expires_at: lease_expires_at.map(str::to_string),
        pr_number: None,
        pr_url: None,
        blocked_by: None,
        flow: "default".to_string(),
        failure_reason: None,
        execution_notes: None,
        rejection_count: 0,
    }
}

fn flow() -> Flow {
    Flow {
        name: "default".to_string(),
        description: None,
        initial_state: "incoming".to_string(),
        terminal_states: vec!["done".to_string(), "failed".to_string()],
        transitions: vec![Transition {
            from: "incoming".to_string(),
            to: "provisional".to_string(),
            agent: None,
            conditions: Vec::new(),
            runs: Vec::new(),
        }],
        child_flow: None,
    }
}

async fn repo_with_commit() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = git2::Repository::init(dir.path()).expect("init");
    let sig = git2::Signature::now("t", "t@example.invalid").expect("sig");
    let tree_id = repo.index().expect("index").write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    repo.commit(Some("HEAD"), &sig, &sig, "init", &tree, &[]).expect("commit");
    dir
}

fn blueprints_map() -> HashMap<String, Blueprint> {
    let mut map = HashMap::new();
    map.insert("worker".to_string(), blueprint("incoming"));
    map
}

fn flows_map() -> HashMap<String, Flow> {
    let mut map = HashMap::new();
    map.insert("default".to_string(), flow());
    map
}

#[tokio::test]
async fn check_finished_agents_dispatches_and_cleans_up_the_pool_entry() {
    let repo = repo_with_commit().await;
    let sandbox = SandboxManager::new(repo.path().join("sandboxes"));
    let rendered = sched_sandbox::render_sandbox(&task("t1", "claimed", None), "do it", None, &[], "/bin/sh");
    let handle = sandbox.ensure_sandbox(repo.path(), "t1", &rendered).await.expect("ensure sandbox");
    let doc = sched_core::ResultDocument {
        outcome: sched_core::Outcome::Done,
        decision: None,
        comment: None,
        reason: None,
    };
    tokio::fs::write(handle.result_document_path(), serde_json::to_vec(&doc).unwrap())
        .await
        .expect("write result doc");

    let pool_dir = tempfile::tempdir().expect("tempdir");
    let pool = PoolRegistry::new(pool_dir.path());
    pool.record_spawn("worker", 4242, 0, Some("t1".to_string())).expect("record spawn");

    let store: Arc<dyn Store> = Arc::new(FakeStore::new(vec![task("t1", "claimed", None)]));
    let pr_host = FakePrHost::new();
    let steps = StepRegistry::new();
    let liveness = FakeLiveness::new();
    let blueprints = blueprints_map();
    let flows = flows_map();
    let spawner = NeverSpawner;
    let ctx = JobContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &spawner,
        orchestrator_id: "orch-1",
        cluster: "cluster-1",
        machine_id: "machine-1",
    };

    check_finished_agents(&ctx).await.expect("check_finished_agents");

    let updated = store.get("t1").await.expect("task");
    assert_eq!(updated.state, "provisional");
    assert!(pool.list_all().expect("list").is_empty());
}

#[tokio::test]
async fn check_finished_agents_leaves_condition_workers_alone() {
    let repo = repo_with_commit().await;
    let sandbox = SandboxManager::new(repo.path().join("sandboxes"));
    let pool_dir = tempfile::tempdir().expect("tempdir");
    let pool = PoolRegistry::new(pool_dir.path());
    pool.record_spawn("gatekeeper", 99, 0, Some("t1__condition__gatekeeper".to_string()))
        .expect("record spawn");

    let store: Arc<dyn Store> = Arc::new(FakeStore::new(vec![task("t1", "provisional", None)]));
    let pr_host = FakePrHost::new();
    let steps = StepRegistry::new();
    let liveness = FakeLiveness::new();
    let blueprints = blueprints_map();
    let flows = flows_map();
    let spawner = NeverSpawner;
    let ctx = JobContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &spawner,
        orchestrator_id: "orch-1",
        cluster: "cluster-1",
        machine_id: "machine-1",
    };

    check_finished_agents(&ctx).await.expect("check_finished_agents");
    assert_eq!(pool.list_all().expect("list").len(), 1);
}

#[tokio::test]
async fn requeue_expired_leases_releases_a_dead_workers_expired_claim() {
    let repo = repo_with_commit().await;
    let sandbox = SandboxManager::new(repo.path().join("sandboxes"));
    let pool_dir = tempfile::tempdir().expect("tempdir");
    let pool = PoolRegistry::new(pool_dir.path());
    pool.record_spawn("worker", 1, 0, Some("t1".to_string())).expect("record spawn");

    let store: Arc<dyn Store> = Arc::new(FakeStore::new(vec![task("t1", "claimed", Some("2000-01-01T00:00:00Z"))]));
    let pr_host = FakePrHost::new();
    let steps = StepRegistry::new();
    let liveness = FakeLiveness::new(); // pid 1 never marked live
    let blueprints = blueprints_map();
    let flows = flows_map();
    let spawner = NeverSpawner;
    let ctx = JobContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &spawner,
        orchestrator_id: "orch-1",
        cluster: "cluster-1",
        machine_id: "machine-1",
    };

    requeue_expired_leases(&ctx, 10_000).await.expect("requeue_expired_leases");

    let updated = store.get("t1").await.expect("task");
    assert_eq!(updated.state, "incoming");
    assert!(updated.claimed_by.is_none());
    assert!(pool.list_all().expect("list").is_empty());
}

#[tokio::test]
async fn requeue_expired_leases_leaves_a_live_workers_claim_alone() {
    let repo = repo_with_commit().await;
    let sandbox = SandboxManager::new(repo.path().join("sandboxes"));
    let pool_dir = tempfile::tempdir().expect("tempdir");
    let pool = PoolRegistry::new(pool_dir.path());
    pool.record_spawn("worker", 7, 0, Some("t1".to_string())).expect("record spawn");

    let store: Arc<dyn Store> = Arc::new(FakeStore::new(vec![task("t1", "claimed", Some("2000-01-01T00:00:00Z"))]));
    let pr_host = FakePrHost::new();
    let steps = StepRegistry::new();
    let liveness = FakeLiveness::new();
    liveness.mark_live(7);
    let blueprints = blueprints_map();
    let flows = flows_map();
    let spawner = NeverSpawner;
    let ctx = JobContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &spawner,
        orchestrator_id: "orch-1",
        cluster: "cluster-1",
        machine_id: "machine-1",
    };

    requeue_expired_leases(&ctx, 10_000).await.expect("requeue_expired_leases");

    let updated = store.get("t1").await.expect("task");
    assert_eq!(updated.state, "claimed");
    assert_eq!(pool.list_all().expect("list").len(), 1);
}

#[tokio::test]
async fn requeue_expired_leases_leaves_an_unexpired_lease_alone() {
    let repo = repo_with_commit().await;
    let sandbox = SandboxManager::new(repo.path().join("sandboxes"));
    let pool_dir = tempfile::tempdir().expect("tempdir");
    let pool = PoolRegistry::new(pool_dir.path());
    pool.record_spawn("worker", 3, 0, Some("t1".to_string())).expect("record spawn");

    let store: Arc<dyn Store> = Arc::new(FakeStore::new(vec![task("t1", "claimed", Some("9999-01-01T00:00:00Z"))]));
    let pr_host = FakePrHost::new();
    let steps = StepRegistry::new();
    let liveness = FakeLiveness::new(); // dead, but lease far in the future
    let blueprints = blueprints_map();
    let flows = flows_map();
    let spawner = NeverSpawner;
    let ctx = JobContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &spawner,
        orchestrator_id: "orch-1",
        cluster: "cluster-1",
        machine_id: "machine-1",
    };

    requeue_expired_leases(&ctx, 10_000).await.expect("requeue_expired_leases");

    let updated = store.get("t1").await.expect("task");
    assert_eq!(updated.state, "claimed");
    assert_eq!(pool.list_all().expect("list").len(), 1);
}

#[tokio::test]
async fn sweep_stale_worktrees_skips_the_tick_while_any_agent_is_alive() {
    let repo = repo_with_commit().await;
    let sandbox = SandboxManager::new(repo.path().join("sandboxes"));
    tokio::fs::create_dir_all(sandbox.root().join("t1")).await.expect("mkdir");

    let pool_dir = tempfile::tempdir().expect("tempdir");
    let pool = PoolRegistry::new(pool_dir.path());
    pool.record_spawn("worker", 55, 0, Some("t2".to_string())).expect("record spawn");

    let store: Arc<dyn Store> = Arc::new(FakeStore::new(vec![task("t1", "done", None)]));
    let pr_host = FakePrHost::new();
    let steps = StepRegistry::new();
    let liveness = FakeLiveness::new();
    liveness.mark_live(55);
    let blueprints = blueprints_map();
    let flows = flows_map();
    let spawner = NeverSpawner;
    let ctx = JobContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &spawner,
        orchestrator_id: "orch-1",
        cluster: "cluster-1",
        machine_id: "machine-1",
    };

    sweep_stale_worktrees(&ctx).await.expect("sweep_stale_worktrees");
    assert!(sandbox.root().join("t1").exists());
}

#[tokio::test]
async fn sweep_stale_worktrees_removes_directories_for_tasks_no_longer_claimed() {
    let repo = repo_with_commit().await;
    let sandbox = SandboxManager::new(repo.path().join("sandboxes"));
    tokio::fs::create_dir_all(sandbox.root().join("t1")).await.expect("mkdir");

    let pool_dir = tempfile::tempdir().expect("tempdir");
    let pool = PoolRegistry::new(pool_dir.path());

    let store: Arc<dyn Store> = Arc::new(FakeStore::new(vec![task("t1", "done", None)]));
    let pr_host = FakePrHost::new();
    let steps = StepRegistry::new();
    let liveness = FakeLiveness::new();
    let blueprints = blueprints_map();
    let flows = flows_map();
    let spawner = NeverSpawner;
    let ctx = JobContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &spawner,
        orchestrator_id: "orch-1",
        cluster: "cluster-1",
        machine_id: "machine-1",
    };

    sweep_stale_worktrees(&ctx).await.expect("sweep_stale_worktrees");
    assert!(!sandbox.root().join("t1").exists());
}

#[tokio::test]
async fn sweep_stale_worktrees_keeps_directories_for_tasks_still_claimed() {
    let repo = repo_with_commit().await;
    let sandbox = SandboxManager::new(repo.path().join("sandboxes"));
    tokio::fs::create_dir_all(sandbox.root().join("t1")).await.expect("mkdir");

    let pool_dir = tempfile::tempdir().expect("tempdir");
    let pool = PoolRegistry::new(pool_dir.path());

    let store: Arc<dyn Store> = Arc::new(FakeStore::new(vec![task("t1", "claimed", None)]));
    let pr_host = FakePrHost::new();
    let steps = StepRegistry::new();
    let liveness = FakeLiveness::new();
    let blueprints = blueprints_map();
    let flows = flows_map();
    let spawner = NeverSpawner;
    let ctx = JobContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &spawner,
        orchestrator_id: "orch-1",
        cluster: "cluster-1",
        machine_id: "machine-1",
    };

    sweep_stale_worktrees(&ctx).await.expect("sweep_stale_worktrees");
    assert!(sandbox.root().join("t1").exists());
}

#[tokio::test]
async fn process_provisional_tasks_flags_a_missing_pr_number_without_erroring() {
    let repo = repo_with_commit().await;
    let sandbox = SandboxManager::new(repo.path().join("sandboxes"));
    let pool_dir = tempfile::tempdir().expect("tempdir");
    let pool = PoolRegistry::new(pool_dir.path());

    let store: Arc<dyn Store> = Arc::new(FakeStore::new(vec![task("t1", "provisional", None)]));
    let pr_host = FakePrHost::new();
    let steps = StepRegistry::new();
    let liveness = FakeLiveness::new();
    let blueprints = blueprints_map();
    let flows = flows_map();
    let spawner = NeverSpawner;
    let ctx = JobContext {
        store: store.as_ref(),
        pool: &pool,
        sandbox: &sandbox,
        liveness: &liveness,
        blueprints: &blueprints,
        flows: &flows,
        steps: &steps,
        pr_host: &pr_host,
        agent_spawner: &spawner,
        orchestrator_id: "orch-1",
        cluster: "cluster-1",
        machine_id: "machine-1",
    };
    let mut state = SchedulerState::default();
    state.poll_cache = Some(PollSummary {
        queue_counts: HashMap::new(),
        provisional_tasks: vec!["t1".to_string()],
        registered: true,
    });

    process_provisional_tasks(&ctx, &state).await.expect("process_provisional_tasks");
}
