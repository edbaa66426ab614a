// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use super::*;
use crate::render::render_sandbox;
use sched_core::{Task, TaskId};
use std::process::Command as StdCommand;
use tempfile::TempDir;

fn init_repo() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = git2::Repository::init(dir.path()).expect("init repo");
    std::fs::write(dir.path().join("README.md"), "hello\n").expect("write file");
    let mut index = repo.index().expect("index");
    index.add_path(Path::new("README.md")).expect("add path");
    index.write().expect("write index");
    let tree_id = index.write_tree().expect("write tree");
    let tree = repo.find_tree(tree_id).expect("find tree");
    let sig = git2::Signature::now("Test", "test@example.invalid").expect("signature");
    repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
        .expect("commit");
    dir
}

/// A clone of `init_repo()` with its origin set up to accept pushes, for
/// tests that exercise `push_branch` (which shells out to `git push`).
/// Both directories must stay alive for the remote to stay reachable, so
/// the caller keeps both `TempDir`s in scope.
fn init_repo_with_pushable_origin() -> (TempDir, TempDir) {
    let origin_dir = init_repo();
    StdCommand::new("git")
        .args(["config", "receive.denyCurrentBranch", "ignore"])
        .current_dir(origin_dir.path())
        .status()
        .expect("configure origin");

    let clone_dir = tempfile::tempdir().expect("clone tempdir");
    let status = StdCommand::new("git")
        .args(["clone", origin_dir.path().to_str().expect("utf8 path"), clone_dir.path().to_str().expect("utf8 path")])
        .status()
        .expect("clone");
    assert!(status.success());
    (origin_dir, clone_dir)
}

fn sample_task() -> Task {
    Task {
        id: TaskId::new("t1"),
        state: "claimed".to_string(),
        title: "demo".to_string(),
        body: "do it".to_string(),
        role: "implement".to_string(),
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

#[tokio::test]
async fn ensure_sandbox_creates_detached_worktree_with_rendered_files() {
    let repo_dir = init_repo();
    let sandbox_root = tempfile::tempdir().expect("sandbox root");
    let manager = SandboxManager::new(sandbox_root.path());
    let task = sample_task();
    let rendered = render_sandbox(&task, "be careful", None, &[], "/usr/bin/env bash");

    let handle = manager
        .ensure_sandbox(repo_dir.path(), "t1", &rendered)
        .await
        .expect("ensure_sandbox");

    assert!(handle.path.exists());
    assert!(handle.prompt_path().exists());
    assert!(handle.manifest_path().exists());
    assert!(handle.env_path().exists());

    let repo = git2::Repository::open(&handle.path).expect("open worktree repo");
    assert!(repo.head_detached().expect("head_detached"));
}

#[tokio::test]
async fn ensure_sandbox_is_idempotent_when_base_commit_still_current() {
    let repo_dir = init_repo();
    let sandbox_root = tempfile::tempdir().expect("sandbox root");
    let manager = SandboxManager::new(sandbox_root.path());
    let task = sample_task();
    let rendered = render_sandbox(&task, "", None, &[], "/bin/sh");

    let first = manager
        .ensure_sandbox(repo_dir.path(), "t1", &rendered)
        .await
        .expect("first ensure_sandbox");
    let second = manager
        .ensure_sandbox(repo_dir.path(), "t1", &rendered)
        .await
        .expect("second ensure_sandbox");

    assert_eq!(first.path, second.path);
    assert_eq!(first.base_commit, second.base_commit);
}

#[tokio::test]
async fn ensure_sandbox_re_detaches_a_worktree_left_on_a_named_branch_by_push_branch() {
    let (_origin_dir, repo_dir) = init_repo_with_pushable_origin();
    let sandbox_root = tempfile::tempdir().expect("sandbox root");
    let manager = SandboxManager::new(sandbox_root.path());
    let task = sample_task();
    let rendered = render_sandbox(&task, "", None, &[], "/bin/sh");

    let first = manager
        .ensure_sandbox(repo_dir.path(), "t1", &rendered)
        .await
        .expect("first ensure_sandbox");

    manager
        .push_branch("t1", "sched/t1")
        .await
        .expect("push_branch names the head");
    let repo = git2::Repository::open(&first.path).expect("open worktree repo");
    assert!(!repo.head_detached().expect("head_detached"));

    let reused = manager
        .ensure_sandbox(repo_dir.path(), "t1", &rendered)
        .await
        .expect("second ensure_sandbox");

    assert_eq!(reused.path, first.path);
    let repo = git2::Repository::open(&reused.path).expect("reopen worktree repo");
    assert!(repo.head_detached().expect("head_detached after reuse"));
}

#[tokio::test]
async fn destroy_sandbox_removes_the_directory() {
    let repo_dir = init_repo();
    let sandbox_root = tempfile::tempdir().expect("sandbox root");
    let manager = SandboxManager::new(sandbox_root.path());
    let task = sample_task();
    let rendered = render_sandbox(&task, "", None, &[], "/bin/sh");

    let handle = manager
        .ensure_sandbox(repo_dir.path(), "t1", &rendered)
        .await
        .expect("ensure_sandbox");
    assert!(handle.path.exists());

    manager
        .destroy_sandbox("t1", false)
        .await
        .expect("destroy_sandbox");
    assert!(!handle.path.exists());
    assert!(manager.get("t1").await.is_none());
}

#[tokio::test]
async fn a_fresh_manager_rehydrates_a_handle_from_the_on_disk_manifest() {
    let repo_dir = init_repo();
    let sandbox_root = tempfile::tempdir().expect("sandbox root");
    let task = sample_task();
    let rendered = render_sandbox(&task, "", None, &[], "/bin/sh");

    let created = SandboxManager::new(sandbox_root.path());
    let original = created
        .ensure_sandbox(repo_dir.path(), "t1", &rendered)
        .await
        .expect("ensure_sandbox");

    let fresh = SandboxManager::new(sandbox_root.path());
    let rehydrated = fresh.get("t1").await.expect("rehydrated handle");
    assert_eq!(rehydrated.path, original.path);
    assert_eq!(rehydrated.base_commit, original.base_commit);

    fresh
        .destroy_sandbox("t1", false)
        .await
        .expect("destroy_sandbox via rehydrated handle");
    assert!(!original.path.exists());
}
