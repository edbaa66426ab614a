// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Per-task git-worktree sandboxes, always created on a detached commit.
//!
//! Tracks each sandbox by task id, running every blocking `git2` call
//! through `spawn_blocking`. The worktree is never bound to a named
//! branch until the commit is about to be pushed — branching at creation
//! time would let two concurrent workers collide on the same branch
//! checkout, which git refuses.

use crate::error::SandboxError;
use crate::render::RenderedSandbox;
use sched_core::SandboxHandle;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub struct SandboxManager {
    root: PathBuf,
    sandboxes: RwLock<HashMap<String, SandboxHandle>>,
}

impl SandboxManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            sandboxes: RwLock::new(HashMap::new()),
        }
    }

    /// Looks up a tracked handle, falling back to reading it back off disk
    /// when this process never called `ensure_sandbox` for it itself — the
    /// common case, since a worker finishes in a later tick than the one
    /// that spawned it and each tick is a fresh process with an empty map.
    pub async fn get(&self, task_id: &str) -> Option<SandboxHandle> {
        if let Some(handle) = self.sandboxes.read().await.get(task_id).cloned() {
            return Some(handle);
        }
        let handle = self.rehydrate(task_id).await?;
        self.sandboxes
            .write()
            .await
            .insert(task_id.to_string(), handle.clone());
        Some(handle)
    }

    async fn rehydrate(&self, task_id: &str) -> Option<SandboxHandle> {
        let path = self.root.join(task_id);
        if !path.is_dir() {
            return None;
        }
        let manifest_path = path.join(".sched").join("task.json");
        let contents = tokio::fs::read_to_string(&manifest_path).await.ok()?;
        let manifest: serde_json::Value = serde_json::from_str(&contents).ok()?;
        let base_commit = manifest.get("base_commit")?.as_str()?.to_string();
        Some(SandboxHandle {
            task_id: task_id.to_string(),
            path,
            base_commit,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory names currently under the sandbox root, regardless of
    /// whether this process has an in-memory handle for them. Used by the
    /// stale-worktree sweep, which runs in a fresh process each tick and so
    /// never has in-memory state from whichever tick created a sandbox.
    pub async fn worktree_dir_names(&self) -> std::io::Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        Ok(names)
    }

    /// Removes a worktree directory left behind by a prior, possibly
    /// crashed, tick without requiring a tracked [`SandboxHandle`].
    pub async fn force_remove(&self, task_id: &str) -> Result<(), SandboxError> {
        let wt_path = self.root.join(task_id);
        tokio::task::spawn_blocking(move || remove_worktree(&wt_path)).await??;
        self.sandboxes.write().await.remove(task_id);
        Ok(())
    }

    /// Ensure a detached-HEAD worktree exists for `task_id`, recreating it
    /// if the tracked commit is no longer an ancestor of the repo's current
    /// base head.
    pub async fn ensure_sandbox(
        &self,
        repo_path: &Path,
        task_id: &str,
        rendered: &RenderedSandbox,
    ) -> Result<SandboxHandle, SandboxError> {
        if let Some(existing) = self.get(task_id).await {
            let repo = repo_path.to_path_buf();
            let base_commit = existing.base_commit.clone();
            let still_ancestor =
                tokio::task::spawn_blocking(move || is_ancestor_of_head(&repo, &base_commit))
                    .await??;
            if still_ancestor {
                // A step run against this same sandbox earlier (`push_branch`
                // names the detached HEAD before pushing) may have left the
                // worktree checked out on a named branch. Re-detach before
                // handing it back out, since a later task-bound spawn reusing
                // this handle must always see a detached HEAD.
                let wt_path = existing.path.clone();
                let base = existing.base_commit.clone();
                tokio::task::spawn_blocking(move || force_detach(&wt_path, &base)).await??;
                let repo_for_assert = existing.path.clone();
                let detached =
                    tokio::task::spawn_blocking(move || is_detached(&repo_for_assert)).await??;
                if !detached {
                    return Err(SandboxError::DetachedHeadInvariantViolated {
                        task_id: task_id.to_string(),
                    });
                }
                return Ok(existing);
            }
            warn!(task_id, "sandbox base commit stale; recreating");
            self.destroy_sandbox(task_id, false).await?;
        }

        tokio::fs::create_dir_all(&self.root).await?;
        let worktree_path = self.root.join(task_id);

        let repo = repo_path.to_path_buf();
        let wt_path = worktree_path.clone();
        let base_commit = tokio::task::spawn_blocking(move || {
            create_detached_worktree(&repo, &wt_path)
        })
        .await??;

        let repo_for_assert = worktree_path.clone();
        let detached =
            tokio::task::spawn_blocking(move || is_detached(&repo_for_assert)).await??;
        if !detached {
            return Err(SandboxError::DetachedHeadInvariantViolated {
                task_id: task_id.to_string(),
            });
        }

        let handle = SandboxHandle {
            task_id: task_id.to_string(),
            path: worktree_path,
            base_commit,
        };
        write_sandbox_files(&handle, rendered).await?;

        self.sandboxes
            .write()
            .await
            .insert(task_id.to_string(), handle.clone());
        info!(task_id, path = %handle.path.display(), "sandbox ready");
        Ok(handle)
    }

    /// Create a named branch from the sandbox's detached HEAD and push it,
    /// then remove the worktree. With `push_commits = false`, just removes.
    pub async fn destroy_sandbox(
        &self,
        task_id: &str,
        push_commits: bool,
    ) -> Result<(), SandboxError> {
        let handle = match self.get(task_id).await {
            Some(h) => h,
            None => return Ok(()),
        };

        if push_commits {
            let repo_path = handle.path.clone();
            let branch_name = format!("sched/{task_id}");
            let has_commits = tokio::task::spawn_blocking({
                let repo_path = repo_path.clone();
                let base = handle.base_commit.clone();
                move || has_commits_ahead(&repo_path, &base)
            })
            .await??;
            if has_commits {
                self.push_branch_inner(&repo_path, &branch_name).await?;
            }
        }

        let wt_path = handle.path.clone();
        tokio::task::spawn_blocking(move || remove_worktree(&wt_path)).await??;
        self.sandboxes.write().await.remove(task_id);
        debug!(task_id, "sandbox destroyed");
        Ok(())
    }

    /// Used directly by the `push_branch` step: names the detached HEAD and
    /// pushes it, without destroying the sandbox.
    pub async fn push_branch(&self, task_id: &str, branch_name: &str) -> Result<(), SandboxError> {
        let handle = self
            .get(task_id)
            .await
            .ok_or_else(|| SandboxError::NotFound {
                task_id: task_id.to_string(),
            })?;
        self.push_branch_inner(&handle.path, branch_name).await
    }

    async fn push_branch_inner(
        &self,
        worktree_path: &Path,
        branch_name: &str,
    ) -> Result<(), SandboxError> {
        let wt = worktree_path.to_path_buf();
        let branch = branch_name.to_string();
        tokio::task::spawn_blocking(move || name_branch_from_head(&wt, &branch)).await??;

        let output = tokio::process::Command::new("git")
            .arg("push")
            .arg("origin")
            .arg(branch_name)
            .current_dir(worktree_path)
            .output()
            .await?;
        if !output.status.success() {
            return Err(SandboxError::Push(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }
        Ok(())
    }
}

async fn write_sandbox_files(
    handle: &SandboxHandle,
    rendered: &RenderedSandbox,
) -> Result<(), SandboxError> {
    let dot_sched = handle.path.join(".sched");
    tokio::fs::create_dir_all(&dot_sched).await?;
    tokio::fs::write(handle.prompt_path(), &rendered.prompt).await?;
    let mut manifest = rendered.manifest.clone();
    if let Some(obj) = manifest.as_object_mut() {
        obj.insert(
            "base_commit".to_string(),
            serde_json::Value::String(handle.base_commit.clone()),
        );
    }
    tokio::fs::write(handle.manifest_path(), serde_json::to_vec_pretty(&manifest)?).await?;
    tokio::fs::write(handle.env_path(), &rendered.env_file).await?;
    for (name, contents) in &rendered.helper_scripts {
        tokio::fs::write(dot_sched.join(name), contents).await?;
    }
    Ok(())
}

fn create_detached_worktree(repo_path: &Path, wt_path: &Path) -> Result<String, SandboxError> {
    let repo = git2::Repository::open(repo_path)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    let commit_oid = head_commit.id().to_string();

    let wt_name = wt_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("sandbox")
        .to_string();

    let mut opts = git2::WorktreeAddOptions::new();
    // No `.reference(...)`: the worktree is added without checking out a
    // branch, leaving it on a detached commit that we set explicitly below.
    let worktree = repo.worktree(&wt_name, wt_path, Some(&mut opts))?;
    let wt_repo = git2::Repository::open_from_worktree(&worktree)?;
    wt_repo.set_head_detached(head_commit.id())?;
    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    wt_repo.checkout_head(Some(&mut checkout))?;

    Ok(commit_oid)
}

fn is_detached(worktree_path: &Path) -> Result<bool, SandboxError> {
    let repo = git2::Repository::open(worktree_path)?;
    Ok(repo.head_detached()?)
}

/// Re-detaches the worktree's HEAD onto `commit_oid`, undoing any named
/// branch checkout a step (e.g. `push_branch`) may have left behind.
fn force_detach(worktree_path: &Path, commit_oid: &str) -> Result<(), SandboxError> {
    let repo = git2::Repository::open(worktree_path)?;
    let oid = git2::Oid::from_str(commit_oid)?;
    if repo.head_detached()? && repo.head()?.peel_to_commit()?.id() == oid {
        return Ok(());
    }
    repo.set_head_detached(oid)?;
    let mut checkout = git2::build::CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))?;
    Ok(())
}

fn is_ancestor_of_head(repo_path: &Path, commit_oid: &str) -> Result<bool, SandboxError> {
    let repo = git2::Repository::open(repo_path)?;
    let head = repo.head()?.peel_to_commit()?.id();
    let base = git2::Oid::from_str(commit_oid)?;
    if base == head {
        return Ok(true);
    }
    Ok(repo.graph_descendant_of(head, base)?)
}

fn has_commits_ahead(worktree_path: &Path, base_commit: &str) -> Result<bool, SandboxError> {
    let repo = git2::Repository::open(worktree_path)?;
    let head = repo.head()?.peel_to_commit()?.id();
    let base = git2::Oid::from_str(base_commit)?;
    Ok(head != base)
}

fn name_branch_from_head(worktree_path: &Path, branch_name: &str) -> Result<(), SandboxError> {
    let repo = git2::Repository::open(worktree_path)?;
    let head_commit = repo.head()?.peel_to_commit()?;
    match repo.branch(branch_name, &head_commit, false) {
        Ok(_) => {}
        Err(e) if e.code() == git2::ErrorCode::Exists => {}
        Err(e) => return Err(e.into()),
    }
    repo.set_head(&format!("refs/heads/{branch_name}"))?;
    Ok(())
}

fn remove_worktree(wt_path: &Path) -> Result<(), SandboxError> {
    if wt_path.exists() {
        std::fs::remove_dir_all(wt_path)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
