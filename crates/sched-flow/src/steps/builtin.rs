// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! The ten named steps a transition's `runs` list may reference. Each
//! takes `(task, result, sandbox_path)` via [`StepContext`] and either
//! succeeds or raises — there is no partial/retry state here, the flow
//! dispatcher decides what a failure means.

use super::{Step, StepContext};
use crate::error::StepError;
use async_trait::async_trait;
use sched_store::PrInfo;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

pub fn all() -> Vec<Arc<dyn Step>> {
    vec![
        Arc::new(PushBranch),
        Arc::new(RunTests),
        Arc::new(CreatePr),
        Arc::new(SubmitToServer),
        Arc::new(PostReviewComment),
        Arc::new(MergePr),
        Arc::new(RejectWithFeedback),
        Arc::new(CreateProjectPr),
        Arc::new(MergeProjectPr),
        Arc::new(RebaseOnProjectBranch),
    ]
}

fn branch_name(task: &sched_core::Task) -> String {
    task.branch
        .clone()
        .unwrap_or_else(|| format!("sched/{}", task.id.as_str()))
}

/// Names the sandbox's detached HEAD and pushes it to `origin`.
struct PushBranch;

#[async_trait]
impl Step for PushBranch {
    fn name(&self) -> &'static str {
        "push_branch"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let branch = branch_name(ctx.task);
        ctx.sandbox
            .push_branch(ctx.task.id.as_str(), &branch)
            .await
            .map_err(|source| StepError::Sandbox {
                step: self.name().to_string(),
                source,
            })?;
        ctx.outputs.set_branch_name(branch);
        Ok(())
    }
}

/// Runs the sandbox's test entry point, if one exists. A missing script
/// is treated as "nothing to run", not a failure.
struct RunTests;

#[async_trait]
impl Step for RunTests {
    fn name(&self) -> &'static str {
        "run_tests"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let script = ctx.sandbox_path.join(".sched").join("run_tests.sh");
        if !script.exists() {
            return Ok(());
        }
        let output = tokio::time::timeout(
            Duration::from_secs(600),
            Command::new(&script).current_dir(ctx.sandbox_path).output(),
        )
        .await
        .map_err(|_| StepError::Subprocess {
            step: self.name().to_string(),
            message: "run_tests.sh timed out after 600s".to_string(),
        })?
        .map_err(|source| StepError::Io {
            step: self.name().to_string(),
            source,
        })?;
        if !output.status.success() {
            return Err(StepError::Subprocess {
                step: self.name().to_string(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

/// Idempotent: checks for an existing PR on the branch before opening a
/// new one.
struct CreatePr;

#[async_trait]
impl Step for CreatePr {
    fn name(&self) -> &'static str {
        "create_pr"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let branch = ctx
            .outputs
            .branch_name()
            .unwrap_or_else(|| branch_name(ctx.task));

        let forge_err = |message: String| StepError::Forge {
            step: self.name().to_string(),
            message,
        };

        let existing = ctx
            .pr_host
            .find_existing_pr(&branch)
            .await
            .map_err(forge_err)?;
        let info = match existing {
            Some(info) => info,
            None => ctx
                .pr_host
                .create_pr(&branch, &ctx.task.title, &ctx.task.body)
                .await
                .map_err(forge_err)?,
        };
        ctx.outputs.set_pr_info(info);
        Ok(())
    }
}

/// Moves the task to `provisional` carrying the PR info `create_pr`
/// recorded.
struct SubmitToServer;

#[async_trait]
impl Step for SubmitToServer {
    fn name(&self) -> &'static str {
        "submit_to_server"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let info = ctx
            .outputs
            .pr_info()
            .or_else(|| match (ctx.task.pr_number, ctx.task.pr_url.clone()) {
                (Some(pr_number), Some(pr_url)) => Some(PrInfo { pr_number, pr_url }),
                _ => None,
            })
            .ok_or_else(|| StepError::Forge {
                step: self.name().to_string(),
                message: "no pr info available; create_pr must run first".to_string(),
            })?;
        ctx.store
            .submit(ctx.task.id.as_str(), info)
            .await
            .map_err(|source| StepError::Store {
                step: self.name().to_string(),
                source,
            })?;
        Ok(())
    }
}

/// Posts the gatekeeper's review comment to the open PR.
struct PostReviewComment;

#[async_trait]
impl Step for PostReviewComment {
    fn name(&self) -> &'static str {
        "post_review_comment"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let Some(pr_number) = ctx.task.pr_number else {
            return Ok(());
        };
        let Some(comment) = ctx.result.comment.as_deref() else {
            return Ok(());
        };
        ctx.pr_host
            .post_comment(pr_number, comment)
            .await
            .map_err(|message| StepError::Forge {
                step: self.name().to_string(),
                message,
            })
    }
}

/// Must not swallow a merge failure: a non-fast-forward or conflicted
/// merge raises so the dispatcher routes to `failed` instead of silently
/// leaving the task in `provisional`.
struct MergePr;

#[async_trait]
impl Step for MergePr {
    fn name(&self) -> &'static str {
        "merge_pr"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let pr_number = ctx.task.pr_number.ok_or_else(|| StepError::Forge {
            step: self.name().to_string(),
            message: "task has no pr_number to merge".to_string(),
        })?;
        ctx.pr_host
            .merge_pr(pr_number)
            .await
            .map_err(|message| StepError::Forge {
                step: self.name().to_string(),
                message,
            })
    }
}

/// Posts the rejection reason to the PR and rewrites the task's prompt
/// body to describe only the outstanding work: workers have been shown
/// to read the original prompt and ignore a prepended rejection notice,
/// so the body is replaced rather than appended to.
struct RejectWithFeedback;

#[async_trait]
impl Step for RejectWithFeedback {
    fn name(&self) -> &'static str {
        "reject_with_feedback"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let reason = ctx
            .result
            .comment
            .clone()
            .or_else(|| ctx.result.reason.clone())
            .unwrap_or_else(|| "no feedback given".to_string());

        if let Some(pr_number) = ctx.task.pr_number {
            ctx.pr_host
                .post_comment(pr_number, &reason)
                .await
                .map_err(|message| StepError::Forge {
                    step: self.name().to_string(),
                    message,
                })?;
        }

        let rewritten_body = format!("{}\n\nAddress this review feedback:\n{reason}", ctx.task.title);
        ctx.store
            .update(
                ctx.task.id.as_str(),
                serde_json::json!({ "body": rewritten_body }),
                ctx.task.version,
            )
            .await
            .map_err(|source| StepError::Store {
                step: self.name().to_string(),
                source,
            })?;
        Ok(())
    }
}

/// Project variant of `create_pr`: opens (or reuses) a PR from the
/// project's integration branch rather than a single task's branch.
struct CreateProjectPr;

#[async_trait]
impl Step for CreateProjectPr {
    fn name(&self) -> &'static str {
        "create_project_pr"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let project_id = ctx.task.project_id.as_deref().ok_or_else(|| StepError::Forge {
            step: self.name().to_string(),
            message: "task has no project_id".to_string(),
        })?;
        let branch = format!("sched/project/{project_id}");

        let forge_err = |message: String| StepError::Forge {
            step: self.name().to_string(),
            message,
        };
        let existing = ctx.pr_host.find_existing_pr(&branch).await.map_err(forge_err)?;
        let info = match existing {
            Some(info) => info,
            None => ctx
                .pr_host
                .create_pr(&branch, &format!("Project {project_id}"), "")
                .await
                .map_err(forge_err)?,
        };
        ctx.outputs.set_pr_info(info);
        Ok(())
    }
}

/// Project variant of `merge_pr`; same no-swallow contract.
struct MergeProjectPr;

#[async_trait]
impl Step for MergeProjectPr {
    fn name(&self) -> &'static str {
        "merge_project_pr"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let pr_number = ctx
            .outputs
            .pr_info()
            .map(|info| info.pr_number)
            .or(ctx.task.pr_number)
            .ok_or_else(|| StepError::Forge {
                step: self.name().to_string(),
                message: "no project pr to merge".to_string(),
            })?;
        ctx.pr_host
            .merge_pr(pr_number)
            .await
            .map_err(|message| StepError::Forge {
                step: self.name().to_string(),
                message,
            })
    }
}

/// Rebases the sandbox's detached HEAD onto the current tip of the
/// project's integration branch before further work continues.
struct RebaseOnProjectBranch;

#[async_trait]
impl Step for RebaseOnProjectBranch {
    fn name(&self) -> &'static str {
        "rebase_on_project_branch"
    }

    async fn run(&self, ctx: &StepContext<'_>) -> Result<(), StepError> {
        let project_id = ctx.task.project_id.as_deref().ok_or_else(|| StepError::Forge {
            step: self.name().to_string(),
            message: "task has no project_id".to_string(),
        })?;
        let upstream = format!("sched/project/{project_id}");

        let output = Command::new("git")
            .arg("rebase")
            .arg(format!("origin/{upstream}"))
            .current_dir(ctx.sandbox_path)
            .output()
            .await
            .map_err(|source| StepError::Io {
                step: self.name().to_string(),
                source,
            })?;
        if !output.status.success() {
            let _ = Command::new("git")
                .arg("rebase")
                .arg("--abort")
                .current_dir(ctx.sandbox_path)
                .output()
                .await;
            return Err(StepError::Subprocess {
                step: self.name().to_string(),
                message: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "builtin_tests.rs"]
mod tests;
