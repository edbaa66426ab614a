// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Narrow adapter over whatever code-forge hosts pull requests. Kept
//! generic (no GitHub/GitLab-specific types) the same way the store
//! adapter stays generic over "the remote task store" — steps call
//! `create_pr`/`merge_pr`/`post_comment` and don't know or care which
//! forge answers.

use async_trait::async_trait;
use sched_store::PrInfo;
use std::sync::Mutex;

#[async_trait]
pub trait PrHost: Send + Sync {
    async fn find_existing_pr(&self, branch: &str) -> Result<Option<PrInfo>, String>;
    async fn create_pr(&self, branch: &str, title: &str, body: &str) -> Result<PrInfo, String>;
    async fn pr_mergeable(&self, pr_number: u64) -> Result<bool, String>;
    async fn merge_pr(&self, pr_number: u64) -> Result<(), String>;
    async fn post_comment(&self, pr_number: u64, body: &str) -> Result<(), String>;
}

/// `reqwest`-backed forge client over a generic REST API, the same shape
/// as [`sched_store::HttpStore`].
pub struct HttpPrHost {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPrHost {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl PrHost for HttpPrHost {
    async fn find_existing_pr(&self, branch: &str) -> Result<Option<PrInfo>, String> {
        let resp = self
            .client
            .get(self.url(&format!("/pulls?branch={branch}")))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let prs: Vec<PrInfo> = resp.json().await.map_err(|e| e.to_string())?;
        Ok(prs.into_iter().next())
    }

    async fn create_pr(&self, branch: &str, title: &str, body: &str) -> Result<PrInfo, String> {
        let payload = serde_json::json!({ "branch": branch, "title": title, "body": body });
        let resp = self
            .client
            .post(self.url("/pulls"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        resp.json().await.map_err(|e| e.to_string())
    }

    async fn pr_mergeable(&self, pr_number: u64) -> Result<bool, String> {
        let resp = self
            .client
            .get(self.url(&format!("/pulls/{pr_number}")))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        let body: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
        Ok(body.get("mergeable").and_then(|v| v.as_bool()).unwrap_or(false))
    }

    async fn merge_pr(&self, pr_number: u64) -> Result<(), String> {
        let resp = self
            .client
            .post(self.url(&format!("/pulls/{pr_number}/merge")))
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("merge failed with status {}", resp.status()));
        }
        Ok(())
    }

    async fn post_comment(&self, pr_number: u64, body: &str) -> Result<(), String> {
        let payload = serde_json::json!({ "body": body });
        let resp = self
            .client
            .post(self.url(&format!("/pulls/{pr_number}/comments")))
            .json(&payload)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if !resp.status().is_success() {
            return Err(format!("comment failed with status {}", resp.status()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum ForgeCall {
    FindExisting(String),
    Create { branch: String, title: String },
    Mergeable(u64),
    Merge(u64),
    Comment { pr_number: u64, body: String },
}

/// In-memory forge double for tests (scenario tests, step unit tests).
pub struct FakePrHost {
    existing: Mutex<Vec<PrInfo>>,
    mergeable: Mutex<bool>,
    merge_fails: Mutex<bool>,
    calls: Mutex<Vec<ForgeCall>>,
}

impl FakePrHost {
    pub fn new() -> Self {
        Self {
            existing: Mutex::new(Vec::new()),
            mergeable: Mutex::new(true),
            merge_fails: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mergeable(&self, mergeable: bool) {
        *self.mergeable.lock().expect("poisoned") = mergeable;
    }

    pub fn set_merge_fails(&self, fails: bool) {
        *self.merge_fails.lock().expect("poisoned") = fails;
    }

    pub fn calls(&self) -> Vec<ForgeCall> {
        self.calls.lock().expect("poisoned").clone()
    }
}

impl Default for FakePrHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrHost for FakePrHost {
    async fn find_existing_pr(&self, branch: &str) -> Result<Option<PrInfo>, String> {
        self.calls
            .lock()
            .expect("poisoned")
            .push(ForgeCall::FindExisting(branch.to_string()));
        Ok(self.existing.lock().expect("poisoned").first().cloned())
    }

    async fn create_pr(&self, branch: &str, title: &str, _body: &str) -> Result<PrInfo, String> {
        self.calls.lock().expect("poisoned").push(ForgeCall::Create {
            branch: branch.to_string(),
            title: title.to_string(),
        });
        let info = PrInfo {
            pr_number: 1,
            pr_url: "https://example.invalid/pulls/1".to_string(),
        };
        self.existing.lock().expect("poisoned").push(info.clone());
        Ok(info)
    }

    async fn pr_mergeable(&self, pr_number: u64) -> Result<bool, String> {
        self.calls.lock().expect("poisoned").push(ForgeCall::Mergeable(pr_number));
        Ok(*self.mergeable.lock().expect("poisoned"))
    }

    async fn merge_pr(&self, pr_number: u64) -> Result<(), String> {
        self.calls.lock().expect("poisoned").push(ForgeCall::Merge(pr_number));
        if *self.merge_fails.lock().expect("poisoned") {
            return Err("merge conflict".to_string());
        }
        Ok(())
    }

    async fn post_comment(&self, pr_number: u64, body: &str) -> Result<(), String> {
        self.calls.lock().expect("poisoned").push(ForgeCall::Comment {
            pr_number,
            body: body.to_string(),
        });
        Ok(())
    }
}
