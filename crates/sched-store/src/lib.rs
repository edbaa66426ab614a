// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Typed client over the remote state-store REST API.
//!
//! This crate owns no state of record — every type here is a snapshot of,
//! or a request to, the remote store. The adapter is deliberately narrow:
//! callers get `claim`/`update`/`submit`/`accept`/`reject`/`poll`/
//! `register`/`messages` and nothing else, so every state-mutating call in
//! the scheduler is visible at a glance.

mod http;
mod messages;
mod retry;

pub use http::HttpStore;
pub use messages::{Message, MessageStatus};

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeStore;

use async_trait::async_trait;
use sched_core::{StoreError, Task};
use serde::{Deserialize, Serialize};

/// Arguments for an atomic claim.
#[derive(Debug, Clone)]
pub struct ClaimRequest<'a> {
    pub blueprint: &'a str,
    pub role: &'a str,
    pub from_state: &'a str,
    pub task_type: Option<&'a str>,
}

/// PR info attached when submitting a task for review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrInfo {
    pub pr_number: u64,
    pub pr_url: String,
}

/// Result of a batched poll, cached for the tick.
pub type PollResult = sched_core::PollSummary;

/// Narrow, typed surface over the remote REST API.
///
/// Every method fails with a [`StoreError`] variant; retrying `network`
/// errors is the caller's responsibility (see [`retry`] for the bounded
/// backoff helper used by [`HttpStore`] internally).
#[async_trait]
pub trait Store: Send + Sync {
    async fn claim(&self, req: ClaimRequest<'_>) -> Result<Option<Task>, StoreError>;

    async fn update(
        &self,
        task_id: &str,
        fields: serde_json::Value,
        expected_version: u64,
    ) -> Result<Task, StoreError>;

    async fn submit(&self, task_id: &str, pr_info: PrInfo) -> Result<Task, StoreError>;

    async fn accept(&self, task_id: &str) -> Result<Task, StoreError>;

    async fn reject(&self, task_id: &str, reason: &str) -> Result<Task, StoreError>;

    async fn get(&self, task_id: &str) -> Result<Task, StoreError>;

    async fn poll(&self, orchestrator_id: &str) -> Result<PollResult, StoreError>;

    /// Idempotent presence beacon. Callers should skip this when the prior
    /// poll already confirmed registration (`PollResult::registered`).
    async fn register(
        &self,
        orchestrator_id: &str,
        cluster: &str,
        machine_id: &str,
        capabilities: &[String],
    ) -> Result<(), StoreError>;

    async fn list_messages(
        &self,
        to: &str,
        message_type: Option<&str>,
        status: Option<MessageStatus>,
    ) -> Result<Vec<Message>, StoreError>;

    async fn create_message(&self, message: &Message) -> Result<(), StoreError>;

    async fn update_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), StoreError>;
}
