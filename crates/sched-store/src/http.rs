// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! `reqwest`-backed implementation of [`crate::Store`].

use crate::messages::{Message, MessageStatus};
use crate::retry::with_network_retry;
use crate::{ClaimRequest, PollResult, PrInfo, Store};
use async_trait::async_trait;
use sched_core::{StoreError, Task};
use serde::Serialize;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client over the remote state-store REST API.
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStore {
    pub fn new(base_url: impl Into<String>) -> Result<Self, StoreError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, StoreError> {
        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(resp.text().await.unwrap_or_default()));
        }
        if status == reqwest::StatusCode::CONFLICT {
            return Err(StoreError::Conflict {
                expected: 0,
                actual: 0,
            });
        }
        if status == reqwest::StatusCode::BAD_REQUEST {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Validation(body));
        }
        if !status.is_success() {
            return Err(StoreError::Network(format!(
                "unexpected status {status}"
            )));
        }
        resp.json::<T>()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))
    }

    async fn post_json<B: Serialize + Sync, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, StoreError> {
        with_network_retry(|| async {
            let resp = self
                .client
                .post(self.url(path))
                .json(body)
                .send()
                .await
                .map_err(|e| StoreError::Network(e.to_string()))?;
            Self::parse_response(resp).await
        })
        .await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        with_network_retry(|| async {
            let resp = self
                .client
                .get(self.url(path))
                .send()
                .await
                .map_err(|e| StoreError::Network(e.to_string()))?;
            Self::parse_response(resp).await
        })
        .await
    }
}

#[async_trait]
impl Store for HttpStore {
    async fn claim(&self, req: ClaimRequest<'_>) -> Result<Option<Task>, StoreError> {
        let body = serde_json::json!({
            "blueprint": req.blueprint,
            "role": req.role,
            "from_state": req.from_state,
            "task_type": req.task_type,
        });
        match self.post_json::<_, Task>("/tasks/claim", &body).await {
            Ok(task) => Ok(Some(task)),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn update(
        &self,
        task_id: &str,
        fields: serde_json::Value,
        expected_version: u64,
    ) -> Result<Task, StoreError> {
        let body = serde_json::json!({
            "fields": fields,
            "expected_version": expected_version,
        });
        with_network_retry(|| async {
            let resp = self
                .client
                .patch(self.url(&format!("/tasks/{task_id}")))
                .json(&body)
                .send()
                .await
                .map_err(|e| StoreError::Network(e.to_string()))?;
            Self::parse_response(resp).await
        })
        .await
    }

    async fn submit(&self, task_id: &str, pr_info: PrInfo) -> Result<Task, StoreError> {
        self.post_json(&format!("/tasks/{task_id}/submit"), &pr_info)
            .await
    }

    async fn accept(&self, task_id: &str) -> Result<Task, StoreError> {
        self.post_json(&format!("/tasks/{task_id}/accept"), &serde_json::json!({}))
            .await
    }

    async fn reject(&self, task_id: &str, reason: &str) -> Result<Task, StoreError> {
        self.post_json(
            &format!("/tasks/{task_id}/reject"),
            &serde_json::json!({ "reason": reason }),
        )
        .await
    }

    async fn get(&self, task_id: &str) -> Result<Task, StoreError> {
        self.get_json(&format!("/tasks/{task_id}")).await
    }

    async fn poll(&self, orchestrator_id: &str) -> Result<PollResult, StoreError> {
        self.get_json(&format!("/scheduler/poll?orchestrator_id={orchestrator_id}"))
            .await
    }

    async fn register(
        &self,
        orchestrator_id: &str,
        cluster: &str,
        machine_id: &str,
        capabilities: &[String],
    ) -> Result<(), StoreError> {
        let body = serde_json::json!({
            "orchestrator_id": orchestrator_id,
            "cluster": cluster,
            "machine_id": machine_id,
            "capabilities": capabilities,
        });
        let _: serde_json::Value = self.post_json("/orchestrators/register", &body).await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        to: &str,
        message_type: Option<&str>,
        status: Option<MessageStatus>,
    ) -> Result<Vec<Message>, StoreError> {
        let mut query = format!("/messages?to={to}");
        if let Some(t) = message_type {
            query.push_str(&format!("&type={t}"));
        }
        if let Some(s) = status {
            let s = serde_json::to_value(s)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default();
            query.push_str(&format!("&status={s}"));
        }
        self.get_json(&query).await
    }

    async fn create_message(&self, message: &Message) -> Result<(), StoreError> {
        let _: serde_json::Value = self.post_json("/messages", message).await?;
        Ok(())
    }

    async fn update_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), StoreError> {
        let body = serde_json::json!({ "status": status });
        let _: serde_json::Value = self
            .post_json(&format!("/messages/{message_id}/status"), &body)
            .await?;
        Ok(())
    }
}
