// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! In-memory [`Store`] for tests that exercise the engine without a
//! running HTTP server.

use crate::messages::{Message, MessageStatus};
use crate::{ClaimRequest, PollResult, PrInfo, Store};
use async_trait::async_trait;
use sched_core::{StoreError, Task};
use std::sync::Mutex;

/// Records of calls made against the fake, for assertions in tests.
#[derive(Debug, Clone)]
pub enum StoreCall {
    Claim { blueprint: String, from_state: String },
    Update { task_id: String },
    Submit { task_id: String },
    Accept { task_id: String },
    Reject { task_id: String, reason: String },
}

pub struct FakeStore {
    tasks: Mutex<Vec<Task>>,
    poll: Mutex<PollResult>,
    messages: Mutex<Vec<Message>>,
    calls: Mutex<Vec<StoreCall>>,
}

impl FakeStore {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            poll: Mutex::new(PollResult::default()),
            messages: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().expect("fake store mutex poisoned").clone()
    }

    pub fn set_poll(&self, poll: PollResult) {
        *self.poll.lock().expect("fake store mutex poisoned") = poll;
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks.lock().expect("fake store mutex poisoned").clone()
    }

    fn find_mut<'a>(tasks: &'a mut [Task], task_id: &str) -> Option<&'a mut Task> {
        tasks.iter_mut().find(|t| t.id.as_str() == task_id)
    }
}

#[async_trait]
impl Store for FakeStore {
    async fn claim(&self, req: ClaimRequest<'_>) -> Result<Option<Task>, StoreError> {
        self.calls.lock().expect("poisoned").push(StoreCall::Claim {
            blueprint: req.blueprint.to_string(),
            from_state: req.from_state.to_string(),
        });
        let mut tasks = self.tasks.lock().expect("poisoned");
        let candidate = tasks.iter_mut().find(|t| {
            t.state == req.from_state
                && t.role == req.role
                && !t.is_blocked()
                && req
                    .task_type
                    .map(|tt| t.role == tt)
                    .unwrap_or(true)
        });
        match candidate {
            Some(task) => {
                task.state = "claimed".to_string();
                task.claimed_by = Some(req.blueprint.to_string());
                task.lease_expires_at = Some("9999-01-01T00:00:00Z".to_string());
                task.version += 1;
                Ok(Some(task.clone()))
            }
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        task_id: &str,
        fields: serde_json::Value,
        expected_version: u64,
    ) -> Result<Task, StoreError> {
        self.calls.lock().expect("poisoned").push(StoreCall::Update {
            task_id: task_id.to_string(),
        });
        let mut tasks = self.tasks.lock().expect("poisoned");
        let task = Self::find_mut(&mut tasks, task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        if task.version != expected_version {
            return Err(StoreError::Conflict {
                expected: expected_version,
                actual: task.version,
            });
        }
        if let Some(obj) = fields.as_object() {
            for (k, v) in obj {
                apply_field(task, k, v);
            }
        }
        task.version += 1;
        Ok(task.clone())
    }

    async fn submit(&self, task_id: &str, pr_info: PrInfo) -> Result<Task, StoreError> {
        self.calls.lock().expect("poisoned").push(StoreCall::Submit {
            task_id: task_id.to_string(),
        });
        let mut tasks = self.tasks.lock().expect("poisoned");
        let task = Self::find_mut(&mut tasks, task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        task.state = "provisional".to_string();
        task.pr_number = Some(pr_info.pr_number);
        task.pr_url = Some(pr_info.pr_url);
        task.version += 1;
        Ok(task.clone())
    }

    async fn accept(&self, task_id: &str) -> Result<Task, StoreError> {
        self.calls.lock().expect("poisoned").push(StoreCall::Accept {
            task_id: task_id.to_string(),
        });
        let mut tasks = self.tasks.lock().expect("poisoned");
        let task = Self::find_mut(&mut tasks, task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        task.state = "done".to_string();
        task.version += 1;
        Ok(task.clone())
    }

    async fn reject(&self, task_id: &str, reason: &str) -> Result<Task, StoreError> {
        self.calls.lock().expect("poisoned").push(StoreCall::Reject {
            task_id: task_id.to_string(),
            reason: reason.to_string(),
        });
        let mut tasks = self.tasks.lock().expect("poisoned");
        let task = Self::find_mut(&mut tasks, task_id)
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))?;
        task.state = "incoming".to_string();
        task.claimed_by = None;
        task.lease_expires_at = None;
        task.rejection_count += 1;
        task.failure_reason = Some(reason.to_string());
        task.version += 1;
        Ok(task.clone())
    }

    async fn get(&self, task_id: &str) -> Result<Task, StoreError> {
        let tasks = self.tasks.lock().expect("poisoned");
        tasks
            .iter()
            .find(|t| t.id.as_str() == task_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(task_id.to_string()))
    }

    async fn poll(&self, _orchestrator_id: &str) -> Result<PollResult, StoreError> {
        Ok(self.poll.lock().expect("poisoned").clone())
    }

    async fn register(
        &self,
        _orchestrator_id: &str,
        _cluster: &str,
        _machine_id: &str,
        _capabilities: &[String],
    ) -> Result<(), StoreError> {
        Ok(())
    }

    async fn list_messages(
        &self,
        to: &str,
        message_type: Option<&str>,
        status: Option<MessageStatus>,
    ) -> Result<Vec<Message>, StoreError> {
        let messages = self.messages.lock().expect("poisoned");
        Ok(messages
            .iter()
            .filter(|m| m.to == to)
            .filter(|m| message_type.map(|t| m.message_type == t).unwrap_or(true))
            .filter(|m| status.map(|s| m.status == s).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn create_message(&self, message: &Message) -> Result<(), StoreError> {
        self.messages.lock().expect("poisoned").push(message.clone());
        Ok(())
    }

    async fn update_message_status(
        &self,
        message_id: &str,
        status: MessageStatus,
    ) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().expect("poisoned");
        if let Some(m) = messages
            .iter_mut()
            .find(|m| m.id.as_deref() == Some(message_id))
        {
            m.status = status;
        }
        Ok(())
    }
}

fn apply_field(task: &mut Task, key: &str, value: &serde_json::Value) {
    match key {
        "state" => {
            if let Some(s) = value.as_str() {
                task.state = s.to_string();
            }
        }
        "body" => {
            if let Some(s) = value.as_str() {
                task.body = s.to_string();
            }
        }
        "failure_reason" => task.failure_reason = value.as_str().map(str::to_string),
        "execution_notes" => task.execution_notes = value.as_str().map(str::to_string),
        "blocked_by" => task.blocked_by = value.as_str().map(str::to_string),
        "claimed_by" => task.claimed_by = value.as_str().map(str::to_string),
        "lease_expires_at" => task.lease_expires_at = value.as_str().map(str::to_string),
        "branch" => task.branch = value.as_str().map(str::to_string),
        "pr_number" => task.pr_number = value.as_u64(),
        "pr_url" => task.pr_url = value.as_str().map(str::to_string),
        "rejection_count" => {
            if let Some(n) = value.as_u64() {
                task.rejection_count = n as u32;
            }
        }
        _ => {}
    }
}
