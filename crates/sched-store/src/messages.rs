// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

//! Mailbox primitives used by orchestrator-side jobs to surface events and
//! to deliver rejection feedback through a message thread.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Unread,
    Read,
    Actioned,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub to: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub status: MessageStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serializes_with_type_keyword_renamed() {
        let msg = Message {
            id: None,
            to: "gatekeeper".to_string(),
            message_type: "rejection_feedback".to_string(),
            body: "tests fail".to_string(),
            task_id: Some("t1".to_string()),
            status: MessageStatus::Unread,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "rejection_feedback");
        assert!(json.get("id").is_none());
    }
}
