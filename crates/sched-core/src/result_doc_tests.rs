// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Contributors

use super::*;

#[test]
fn infer_with_commits_is_needs_continuation() {
    let doc = ResultDocument::infer(true);
    assert_eq!(doc.outcome, Outcome::NeedsContinuation);
}

#[test]
fn infer_without_commits_is_failed() {
    let doc = ResultDocument::infer(false);
    assert_eq!(doc.outcome, Outcome::Failed);
}

#[test]
fn deserializes_minimal_document() {
    let json = r#"{"outcome":"done"}"#;
    let doc: ResultDocument = serde_json::from_str(json).unwrap();
    assert_eq!(doc.outcome, Outcome::Done);
    assert!(doc.decision.is_none());
}

#[test]
fn deserializes_full_document() {
    let json = r#"{"outcome":"done","decision":"reject","comment":"tests fail","reason":null}"#;
    let doc: ResultDocument = serde_json::from_str(json).unwrap();
    assert_eq!(doc.decision, Some(Decision::Reject));
    assert_eq!(doc.comment.as_deref(), Some("tests fail"));
}
