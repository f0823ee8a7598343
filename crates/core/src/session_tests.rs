// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;

#[test]
fn session_name_compares_to_str() {
    let name = SessionName::new("frontend");
    assert_eq!(name, "frontend");
    assert_eq!(name, *"frontend");
}

#[test]
fn session_name_borrows_as_str_for_map_lookup() {
    use std::collections::HashMap;
    let mut map: HashMap<SessionName, u32> = HashMap::new();
    map.insert(SessionName::new("a"), 1);
    assert_eq!(map.get("a"), Some(&1));
}

#[test]
fn default_state_is_idle() {
    assert_eq!(SessionState::default(), SessionState::Idle);
}

#[test]
fn state_serializes_snake_case() {
    let json = serde_json::to_string(&SessionState::AwaitingApproval).unwrap();
    assert_eq!(json, "\"awaiting_approval\"");
}

#[test]
fn descriptor_round_trips_through_json() {
    let desc = SessionDescriptor::new(
        SessionName::new("a"),
        std::path::PathBuf::from("/tmp/a"),
        DateTime::UNIX_EPOCH,
    );
    let json = serde_json::to_string(&desc).unwrap();
    let back: SessionDescriptor = serde_json::from_str(&json).unwrap();
    assert_eq!(back.name, desc.name);
    assert_eq!(back.directory, desc.directory);
    assert_eq!(back.cost, 0.0);
    assert!(back.agent_session_id.is_none());
}

#[test]
fn descriptor_tolerates_missing_optional_fields() {
    let json = r#"{"name":"a","directory":"/tmp/a","created_at":"1970-01-01T00:00:00Z"}"#;
    let desc: SessionDescriptor = serde_json::from_str(json).unwrap();
    assert_eq!(desc.cost, 0.0);
    assert!(desc.agent_session_id.is_none());
    assert!(desc.startup_options.is_empty());
}
