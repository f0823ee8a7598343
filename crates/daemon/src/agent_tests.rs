// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use serde_json::json;
use std::path::PathBuf;

fn empty_options() -> StartupOptions {
    StartupOptions::new()
}

#[test]
fn resolve_command_reads_options_array() {
    let mut options = empty_options();
    options.insert("command".to_string(), json!(["echo", "hi"]));
    let command = ProcessAgentAdapter::resolve_command(&options).unwrap();
    assert_eq!(command, vec!["echo".to_string(), "hi".to_string()]);
}

#[test]
fn resolve_command_errors_when_unconfigured() {
    std::env::remove_var("WORMHOLE_AGENT_COMMAND");
    let err = ProcessAgentAdapter::resolve_command(&empty_options()).unwrap_err();
    assert!(matches!(err, AgentError::NotConfigured(_)));
}

#[tokio::test]
async fn process_adapter_spawns_and_streams_stdout_lines() {
    let mut options = empty_options();
    options.insert(
        "command".to_string(),
        json!(["sh", "-c", "echo '{\"subtype\":\"init\",\"data\":{\"session_id\":\"abc\"}}'"]),
    );
    let adapter = ProcessAgentAdapter::new();
    let mut handle = adapter.connect(&PathBuf::from("."), &options, None).await.unwrap();

    let event = handle.from_agent.recv().await.unwrap();
    match event {
        AgentEvent::Message(value) => {
            assert_eq!(value["subtype"], json!("init"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn process_adapter_reports_clean_end_of_stream() {
    let mut options = empty_options();
    options.insert("command".to_string(), json!(["sh", "-c", "true"]));
    let adapter = ProcessAgentAdapter::new();
    let mut handle = adapter.connect(&PathBuf::from("."), &options, None).await.unwrap();

    let event = handle.from_agent.recv().await.unwrap();
    assert!(matches!(event, AgentEvent::Ended));
}

#[tokio::test]
async fn fake_adapter_replays_scripted_messages_after_first_query() {
    let adapter = FakeAgentAdapter::new(vec![json!({"a": 1}), json!({"a": 2})]);
    let mut handle =
        adapter.connect(&PathBuf::from("."), &empty_options(), None).await.unwrap();

    handle.to_agent.send(AgentCommand::Query("hello".to_string())).await.unwrap();

    let first = handle.from_agent.recv().await.unwrap();
    let second = handle.from_agent.recv().await.unwrap();
    let third = handle.from_agent.recv().await.unwrap();

    assert!(matches!(first, AgentEvent::Message(v) if v == json!({"a": 1})));
    assert!(matches!(second, AgentEvent::Message(v) if v == json!({"a": 2})));
    assert!(matches!(third, AgentEvent::Ended));
}
