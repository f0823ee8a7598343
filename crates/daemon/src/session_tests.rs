// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::agent::FakeAgentAdapter;
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;
use wormhole_core::FakeClock;

fn harness(
    scripted_messages: Vec<serde_json::Value>,
) -> (Arc<Session<FakeClock>>, Arc<EventLog>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let event_log = Arc::new(EventLog::new(dir.path()));
    let registry = Arc::new(SessionRegistry::new(dir.path()));
    let broadcaster = Arc::new(Broadcaster::new());
    let adapter: Arc<dyn AgentAdapter> = Arc::new(FakeAgentAdapter::new(scripted_messages));

    let session = Arc::new(
        Session::new(
            SessionName::new("demo"),
            dir.path().to_path_buf(),
            FakeClock::new(),
            adapter,
            Arc::clone(&event_log),
            registry,
            broadcaster,
            1024 * 1024,
        )
        .unwrap(),
    );
    (session, event_log, dir)
}

#[tokio::test]
async fn starts_idle_and_moves_to_working_on_query() {
    let (session, _log, _dir) = harness(vec![json!({"subtype": "assistant"})]);
    assert_eq!(session.state().await, SessionState::Idle);

    session.start(StartupOptions::new()).await.unwrap();
    session.query("hello").await.unwrap();
    assert_eq!(session.state().await, SessionState::Working);
}

#[tokio::test]
async fn events_are_sequenced_and_persisted() {
    let (session, _log, _dir) =
        harness(vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]);
    session.start(StartupOptions::new()).await.unwrap();
    session.query("go").await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let events = session.get_events_since(0).await.unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].sequence, 1);
    assert_eq!(events[2].sequence, 3);
}

#[tokio::test]
async fn get_events_since_current_sequence_is_empty() {
    let (session, _log, _dir) = harness(vec![json!({"a": 1})]);
    session.start(StartupOptions::new()).await.unwrap();
    session.query("go").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let latest = session.get_events_since(0).await.unwrap().last().unwrap().sequence;
    assert!(session.get_events_since(latest).await.unwrap().is_empty());
}

#[tokio::test]
async fn buffer_eviction_does_not_affect_durable_log() {
    // A tiny buffer cap forces eviction after the very first event.
    let dir = tempdir().unwrap();
    let event_log = Arc::new(EventLog::new(dir.path()));
    let registry = Arc::new(SessionRegistry::new(dir.path()));
    let broadcaster = Arc::new(Broadcaster::new());
    let adapter: Arc<dyn AgentAdapter> =
        Arc::new(FakeAgentAdapter::new(vec![json!({"a": 1}), json!({"a": 2}), json!({"a": 3})]));
    let tiny = Arc::new(
        Session::new(
            SessionName::new("tiny"),
            dir.path().to_path_buf(),
            FakeClock::new(),
            adapter,
            Arc::clone(&event_log),
            registry,
            broadcaster,
            1,
        )
        .unwrap(),
    );
    tiny.start(StartupOptions::new()).await.unwrap();
    tiny.query("go").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Fallback path (log.load) must still report every event even though
    // the in-memory buffer only kept the most recent one.
    let persisted = event_log.load("tiny", 0).unwrap();
    assert_eq!(persisted.len(), 3);
}

#[tokio::test]
async fn permission_request_is_broadcast_and_resolvable() {
    let dir = tempdir().unwrap();
    let event_log = Arc::new(EventLog::new(dir.path()));
    let registry = Arc::new(SessionRegistry::new(dir.path()));
    let broadcaster = Arc::new(Broadcaster::new());

    struct PermissionAdapter;
    #[async_trait::async_trait]
    impl AgentAdapter for PermissionAdapter {
        async fn connect(
            &self,
            _directory: &std::path::Path,
            _options: &StartupOptions,
            _resume: Option<&str>,
        ) -> Result<crate::agent::AgentHandle, crate::agent::AgentError> {
            let (to_agent_tx, mut to_agent_rx) = tokio::sync::mpsc::channel(8);
            let (from_agent_tx, from_agent_rx) = tokio::sync::mpsc::channel(8);
            tokio::spawn(async move {
                while let Some(cmd) = to_agent_rx.recv().await {
                    if let crate::agent::AgentCommand::Query(_) = cmd {
                        let (respond_tx, respond_rx) = tokio::sync::oneshot::channel();
                        let _ = from_agent_tx
                            .send(AgentEvent::PermissionRequest {
                                tool_name: "bash".to_string(),
                                tool_input: json!({"command": "ls"}),
                                respond: respond_tx,
                            })
                            .await;
                        let _ = respond_rx.await;
                        let _ = from_agent_tx.send(AgentEvent::Ended).await;
                        break;
                    }
                }
            });
            Ok(crate::agent::AgentHandle { to_agent: to_agent_tx, from_agent: from_agent_rx })
        }
    }

    let session = Arc::new(
        Session::new(
            SessionName::new("perm"),
            dir.path().to_path_buf(),
            FakeClock::new(),
            Arc::new(PermissionAdapter),
            event_log,
            registry,
            broadcaster,
            1024,
        )
        .unwrap(),
    );
    session.start(StartupOptions::new()).await.unwrap();
    session.query("do something").await.unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(session.state().await, SessionState::AwaitingApproval);

    let pending = session.get_pending_permissions().await;
    assert_eq!(pending.len(), 1);
    let request_id = pending[0].request_id;

    assert!(session.respond_to_permission(request_id, Decision::Allow).await);
    assert!(session.get_pending_permissions().await.is_empty());
}

#[tokio::test]
async fn respond_to_unknown_permission_returns_false() {
    let (session, _log, _dir) = harness(vec![]);
    let unknown = uuid::Uuid::new_v4();
    assert!(!session.respond_to_permission(unknown, Decision::Deny).await);
}

#[tokio::test]
async fn restart_preserves_the_sequence_counter() {
    let dir = tempdir().unwrap();
    let event_log = Arc::new(EventLog::new(dir.path()));
    let registry = Arc::new(SessionRegistry::new(dir.path()));
    let broadcaster = Arc::new(Broadcaster::new());
    let adapter: Arc<dyn AgentAdapter> = Arc::new(FakeAgentAdapter::new(vec![json!({"a": 1})]));

    let session = Arc::new(
        Session::new(
            SessionName::new("restartable"),
            dir.path().to_path_buf(),
            FakeClock::new(),
            adapter,
            Arc::clone(&event_log),
            registry,
            broadcaster,
            1024,
        )
        .unwrap(),
    );
    session.start(StartupOptions::new()).await.unwrap();
    session.query("one").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    session.restart().await.unwrap();
    session.query("two").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let events = event_log.load("restartable", 0).unwrap();
    // Sequence numbers must not reset across the restart.
    let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
    for window in sequences.windows(2) {
        assert!(window[1] > window[0]);
    }
}
