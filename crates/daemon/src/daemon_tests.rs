// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agent::FakeAgentAdapter;
use tempfile::TempDir;
use wormhole_core::Decision;

async fn boot_empty(state_dir: &std::path::Path) -> Arc<AppState> {
    AppState::boot(
        state_dir.to_path_buf(),
        4242,
        1_000_000,
        Arc::new(FakeAgentAdapter::new(vec![])),
        "test-machine".to_string(),
    )
    .await
    .unwrap()
}

#[tokio::test]
async fn open_session_rejects_duplicate_name() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let state = boot_empty(state_dir.path()).await;

    let first = state.open_session("a".to_string(), work_dir.path().to_path_buf(), None).await;
    assert!(matches!(first, ControlResponse::Success { .. }));

    let second = state.open_session("a".to_string(), work_dir.path().to_path_buf(), None).await;
    match second {
        ControlResponse::Error { code, .. } => assert_eq!(code, ErrorCode::SessionExists),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn open_session_rejects_duplicate_directory_under_a_different_name() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let state = boot_empty(state_dir.path()).await;

    let first = state.open_session("a".to_string(), work_dir.path().to_path_buf(), None).await;
    assert!(matches!(first, ControlResponse::Success { .. }));

    let second = state.open_session("b".to_string(), work_dir.path().to_path_buf(), None).await;
    match second {
        ControlResponse::Error { code, message } => {
            assert_eq!(code, ErrorCode::SessionExists);
            assert!(message.contains('a'));
        }
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn close_session_removes_it_from_the_list() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let state = boot_empty(state_dir.path()).await;

    state.open_session("a".to_string(), work_dir.path().to_path_buf(), None).await;
    let close = state.close_session("a").await;
    assert!(matches!(close, ControlResponse::Success { .. }));

    match state.list_sessions().await {
        ControlResponse::SessionList { sessions } => assert!(sessions.is_empty()),
        other => panic!("expected session list, got {other:?}"),
    }
}

#[tokio::test]
async fn close_session_on_unknown_name_is_session_not_found() {
    let state_dir = TempDir::new().unwrap();
    let state = boot_empty(state_dir.path()).await;

    match state.close_session("missing").await {
        ControlResponse::Error { code, .. } => assert_eq!(code, ErrorCode::SessionNotFound),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn get_status_reports_session_count() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let state = boot_empty(state_dir.path()).await;

    state.open_session("a".to_string(), work_dir.path().to_path_buf(), None).await;
    match state.get_status().await {
        ControlResponse::Status { running, session_count, machine_name, port, .. } => {
            assert!(running);
            assert_eq!(session_count, 1);
            assert_eq!(machine_name, "test-machine");
            assert_eq!(port, 4242);
        }
        other => panic!("expected status, got {other:?}"),
    }
}

struct PermissionAdapter;

#[async_trait::async_trait]
impl AgentAdapter for PermissionAdapter {
    async fn connect(
        &self,
        _directory: &std::path::Path,
        _options: &wormhole_core::StartupOptions,
        _resume: Option<&str>,
    ) -> Result<crate::agent::AgentHandle, crate::agent::AgentError> {
        let (to_agent_tx, mut to_agent_rx) = tokio::sync::mpsc::channel(8);
        let (from_agent_tx, from_agent_rx) = tokio::sync::mpsc::channel(8);
        tokio::spawn(async move {
            while let Some(cmd) = to_agent_rx.recv().await {
                if let crate::agent::AgentCommand::Query(_) = cmd {
                    let (respond_tx, respond_rx) = tokio::sync::oneshot::channel();
                    let _ = from_agent_tx
                        .send(crate::agent::AgentEvent::PermissionRequest {
                            tool_name: "bash".to_string(),
                            tool_input: serde_json::json!({"command": "ls"}),
                            respond: respond_tx,
                        })
                        .await;
                    let _ = respond_rx.await;
                    let _ = from_agent_tx.send(crate::agent::AgentEvent::Ended).await;
                    break;
                }
            }
        });
        Ok(crate::agent::AgentHandle { to_agent: to_agent_tx, from_agent: from_agent_rx })
    }
}

#[tokio::test]
async fn respond_to_permission_finds_the_right_session_without_a_name() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    let state = AppState::boot(
        state_dir.path().to_path_buf(),
        4242,
        1_000_000,
        Arc::new(PermissionAdapter),
        "test-machine".to_string(),
    )
    .await
    .unwrap();

    state.open_session("a".to_string(), work_dir.path().to_path_buf(), None).await;
    state.query_session("a", "do something").await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let session = state.get_session("a").unwrap();
    let pending = session.get_pending_permissions().await;
    assert_eq!(pending.len(), 1);
    let request_id = pending[0].request_id;

    let unmatched = state.respond_to_permission(uuid::Uuid::new_v4(), Decision::Deny).await;
    assert!(!unmatched);

    let matched = state.respond_to_permission(request_id, Decision::Allow).await;
    assert!(matched);
    assert!(session.get_pending_permissions().await.is_empty());
}

#[tokio::test]
async fn boot_drops_sessions_whose_directory_is_gone() {
    let state_dir = TempDir::new().unwrap();
    let ghost_dir = TempDir::new().unwrap();
    {
        let state = boot_empty(state_dir.path()).await;
        state.open_session("a".to_string(), ghost_dir.path().to_path_buf(), None).await;
    }
    drop(ghost_dir);

    let reboot = boot_empty(state_dir.path()).await;
    match reboot.list_sessions().await {
        ControlResponse::SessionList { sessions } => assert!(sessions.is_empty()),
        other => panic!("expected session list, got {other:?}"),
    }
}

#[tokio::test]
async fn boot_restores_a_live_session_from_its_descriptor() {
    let state_dir = TempDir::new().unwrap();
    let work_dir = TempDir::new().unwrap();
    {
        let state = boot_empty(state_dir.path()).await;
        state.open_session("a".to_string(), work_dir.path().to_path_buf(), None).await;
    }

    let reboot = boot_empty(state_dir.path()).await;
    let restored = reboot.get_session("a").unwrap();
    let descriptor = restored.descriptor().await;
    assert_eq!(descriptor.name.as_str(), "a");
    assert_eq!(descriptor.directory, std::fs::canonicalize(work_dir.path()).unwrap());
}
