// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistent, bidirectional frame loop for one public peer connection:
//! hello/welcome handshake, subscribe/input/permission/control/sync
//! handling, and keep-alive ping/pong.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wormhole_core::ErrorCode;
use wormhole_wire::{
    read_line_json, write_line_json, ClientFrame, ControlAction, ProtocolError, ServerFrame,
};

use crate::daemon::AppState;
use crate::env::{PING_INTERVAL_SECS, PONG_TIMEOUT_SECS};

const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const FRAME_TIMEOUT: Duration = Duration::from_secs(120);

pub async fn handle_connection(stream: TcpStream, state: Arc<AppState>) {
    let peer_addr = stream.peer_addr().ok();
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut writer = write_half;

    let (tx, mut rx) = mpsc::channel::<ServerFrame>(128);
    let peer_id = state.broadcaster().add(tx.clone());
    let cancel = CancellationToken::new();
    let last_seen = Arc::new(Mutex::new(Instant::now()));

    let writer_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write_line_json(&mut writer, &frame, FRAME_TIMEOUT).await.is_err() {
                break;
            }
        }
    });

    let heartbeat = tokio::spawn(heartbeat_loop(
        tx.clone(),
        Arc::clone(&last_seen),
        cancel.clone(),
    ));

    match read_line_json::<_, ClientFrame>(&mut reader, FRAME_TIMEOUT).await {
        Ok(Some(ClientFrame::Hello { client_version, device_name })) => {
            info!(?peer_addr, %client_version, %device_name, "peer connected");
        }
        _ => {
            let _ = tx
                .send(ServerFrame::Error {
                    code: ErrorCode::InvalidMessage,
                    message: "expected hello as the first frame".to_string(),
                    session: None,
                    details: None,
                })
                .await;
            state.broadcaster().remove(peer_id);
            cancel.cancel();
            heartbeat.abort();
            return;
        }
    }

    let _ = tx
        .send(ServerFrame::Welcome {
            server_version: SERVER_VERSION.to_string(),
            machine_name: state.machine_name.clone(),
            sessions: state.welcome_sessions().await,
        })
        .await;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = read_line_json::<_, ClientFrame>(&mut reader, FRAME_TIMEOUT) => frame,
        };

        match frame {
            Ok(Some(frame)) => {
                *last_seen.lock() = Instant::now();
                handle_frame(frame, &state, peer_id, &tx).await;
            }
            Ok(None) => break,
            Err(ProtocolError::Malformed(e)) => {
                debug!(error = %e, "malformed peer frame, continuing");
                let _ = tx
                    .send(ServerFrame::Error {
                        code: ErrorCode::InvalidMessage,
                        message: e.to_string(),
                        session: None,
                        details: None,
                    })
                    .await;
            }
            Err(e) => {
                warn!(error = %e, "peer connection error");
                break;
            }
        }
    }

    cancel.cancel();
    heartbeat.abort();
    writer_task.abort();
    state.broadcaster().remove(peer_id);
    info!(?peer_addr, "peer disconnected");
}

async fn handle_frame(
    frame: ClientFrame,
    state: &AppState,
    peer_id: crate::broadcaster::PeerId,
    tx: &mpsc::Sender<ServerFrame>,
) {
    match frame {
        ClientFrame::Hello { .. } => {}
        // Nothing to do beyond what the caller already did: a successfully
        // parsed frame refreshes `last_seen` regardless of variant.
        ClientFrame::Pong => {}
        ClientFrame::Subscribe { sessions } => {
            state.broadcaster().subscribe(peer_id, sessions);
        }
        ClientFrame::Input { session, text } => {
            let Some(handle) = state.get_session(&session) else {
                let _ = tx
                    .send(ServerFrame::Error {
                        code: ErrorCode::SessionNotFound,
                        message: format!("no such session '{session}'"),
                        session: Some(session),
                        details: None,
                    })
                    .await;
                return;
            };
            tokio::spawn(async move {
                if let Err(e) = handle.query(&text).await {
                    warn!(session = %handle.name, error = %e, "query dispatch failed");
                }
            });
        }
        ClientFrame::PermissionResponse { request_id, decision } => {
            if !state.respond_to_permission(request_id, decision).await {
                let _ = tx
                    .send(ServerFrame::Error {
                        code: ErrorCode::InvalidMessage,
                        message: format!("unknown permission request {request_id}"),
                        session: None,
                        details: None,
                    })
                    .await;
            }
        }
        ClientFrame::Control { session, action } => {
            let Some(handle) = state.get_session(&session) else {
                let _ = tx
                    .send(ServerFrame::Error {
                        code: ErrorCode::SessionNotFound,
                        message: format!("no such session '{session}'"),
                        session: Some(session),
                        details: None,
                    })
                    .await;
                return;
            };
            tokio::spawn(async move {
                match action {
                    ControlAction::Interrupt => handle.interrupt().await,
                    ControlAction::Compact => fire_and_forget(&handle, "/compact").await,
                    ControlAction::Clear => fire_and_forget(&handle, "/clear").await,
                    ControlAction::Plan => fire_and_forget(&handle, "/plan").await,
                }
            });
        }
        ClientFrame::Sync { session, last_seen_sequence } => {
            let Some(handle) = state.get_session(&session) else {
                let _ = tx
                    .send(ServerFrame::Error {
                        code: ErrorCode::SessionNotFound,
                        message: format!("no such session '{session}'"),
                        session: Some(session),
                        details: None,
                    })
                    .await;
                return;
            };
            let events = handle.get_events_since(last_seen_sequence).await.unwrap_or_default();
            let pending = handle.get_pending_permissions().await;
            let oldest = handle.get_oldest_sequence().unwrap_or(0);
            let _ = tx
                .send(ServerFrame::SyncResponse {
                    session,
                    events,
                    pending_permissions: pending,
                    oldest_available_sequence: oldest,
                })
                .await;
        }
    }
}

/// `compact`/`clear`/`plan` are dispatched as fire-and-forget special-text
/// queries, not tracked as a distinct pending operation.
async fn fire_and_forget(session: &Arc<crate::session::Session>, text: &str) {
    if let Err(e) = session.query(text).await {
        warn!(session = %session.name, error = %e, "fire-and-forget control action failed");
    }
}

async fn heartbeat_loop(
    tx: mpsc::Sender<ServerFrame>,
    last_seen: Arc<Mutex<Instant>>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if tx.send(ServerFrame::Ping).await.is_err() {
            cancel.cancel();
            return;
        }
        let elapsed = last_seen.lock().elapsed();
        if elapsed > Duration::from_secs(PONG_TIMEOUT_SECS) {
            warn!("peer missed pong deadline, closing connection");
            cancel.cancel();
            return;
        }
    }
}
