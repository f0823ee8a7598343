// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handles one connection on the local Unix control socket: a single
//! request, a single response, then the connection closes.

use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::UnixStream;
use tracing::{debug, info, warn};
use wormhole_core::ErrorCode;
use wormhole_wire::{read_line_json, write_line_json, ControlRequest, ControlResponse};

use crate::daemon::AppState;

const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn accept_loop(listener: tokio::net::UnixListener, state: std::sync::Arc<AppState>) {
    loop {
        match listener.accept().await {
            Ok((stream, _addr)) => {
                let state = std::sync::Arc::clone(&state);
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, &state).await {
                        warn!(error = %e, "control connection failed");
                    }
                });
            }
            Err(e) => warn!(error = %e, "control socket accept failed"),
        }
    }
}

async fn handle_connection(
    stream: UnixStream,
    state: &AppState,
) -> Result<(), wormhole_wire::ProtocolError> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let request = match read_line_json::<_, ControlRequest>(&mut reader, CONTROL_TIMEOUT).await? {
        Some(r) => r,
        None => return Ok(()),
    };
    debug!(?request, "control request");

    let response = dispatch(request, state).await;
    write_line_json(&mut writer, &response, CONTROL_TIMEOUT).await
}

async fn dispatch(request: ControlRequest, state: &AppState) -> ControlResponse {
    match request {
        ControlRequest::OpenSession { name, directory, options } => {
            state.open_session(name, directory, options).await
        }
        ControlRequest::CloseSession { name } => state.close_session(&name).await,
        ControlRequest::ListSessions => state.list_sessions().await,
        ControlRequest::GetStatus => state.get_status().await,
        ControlRequest::QuerySession { name, text } => state.query_session(&name, &text).await,
    }
}

pub fn error_response(code: ErrorCode, message: impl Into<String>) -> ControlResponse {
    ControlResponse::Error { code, message: message.into() }
}

pub async fn bind(path: &std::path::Path) -> std::io::Result<tokio::net::UnixListener> {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let listener = tokio::net::UnixListener::bind(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }
    info!(path = %path.display(), "control socket listening");
    Ok(listener)
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
