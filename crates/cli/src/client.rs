// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A thin client for the local control socket: one request, one response,
//! one connection, mirroring exactly how the daemon's control handler
//! expects to be spoken to.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::io::BufReader;
use tokio::net::UnixStream;
use wormhole_wire::{read_line_json, write_line_json, ControlRequest, ControlResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon is not running (no socket at {0})")]
    NotRunning(PathBuf),

    #[error("protocol error: {0}")]
    Protocol(#[from] wormhole_wire::ProtocolError),

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("daemon closed the connection without responding")]
    NoResponse,
}

/// Connects to the control socket fresh for every call — the daemon closes
/// the connection after one response, so there is no persistent state to
/// hold here beyond the socket path.
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self { socket_path: socket_path.into() }
    }

    pub async fn send(&self, request: ControlRequest) -> Result<ControlResponse, ClientError> {
        let stream = UnixStream::connect(&self.socket_path)
            .await
            .map_err(|_| ClientError::NotRunning(self.socket_path.clone()))?;
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        write_line_json(&mut writer, &request, REQUEST_TIMEOUT).await?;
        read_line_json(&mut reader, REQUEST_TIMEOUT).await?.ok_or(ClientError::NoResponse)
    }

    pub async fn open_session(
        &self,
        name: String,
        directory: PathBuf,
        options: Option<serde_json::Value>,
    ) -> Result<ControlResponse, ClientError> {
        self.send(ControlRequest::OpenSession { name, directory, options }).await
    }

    pub async fn close_session(&self, name: String) -> Result<ControlResponse, ClientError> {
        self.send(ControlRequest::CloseSession { name }).await
    }

    pub async fn list_sessions(&self) -> Result<ControlResponse, ClientError> {
        self.send(ControlRequest::ListSessions).await
    }

    pub async fn get_status(&self) -> Result<ControlResponse, ClientError> {
        self.send(ControlRequest::GetStatus).await
    }

    pub async fn query_session(
        &self,
        name: String,
        text: String,
    ) -> Result<ControlResponse, ClientError> {
        self.send(ControlRequest::QuerySession { name, text }).await
    }
}

impl ClientError {
    pub fn is_not_running(&self) -> bool {
        matches!(self, ClientError::NotRunning(_))
    }
}

pub fn connect() -> DaemonClient {
    DaemonClient::new(crate::env::control_socket_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connecting_to_a_missing_socket_is_not_running() {
        let client = DaemonClient::new(Path::new("/tmp/wormhole-cli-test-missing.sock"));
        let err = client.send(ControlRequest::ListSessions).await.unwrap_err();
        assert!(err.is_not_running());
    }
}
