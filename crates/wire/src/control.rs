// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The local control-socket request/response protocol.

use crate::frame::SessionSummary;
use serde::{Deserialize, Serialize};
use wormhole_core::ErrorCode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    OpenSession {
        name: String,
        directory: std::path::PathBuf,
        #[serde(default)]
        options: Option<serde_json::Value>,
    },
    CloseSession {
        name: String,
    },
    ListSessions,
    GetStatus,
    QuerySession {
        name: String,
        text: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    Success {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
    SessionList {
        sessions: Vec<SessionSummary>,
    },
    Status {
        running: bool,
        port: u16,
        machine_name: String,
        session_count: usize,
        connected_clients: usize,
    },
}
