// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The public, per-peer frame protocol.
//!
//! Frames are newline-delimited JSON objects discriminated by a `type` tag,
//! following the same tagging convention as the control protocol.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wormhole_core::{Decision, PendingPermission, SessionState};

/// A set of session names a peer wants to receive events for, or everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Subscription {
    Names(Vec<String>),
    All(AllMarker),
}

/// Serializes/deserializes as the literal string `"*"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllMarker;

impl Serialize for AllMarker {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str("*")
    }
}

impl<'de> Deserialize<'de> for AllMarker {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        if s == "*" {
            Ok(AllMarker)
        } else {
            Err(serde::de::Error::custom("expected \"*\""))
        }
    }
}

/// Frames sent by a client to the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    Hello { client_version: String, device_name: String },
    Subscribe { sessions: Subscription },
    Input { session: String, text: String },
    PermissionResponse { request_id: Uuid, decision: Decision },
    Control { session: String, action: ControlAction },
    Sync { session: String, last_seen_sequence: u64 },
    /// Reply to a server `Ping`. Carries no data; receiving one just
    /// refreshes the peer's `last_seen` deadline.
    Pong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAction {
    Interrupt,
    Compact,
    Clear,
    Plan,
}

/// Snapshot of one session as reported in `welcome` and `list_sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub name: String,
    pub directory: std::path::PathBuf,
    pub state: SessionState,
    pub agent_session_id: Option<String>,
    pub cost: f64,
    pub last_activity: Option<chrono::DateTime<chrono::Utc>>,
    pub pending_permissions: Vec<PendingPermission>,
}

/// Frames sent by the daemon to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Welcome { server_version: String, machine_name: String, sessions: Vec<SessionSummary> },
    Event { session: String, sequence: u64, timestamp: chrono::DateTime<chrono::Utc>, message: serde_json::Value },
    PermissionRequest { request_id: Uuid, tool_name: String, tool_input: serde_json::Value, session_name: String },
    SyncResponse {
        session: String,
        events: Vec<wormhole_core::Event>,
        pending_permissions: Vec<PendingPermission>,
        oldest_available_sequence: u64,
    },
    Error {
        code: wormhole_core::ErrorCode,
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<serde_json::Value>,
    },
    Ping,
    Pong,
}
