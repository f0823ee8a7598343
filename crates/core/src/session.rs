// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session identity and the descriptor persisted across restarts.
//!
//! A session is the daemon's local handle for one agent instance running in
//! one working directory. `SessionName` is client-chosen and unique; it is
//! distinct from `agent_session_id`, which is opaque and assigned by the
//! agent itself once it initialises.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Unique, client-chosen, printable identifier for a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionName(pub String);

impl SessionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SessionName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for SessionName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for SessionName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for SessionName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Opaque identifier the agent assigns to itself once it initialises.
///
/// Once observed, this is never overwritten by a lower-confidence value
/// (i.e. once `Some`, a restart only ever replaces it with another `Some`
/// supplied directly by the agent, never clears it back to `None`).
pub type AgentSessionId = String;

/// The session's state machine. See the module-level table in the daemon
/// crate's `session` module for the full transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Working,
    AwaitingApproval,
    Error,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Opaque bag of options the agent was started with, retained verbatim so a
/// restart can reuse the original intent. The core never interprets these
/// fields beyond passing them back to the agent adapter.
pub type StartupOptions = serde_json::Map<String, serde_json::Value>;

/// The persisted shape of a session: everything needed to restore it across
/// a daemon restart. Mirrors the on-disk registry entry (see
/// `wormhole-daemon::registry`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescriptor {
    pub name: SessionName,
    pub directory: std::path::PathBuf,
    #[serde(default)]
    pub agent_session_id: Option<AgentSessionId>,
    #[serde(default)]
    pub cost: f64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub startup_options: StartupOptions,
}

impl SessionDescriptor {
    pub fn new(name: SessionName, directory: std::path::PathBuf, now: DateTime<Utc>) -> Self {
        Self {
            name,
            directory,
            agent_session_id: None,
            cost: 0.0,
            created_at: now,
            startup_options: StartupOptions::new(),
        }
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
