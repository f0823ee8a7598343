// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! An in-flight `can_use_tool` call suspended until a peer resolves it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A client's decision on a pending permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

/// The outcome handed back to the agent's `can_use_tool` callback.
#[derive(Debug, Clone, PartialEq)]
pub enum PermissionOutcome {
    /// Allow with the tool input unchanged.
    Allow,
    /// Deny with a reason and whether the agent should treat it as an
    /// interrupt. The daemon always denies with `interrupt=false`.
    Deny { reason: String, interrupt: bool },
}

impl PermissionOutcome {
    pub fn from_decision(decision: Decision) -> Self {
        match decision {
            Decision::Allow => Self::Allow,
            Decision::Deny => {
                Self::Deny { reason: "User denied".to_string(), interrupt: false }
            }
        }
    }
}

/// The public, serialisable shape of a pending permission: the private
/// completion handle that resolves it lives only in the owning session
/// (see `wormhole-daemon::session::PendingPermission`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingPermission {
    pub request_id: Uuid,
    pub tool_name: String,
    pub tool_input: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
