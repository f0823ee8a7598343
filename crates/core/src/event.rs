// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted unit of a session's history: one agent message plus the
//! daemon-assigned sequence and timestamp.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One message from the agent, tagged with its position in the session's
/// history.
///
/// Sequences are strictly positive, unique per session, and form a
/// contiguous prefix `1..N` with no gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Opaque JSON object produced by the agent. The core does not validate
    /// its contents beyond extracting `subtype`, `data.session_id`, and
    /// `total_cost_usd` during the receive pump.
    pub message: serde_json::Value,
}

impl Event {
    pub fn new(sequence: u64, timestamp: DateTime<Utc>, message: serde_json::Value) -> Self {
        Self { sequence, timestamp, message }
    }

    /// Normalise an arbitrary agent message into a JSON object: maps pass
    /// through, everything else is wrapped as `{"raw": "<stringified>"}`.
    pub fn normalise_message(raw: serde_json::Value) -> serde_json::Value {
        match raw {
            serde_json::Value::Object(_) => raw,
            other => {
                let stringified = match &other {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                serde_json::json!({ "raw": stringified })
            }
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
