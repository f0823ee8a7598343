// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable error codes shared across the control socket and the public frame
//! protocol.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    DaemonNotRunning,
    SessionExists,
    SessionNotFound,
    InvalidMessage,
    SdkError,
    ConnectionError,
    InternalError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::DaemonNotRunning => "DAEMON_NOT_RUNNING",
            Self::SessionExists => "SESSION_EXISTS",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::SdkError => "SDK_ERROR",
            Self::ConnectionError => "CONNECTION_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        };
        write!(f, "{s}")
    }
}
