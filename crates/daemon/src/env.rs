// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Default public frame-endpoint port.
pub const DEFAULT_PORT: u16 = 7117;

/// Default in-memory replay buffer cap per session, in bytes.
pub const DEFAULT_BUFFER_BYTES: usize = 2 * 1024 * 1024;

/// Keep-alive ping interval and pong grace period on the public endpoint.
pub const PING_INTERVAL_SECS: u64 = 30;
pub const PONG_TIMEOUT_SECS: u64 = 60;

/// Public frame-endpoint port: `WORMHOLE_PORT`, default 7117.
pub fn port() -> u16 {
    std::env::var("WORMHOLE_PORT").ok().and_then(|s| s.parse().ok()).unwrap_or(DEFAULT_PORT)
}

/// Per-user data directory: `WORMHOLE_STATE_DIR` > `XDG_DATA_HOME/wormhole` >
/// `~/.local/share/wormhole`. Holds `sessions.json`, `events/`, the PID file,
/// and the log file.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WORMHOLE_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("wormhole");
    }
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("wormhole")
}

/// Control socket path: `$XDG_RUNTIME_DIR/wormhole.sock`, falling back to
/// `/tmp/wormhole.sock` when unset, exactly as the original `control.py`
/// resolves it.
pub fn control_socket_path() -> PathBuf {
    let base = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(base).join("wormhole.sock")
}

/// Per-session in-memory replay buffer cap, in bytes: `WORMHOLE_BUFFER_BYTES`.
pub fn buffer_bytes() -> usize {
    std::env::var("WORMHOLE_BUFFER_BYTES")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_BUFFER_BYTES)
}

/// Whether mDNS service announcement should be disabled.
pub fn discovery_disabled() -> bool {
    std::env::var("WORMHOLE_NO_DISCOVERY").is_ok_and(|v| v != "0" && !v.is_empty())
}

/// Tracing filter directive: `WORMHOLE_LOG` > `RUST_LOG` > `"info"`.
pub fn log_filter() -> String {
    std::env::var("WORMHOLE_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string())
}

/// The name the daemon announces itself under: `WORMHOLE_MACHINE_NAME`, then
/// the OS hostname, then a fixed fallback.
pub fn machine_name() -> String {
    if let Ok(name) = std::env::var("WORMHOLE_MACHINE_NAME") {
        return name;
    }
    if let Ok(name) = std::env::var("HOSTNAME") {
        return name;
    }
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|_| "wormhole".to_string())
}
