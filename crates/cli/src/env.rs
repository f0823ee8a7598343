// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment variable access for the CLI, mirroring the daemon's
//! resolution order so both sides agree on the control socket path.

use std::path::PathBuf;

/// Control socket path: `$XDG_RUNTIME_DIR/wormhole.sock`, falling back to
/// `/tmp/wormhole.sock` when unset.
pub fn control_socket_path() -> PathBuf {
    let base = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(base).join("wormhole.sock")
}
