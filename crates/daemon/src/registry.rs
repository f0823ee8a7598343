// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persists the set of live session descriptors across restarts.
//!
//! On-disk form is a single JSON document with a version tag, written
//! atomically (temp file + rename) so a crash mid-write never corrupts the
//! previous snapshot.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use wormhole_core::SessionDescriptor;

const CURRENT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    version: u32,
    #[serde(default)]
    sessions: Vec<SessionDescriptor>,
}

/// Persists `sessions.json` under the daemon's state directory.
pub struct SessionRegistry {
    path: PathBuf,
}

impl SessionRegistry {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self { path: state_dir.into().join("sessions.json") }
    }

    /// Load all descriptors. A malformed individual descriptor is dropped
    /// with a warning; a malformed top-level document is treated as empty.
    pub fn load(&self) -> Result<Vec<SessionDescriptor>, RegistryError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(serde_json::Value::Object(mut obj)) => {
                let sessions = obj
                    .remove("sessions")
                    .and_then(|v| v.as_array().cloned())
                    .unwrap_or_default();
                let mut out = Vec::with_capacity(sessions.len());
                for entry in sessions {
                    match serde_json::from_value::<SessionDescriptor>(entry.clone()) {
                        Ok(desc) => out.push(desc),
                        Err(e) => warn!(error = %e, entry = %entry, "dropping malformed session descriptor"),
                    }
                }
                Ok(out)
            }
            Ok(_) | Err(_) => {
                warn!(path = %self.path.display(), "registry document is malformed, treating as empty");
                Ok(Vec::new())
            }
        }
    }

    /// Insert or replace the descriptor for `descriptor.name`.
    pub fn upsert(&self, descriptor: SessionDescriptor) -> Result<(), RegistryError> {
        let mut sessions = self.load()?;
        if let Some(existing) = sessions.iter_mut().find(|s| s.name == descriptor.name) {
            *existing = descriptor;
        } else {
            sessions.push(descriptor);
        }
        self.write_all(&sessions)
    }

    /// Remove the descriptor named `name`, if present.
    pub fn remove(&self, name: &str) -> Result<(), RegistryError> {
        let mut sessions = self.load()?;
        sessions.retain(|s| s.name.as_str() != name);
        self.write_all(&sessions)
    }

    fn write_all(&self, sessions: &[SessionDescriptor]) -> Result<(), RegistryError> {
        let doc = RegistryDocument { version: CURRENT_VERSION, sessions: sessions.to_vec() };
        write_atomic(&self.path, &serde_json::to_vec_pretty(&doc).map_err(|e| {
            io::Error::new(io::ErrorKind::InvalidData, e)
        })?)
    }
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), RegistryError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
