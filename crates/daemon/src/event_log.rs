// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session durable append-only event journal.
//!
//! One JSON object per line: `{"sequence", "timestamp", "message"}`. Writes
//! are append-mode single-line, which is crash-safe on any POSIX filesystem
//! for lines below the platform's atomic write threshold. `latest` is
//! computed by scanning the tail of the file so it stays correct even if the
//! file has been truncated mid-line.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::warn;
use wormhole_core::Event;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`, mirroring the
/// original `persistence.py` sanitisation rule.
pub fn sanitise_session_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// Durable, per-session event journal rooted at `<base_dir>/events/`.
pub struct EventLog {
    base_dir: PathBuf,
}

impl EventLog {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn path_for(&self, session: &str) -> PathBuf {
        self.base_dir.join("events").join(format!("{}.jsonl", sanitise_session_name(session)))
    }

    /// Durably append one event. Must be called in sequence order.
    pub fn append(&self, session: &str, event: &Event) -> Result<(), EventLogError> {
        let path = self.path_for(session);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut line = serde_json::to_vec(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }

    /// All persisted events with `sequence > after_sequence`, in order.
    /// A single unparsable line is logged and skipped, not fatal.
    pub fn load(&self, session: &str, after_sequence: u64) -> Result<Vec<Event>, EventLogError> {
        let path = self.path_for(session);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        let mut events = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Event>(&line) {
                Ok(event) if event.sequence > after_sequence => events.push(event),
                Ok(_) => {}
                Err(e) => warn!(session, lineno, error = %e, "skipping unparsable event log line"),
            }
        }
        Ok(events)
    }

    /// Highest persisted sequence, 0 if none. Scans only the tail of the
    /// file, tolerating a partially-written last line.
    pub fn latest(&self, session: &str) -> Result<u64, EventLogError> {
        let path = self.path_for(session);
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        const TAIL: u64 = 64 * 1024;
        let len = file.metadata()?.len();
        let start = len.saturating_sub(TAIL);
        file.seek(SeekFrom::Start(start))?;
        let mut buf = String::new();
        file.read_to_string(&mut buf).or_else(|_| {
            // Tail may not be valid UTF-8 on its own if we cut mid-line; fall
            // back to reading the whole file.
            file.seek(SeekFrom::Start(0))?;
            buf.clear();
            File::open(&path)?.read_to_string(&mut buf)
        })?;

        for line in buf.lines().rev() {
            if line.is_empty() {
                continue;
            }
            if let Ok(event) = serde_json::from_str::<Event>(line) {
                return Ok(event.sequence);
            }
        }
        Ok(0)
    }

    /// Smallest persisted sequence still on disk, 0 if empty.
    pub fn oldest(&self, session: &str) -> Result<u64, EventLogError> {
        let path = self.path_for(session);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let reader = BufReader::new(file);
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            if let Ok(event) = serde_json::from_str::<Event>(&line) {
                return Ok(event.sequence);
            }
        }
        Ok(0)
    }

    /// Remove all events for `session`.
    pub fn clear(&self, session: &str) -> Result<(), EventLogError> {
        let path = self.path_for(session);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
