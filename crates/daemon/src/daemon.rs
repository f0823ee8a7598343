// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Top-level supervisor: boots from the persisted registry, owns the set of
//! live sessions, and answers control-plane requests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{info, warn};
use wormhole_core::{ErrorCode, SessionDescriptor, SessionName, SystemClock};
use wormhole_wire::{ControlResponse, SessionSummary};

use crate::agent::AgentAdapter;
use crate::broadcaster::Broadcaster;
use crate::control::error_response;
use crate::event_log::EventLog;
use crate::registry::SessionRegistry;
use crate::session::Session;

pub struct AppState {
    sessions: Mutex<HashMap<String, Arc<Session<SystemClock>>>>,
    broadcaster: Arc<Broadcaster>,
    event_log: Arc<EventLog>,
    registry: Arc<SessionRegistry>,
    agent_adapter: Arc<dyn AgentAdapter>,
    buffer_cap_bytes: usize,
    pub machine_name: String,
    pub port: u16,
}

impl AppState {
    /// Load the registry, reconstruct a session for every descriptor whose
    /// directory still exists (dropping the rest), and reconnect each
    /// agent with `resume` set so conversational context survives a daemon
    /// restart. A single descriptor failing to restore is logged and
    /// skipped rather than aborting the whole boot.
    pub async fn boot(
        state_dir: PathBuf,
        port: u16,
        buffer_cap_bytes: usize,
        agent_adapter: Arc<dyn AgentAdapter>,
        machine_name: String,
    ) -> anyhow::Result<Arc<Self>> {
        let event_log = Arc::new(EventLog::new(&state_dir));
        let registry = Arc::new(SessionRegistry::new(&state_dir));
        let broadcaster = Arc::new(Broadcaster::new());

        let state = Arc::new(Self {
            sessions: Mutex::new(HashMap::new()),
            broadcaster,
            event_log,
            registry,
            agent_adapter,
            buffer_cap_bytes,
            machine_name,
            port,
        });

        let descriptors = state.registry.load()?;
        for descriptor in descriptors {
            if !descriptor.directory.is_dir() {
                warn!(
                    session = %descriptor.name,
                    directory = %descriptor.directory.display(),
                    "dropping session whose directory no longer exists"
                );
                let _ = state.registry.remove(descriptor.name.as_str());
                continue;
            }
            let name = descriptor.name.to_string();
            match state.restore_one(descriptor).await {
                Ok(session) => {
                    state.sessions.lock().insert(name, session);
                }
                Err(e) => warn!(session = %name, error = %e, "failed to restore session, skipping"),
            }
        }

        Ok(state)
    }

    async fn restore_one(
        &self,
        descriptor: SessionDescriptor,
    ) -> anyhow::Result<Arc<Session<SystemClock>>> {
        let session = Arc::new(Session::from_descriptor(
            descriptor,
            SystemClock,
            Arc::clone(&self.agent_adapter),
            Arc::clone(&self.event_log),
            Arc::clone(&self.registry),
            Arc::clone(&self.broadcaster),
            self.buffer_cap_bytes,
        )?);
        session.restart().await?;
        Ok(session)
    }

    fn find_by_directory(&self, canonical: &std::path::Path) -> Option<String> {
        let descriptors = self.registry.load().ok()?;
        descriptors
            .into_iter()
            .find(|d| d.directory == canonical)
            .map(|d| d.name.to_string())
    }

    pub async fn open_session(
        &self,
        name: String,
        directory: PathBuf,
        options: Option<Value>,
    ) -> ControlResponse {
        if self.sessions.lock().contains_key(&name) {
            return error_response(ErrorCode::SessionExists, format!("session '{name}' already exists"));
        }

        let canonical = match std::fs::canonicalize(&directory) {
            Ok(p) => p,
            Err(e) => {
                return error_response(ErrorCode::InvalidMessage, format!("invalid directory: {e}"))
            }
        };

        if let Some(existing) = self.find_by_directory(&canonical) {
            return error_response(
                ErrorCode::SessionExists,
                format!("directory already owned by session '{existing}'"),
            );
        }

        let startup_options = match options {
            Some(Value::Object(map)) => map,
            Some(_) | None => serde_json::Map::new(),
        };

        let session = match Session::new(
            SessionName::new(name.clone()),
            canonical.clone(),
            SystemClock,
            Arc::clone(&self.agent_adapter),
            Arc::clone(&self.event_log),
            Arc::clone(&self.registry),
            Arc::clone(&self.broadcaster),
            self.buffer_cap_bytes,
        ) {
            Ok(s) => Arc::new(s),
            Err(e) => return error_response(ErrorCode::InternalError, e.to_string()),
        };

        if let Err(e) = self.registry.upsert(session.descriptor().await) {
            return error_response(ErrorCode::InternalError, e.to_string());
        }

        if let Err(e) = session.start(startup_options).await {
            return error_response(ErrorCode::SdkError, e.to_string());
        }

        self.sessions.lock().insert(name.clone(), session);
        info!(session = %name, directory = %canonical.display(), "session opened");
        ControlResponse::Success { message: format!("session '{name}' opened"), data: None }
    }

    pub async fn close_session(&self, name: &str) -> ControlResponse {
        let session = self.sessions.lock().remove(name);
        match session {
            Some(session) => {
                session.stop().await;
                let _ = self.registry.remove(name);
                let _ = self.event_log.clear(name);
                ControlResponse::Success { message: format!("session '{name}' closed"), data: None }
            }
            None => error_response(ErrorCode::SessionNotFound, format!("no such session '{name}'")),
        }
    }

    pub async fn list_sessions(&self) -> ControlResponse {
        ControlResponse::SessionList { sessions: self.session_summaries().await }
    }

    async fn session_summaries(&self) -> Vec<SessionSummary> {
        let handles: Vec<Arc<Session<SystemClock>>> =
            self.sessions.lock().values().cloned().collect();
        let mut summaries = Vec::with_capacity(handles.len());
        for session in handles {
            summaries.push(session.snapshot().await);
        }
        summaries
    }

    pub async fn get_status(&self) -> ControlResponse {
        ControlResponse::Status {
            running: true,
            port: self.port,
            machine_name: self.machine_name.clone(),
            session_count: self.sessions.lock().len(),
            connected_clients: self.broadcaster.peer_count(),
        }
    }

    pub async fn query_session(&self, name: &str, text: &str) -> ControlResponse {
        let session = self.sessions.lock().get(name).cloned();
        match session {
            Some(session) => match session.query(text).await {
                Ok(()) => ControlResponse::Success { message: "query dispatched".to_string(), data: None },
                Err(e) => error_response(ErrorCode::SdkError, e.to_string()),
            },
            None => error_response(ErrorCode::SessionNotFound, format!("no such session '{name}'")),
        }
    }

    pub fn get_session(&self, name: &str) -> Option<Arc<Session<SystemClock>>> {
        self.sessions.lock().get(name).cloned()
    }

    /// Resolve a permission response against whichever live session is
    /// holding that request id; request ids are globally unique so at most
    /// one session will match.
    pub async fn respond_to_permission(
        &self,
        request_id: uuid::Uuid,
        decision: wormhole_core::Decision,
    ) -> bool {
        let handles: Vec<Arc<Session<SystemClock>>> =
            self.sessions.lock().values().cloned().collect();
        for session in handles {
            if session.respond_to_permission(request_id, decision).await {
                return true;
            }
        }
        false
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub async fn welcome_sessions(&self) -> Vec<SessionSummary> {
        self.session_summaries().await
    }

    /// Persist every live session's current descriptor, for graceful
    /// shutdown. Unlike `close_session`, this never touches the event log
    /// or removes the registry entry — the session resumes on next boot.
    pub async fn shutdown(&self) {
        let handles: Vec<Arc<Session<SystemClock>>> =
            self.sessions.lock().values().cloned().collect();
        for session in handles {
            session.cancel_pump_and_disconnect().await;
            if let Err(e) = self.registry.upsert(session.descriptor().await) {
                warn!(session = %session.name, error = %e, "failed to persist session on shutdown");
            }
        }
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
