// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owns one agent subprocess — the state machine, sequence assignment,
//! in-memory replay buffer, and permission resolver.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;
use wormhole_core::{
    Clock, Decision, ErrorCode, Event, PendingPermission, PermissionOutcome, SessionDescriptor,
    SessionName, SessionState, StartupOptions,
};

use crate::agent::{AgentAdapter, AgentCommand, AgentEvent};
use crate::broadcaster::Broadcaster;
use crate::event_log::EventLog;
use crate::registry::SessionRegistry;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("agent error: {0}")]
    Agent(#[from] crate::agent::AgentError),

    #[error("event log error: {0}")]
    EventLog(#[from] crate::event_log::EventLogError),

    #[error("registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),

    #[error("agent unavailable after restart")]
    AgentUnavailable,
}

struct BufferedEvent {
    event: Event,
    estimated_size: usize,
}

struct PendingEntry {
    pending: PendingPermission,
    respond: oneshot::Sender<PermissionOutcome>,
}

struct Inner {
    state: SessionState,
    agent_session_id: Option<String>,
    cost: f64,
    created_at: DateTime<Utc>,
    last_activity: Option<DateTime<Utc>>,
    startup_options: StartupOptions,
    sequence: u64,
    buffer: VecDeque<BufferedEvent>,
    buffer_bytes: usize,
    pending: HashMap<Uuid, PendingEntry>,
    to_agent: Option<tokio::sync::mpsc::Sender<AgentCommand>>,
    pump_cancel: Option<CancellationToken>,
}

/// The daemon's local handle for one agent instance in one working
/// directory. Moves between `idle`, `working`, `awaiting_approval`, and
/// `error`; `query`/`restart`/`interrupt`/`respond_to_permission` drive the
/// transitions.
pub struct Session<C: Clock = wormhole_core::SystemClock> {
    pub name: SessionName,
    pub directory: PathBuf,
    clock: C,
    agent_adapter: Arc<dyn AgentAdapter>,
    event_log: Arc<EventLog>,
    registry: Arc<SessionRegistry>,
    broadcaster: Arc<Broadcaster>,
    buffer_cap_bytes: usize,
    inner: Mutex<Inner>,
}

impl<C: Clock> Session<C> {
    /// Construct a session handle, restoring the sequence counter from the
    /// event log so a restart never resets it.
    pub fn new(
        name: SessionName,
        directory: PathBuf,
        clock: C,
        agent_adapter: Arc<dyn AgentAdapter>,
        event_log: Arc<EventLog>,
        registry: Arc<SessionRegistry>,
        broadcaster: Arc<Broadcaster>,
        buffer_cap_bytes: usize,
    ) -> Result<Self, SessionError> {
        let sequence = event_log.latest(name.as_str())?;
        let created_at = clock.now();
        Ok(Self {
            name,
            directory,
            clock,
            agent_adapter,
            event_log,
            registry,
            broadcaster,
            buffer_cap_bytes,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                agent_session_id: None,
                cost: 0.0,
                created_at,
                last_activity: None,
                startup_options: StartupOptions::new(),
                sequence,
                buffer: VecDeque::new(),
                buffer_bytes: 0,
                pending: HashMap::new(),
                to_agent: None,
                pump_cancel: None,
            }),
        })
    }

    /// Restore a session from a persisted descriptor on daemon boot.
    pub fn from_descriptor(
        descriptor: SessionDescriptor,
        clock: C,
        agent_adapter: Arc<dyn AgentAdapter>,
        event_log: Arc<EventLog>,
        registry: Arc<SessionRegistry>,
        broadcaster: Arc<Broadcaster>,
        buffer_cap_bytes: usize,
    ) -> Result<Self, SessionError> {
        let sequence = event_log.latest(descriptor.name.as_str())?;
        Ok(Self {
            name: descriptor.name,
            directory: descriptor.directory,
            clock,
            agent_adapter,
            event_log,
            registry,
            broadcaster,
            buffer_cap_bytes,
            inner: Mutex::new(Inner {
                state: SessionState::Idle,
                agent_session_id: descriptor.agent_session_id,
                cost: descriptor.cost,
                created_at: descriptor.created_at,
                last_activity: None,
                startup_options: descriptor.startup_options,
                sequence,
                buffer: VecDeque::new(),
                buffer_bytes: 0,
                pending: HashMap::new(),
                to_agent: None,
                pump_cancel: None,
            }),
        })
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    /// Launch the agent. Records `options` as `startup_options` on first
    /// call only, so restarts reuse the original intent.
    ///
    /// Takes `self: &Arc<Self>` because it hands the receive pump a clone of
    /// the `Arc` to outlive this call.
    pub async fn start(self: &Arc<Self>, options: StartupOptions) -> Result<(), SessionError>
    where
        Self: Send + Sync + 'static,
    {
        {
            let mut inner = self.inner.lock().await;
            if inner.startup_options.is_empty() {
                inner.startup_options = options;
            }
        }
        self.connect_agent(None).await
    }

    /// Best-effort disconnect of the current agent, then re-invoke `start`
    /// with the original options, passing `resume` when an agent session id
    /// is already known so conversational context is preserved.
    pub async fn restart(self: &Arc<Self>) -> Result<(), SessionError>
    where
        Self: Send + Sync + 'static,
    {
        self.cancel_pump_and_disconnect().await;
        let resume = self.inner.lock().await.agent_session_id.clone();
        self.connect_agent(resume).await
    }

    async fn connect_agent(self: &Arc<Self>, resume: Option<String>) -> Result<(), SessionError>
    where
        Self: Send + Sync + 'static,
    {
        let options = self.inner.lock().await.startup_options.clone();
        let handle =
            self.agent_adapter.connect(&self.directory, &options, resume.as_deref()).await?;

        let cancel = CancellationToken::new();
        {
            let mut inner = self.inner.lock().await;
            inner.to_agent = Some(handle.to_agent);
            inner.pump_cancel = Some(cancel.clone());
        }

        self.spawn_receive_pump(handle.from_agent, cancel);
        Ok(())
    }

    /// `query(text)`: restarts first if in `error` or agentless. A first
    /// failure to dispatch the query triggers one restart-and-retry; a
    /// second failure surfaces an error.
    pub async fn query(self: &Arc<Self>, text: &str) -> Result<(), SessionError>
    where
        Self: Send + Sync + 'static,
    {
        let needs_restart = {
            let inner = self.inner.lock().await;
            inner.state == SessionState::Error || inner.to_agent.is_none()
        };
        if needs_restart {
            self.restart().await?;
        }

        self.inner.lock().await.state = SessionState::Working;

        if self.send_query(text).await.is_ok() {
            return Ok(());
        }

        warn!(session = %self.name, "query dispatch failed, restarting and retrying once");
        self.restart().await?;
        self.inner.lock().await.state = SessionState::Working;
        self.send_query(text).await.map_err(|_| SessionError::AgentUnavailable)
    }

    async fn send_query(&self, text: &str) -> Result<(), SessionError> {
        let sender = self.inner.lock().await.to_agent.clone();
        match sender {
            Some(sender) => sender
                .send(AgentCommand::Query(text.to_string()))
                .await
                .map_err(|_| SessionError::AgentUnavailable),
            None => Err(SessionError::AgentUnavailable),
        }
    }

    /// Forward an interrupt to the agent. Does not change state — the
    /// agent signals end-of-turn via its stream, which returns state to
    /// `idle`.
    pub async fn interrupt(&self) {
        let sender = self.inner.lock().await.to_agent.clone();
        if let Some(sender) = sender {
            let _ = sender.send(AgentCommand::Interrupt).await;
        }
    }

    /// Resolve a pending permission. Returns `true` iff a match was found
    /// and not already resolved.
    pub async fn respond_to_permission(&self, request_id: Uuid, decision: Decision) -> bool {
        let entry = self.inner.lock().await.pending.remove(&request_id);
        match entry {
            Some(entry) => {
                let _ = entry.respond.send(PermissionOutcome::from_decision(decision));
                self.inner.lock().await.state = SessionState::Working;
                true
            }
            None => false,
        }
    }

    /// Events with `sequence > seq`, preferring the in-memory buffer when it
    /// holds a contiguous prefix starting at `seq + 1`.
    pub async fn get_events_since(&self, seq: u64) -> Result<Vec<Event>, SessionError> {
        let inner = self.inner.lock().await;
        if let Some(front) = inner.buffer.front() {
            if front.event.sequence == seq + 1 {
                return Ok(inner.buffer.iter().map(|b| b.event.clone()).collect());
            }
        }
        drop(inner);
        Ok(self.event_log.load(self.name.as_str(), seq)?)
    }

    pub fn get_oldest_sequence(&self) -> Result<u64, SessionError> {
        Ok(self.event_log.oldest(self.name.as_str())?)
    }

    pub async fn get_pending_permissions(&self) -> Vec<PendingPermission> {
        self.inner.lock().await.pending.values().map(|e| e.pending.clone()).collect()
    }

    pub async fn snapshot(&self) -> wormhole_wire::SessionSummary {
        let inner = self.inner.lock().await;
        wormhole_wire::SessionSummary {
            name: self.name.to_string(),
            directory: self.directory.clone(),
            state: inner.state,
            agent_session_id: inner.agent_session_id.clone(),
            cost: inner.cost,
            last_activity: inner.last_activity,
            pending_permissions: inner.pending.values().map(|e| e.pending.clone()).collect(),
        }
    }

    pub async fn descriptor(&self) -> SessionDescriptor {
        let inner = self.inner.lock().await;
        SessionDescriptor {
            name: self.name.clone(),
            directory: self.directory.clone(),
            agent_session_id: inner.agent_session_id.clone(),
            cost: inner.cost,
            created_at: inner.created_at,
            startup_options: inner.startup_options.clone(),
        }
    }

    /// Cancel the receive pump (if any) and best-effort disconnect the
    /// agent. Used both by `restart` and by session teardown.
    pub async fn cancel_pump_and_disconnect(&self) {
        let (sender, cancel) = {
            let mut inner = self.inner.lock().await;
            (inner.to_agent.take(), inner.pump_cancel.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(sender) = sender {
            let _ = sender.send(AgentCommand::Disconnect).await;
        }
    }

    /// Tear down the session: cancel the pump and drop every pending
    /// permission (the agent observes this as the completion handle being
    /// dropped, equivalent to an unresolved call).
    pub async fn stop(&self) {
        self.cancel_pump_and_disconnect().await;
        let mut inner = self.inner.lock().await;
        inner.pending.clear();
        inner.state = SessionState::Idle;
    }

    fn spawn_receive_pump(
        self: &Arc<Self>,
        mut from_agent: tokio::sync::mpsc::Receiver<AgentEvent>,
        cancel: CancellationToken,
    ) where
        Self: Send + Sync + 'static,
    {
        let session = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = from_agent.recv() => event,
                };
                match event {
                    Some(AgentEvent::Message(message)) => {
                        if let Err(e) = session.handle_agent_message(message).await {
                            error!(session = %session.name, error = %e, "failed to process agent message");
                        }
                    }
                    Some(AgentEvent::PermissionRequest { tool_name, tool_input, respond }) => {
                        session.handle_permission_request(tool_name, tool_input, respond).await;
                    }
                    Some(AgentEvent::Ended) => {
                        session.inner.lock().await.state = SessionState::Idle;
                        break;
                    }
                    Some(AgentEvent::Errored(message)) => {
                        session.inner.lock().await.state = SessionState::Error;
                        session.broadcaster.broadcast(
                            session.name.as_str(),
                            wormhole_wire::ServerFrame::Error {
                                code: ErrorCode::SdkError,
                                message,
                                session: Some(session.name.to_string()),
                                details: None,
                            },
                        );
                        break;
                    }
                    None => break,
                }
            }
        });
    }

    async fn handle_agent_message(&self, raw: serde_json::Value) -> Result<(), SessionError> {
        let now = self.clock.now();
        let message = Event::normalise_message(raw);

        let sequence = {
            let mut inner = self.inner.lock().await;
            inner.sequence += 1;
            inner.sequence
        };
        let event = Event::new(sequence, now, message.clone());

        // Durability precedes observation: append before broadcast.
        self.event_log.append(self.name.as_str(), &event)?;

        let mut agent_session_id_captured = None;
        let mut cost_updated = None;
        {
            let mut inner = self.inner.lock().await;
            inner.last_activity = Some(now);

            let estimated_size = serde_json::to_vec(&event).map(|v| v.len()).unwrap_or(256);
            inner.buffer.push_back(BufferedEvent { event: event.clone(), estimated_size });
            inner.buffer_bytes += estimated_size;
            while inner.buffer_bytes > self.buffer_cap_bytes {
                match inner.buffer.pop_front() {
                    Some(evicted) => inner.buffer_bytes -= evicted.estimated_size,
                    None => break,
                }
            }

            if message.get("subtype").and_then(|v| v.as_str()) == Some("init") {
                if let Some(session_id) =
                    message.get("data").and_then(|d| d.get("session_id")).and_then(|v| v.as_str())
                {
                    if inner.agent_session_id.is_none() {
                        inner.agent_session_id = Some(session_id.to_string());
                        agent_session_id_captured = inner.agent_session_id.clone();
                    }
                }
            }

            if let Some(cost) = message.get("total_cost_usd").and_then(|v| v.as_f64()) {
                inner.cost = cost;
                cost_updated = Some(cost);
            }
        }

        if agent_session_id_captured.is_some() || cost_updated.is_some() {
            self.registry.upsert(self.descriptor().await)?;
        }

        self.broadcaster.broadcast(
            self.name.as_str(),
            wormhole_wire::ServerFrame::Event {
                session: self.name.to_string(),
                sequence: event.sequence,
                timestamp: event.timestamp,
                message: event.message,
            },
        );

        Ok(())
    }

    async fn handle_permission_request(
        &self,
        tool_name: String,
        tool_input: serde_json::Value,
        respond: oneshot::Sender<PermissionOutcome>,
    ) {
        let request_id = Uuid::new_v4();
        let pending = PendingPermission {
            request_id,
            tool_name: tool_name.clone(),
            tool_input: tool_input.clone(),
            created_at: self.clock.now(),
        };
        {
            let mut inner = self.inner.lock().await;
            inner.state = SessionState::AwaitingApproval;
            inner.pending.insert(request_id, PendingEntry { pending, respond });
        }
        info!(session = %self.name, %request_id, %tool_name, "awaiting permission");
        self.broadcaster.broadcast(
            self.name.as_str(),
            wormhole_wire::ServerFrame::PermissionRequest {
                request_id,
                tool_name,
                tool_input,
                session_name: self.name.to_string(),
            },
        );
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
