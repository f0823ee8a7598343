// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The agent subprocess contract.
//!
//! Out of scope per the design: the core treats the agent as an opaque
//! bidirectional JSON stream exposing `connect`, `query(text)`, `receive()`,
//! `interrupt()`, `disconnect()`, and a `can_use_tool(name, input)` callback.
//! This module defines that contract as a trait plus one concrete
//! implementation (a subprocess speaking line-delimited JSON over stdio) and
//! a fake used by tests.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use wormhole_core::{PermissionOutcome, StartupOptions};

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to spawn agent process: {0}")]
    SpawnFailed(#[from] std::io::Error),

    #[error("agent process exited before connecting")]
    ExitedBeforeReady,

    #[error("agent adapter is not configured: {0}")]
    NotConfigured(String),
}

/// One inbound item from the agent's message stream.
#[derive(Debug)]
pub enum AgentEvent {
    /// A message produced by the agent, not yet normalised.
    Message(Value),
    /// The agent is asking permission to invoke a tool. Completing `respond`
    /// resumes the agent's call.
    PermissionRequest { tool_name: String, tool_input: Value, respond: oneshot::Sender<PermissionOutcome> },
    /// The agent's message stream ended (end of turn).
    Ended,
    /// The agent's stream failed unrecoverably.
    Errored(String),
}

/// A live connection to one agent subprocess: a sender for commands and a
/// receiver for its message stream.
pub struct AgentHandle {
    pub to_agent: mpsc::Sender<AgentCommand>,
    pub from_agent: mpsc::Receiver<AgentEvent>,
}

#[derive(Debug)]
pub enum AgentCommand {
    Query(String),
    Interrupt,
    Disconnect,
    PermissionResponse { request_id: Value, outcome: PermissionOutcome },
}

/// The agent subprocess contract the session depends on.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    /// Launch (or attach to, via `resume`) an agent instance rooted at
    /// `directory`, returning a handle to its command/event channels.
    async fn connect(
        &self,
        directory: &Path,
        options: &StartupOptions,
        resume: Option<&str>,
    ) -> Result<AgentHandle, AgentError>;
}

/// Spawns the agent as a child process and speaks line-delimited JSON over
/// its stdio. The command to run is read from `options["command"]` (a JSON
/// array of strings) or falls back to `WORMHOLE_AGENT_COMMAND`
/// (whitespace-split), matching the env-var-configurable pattern the rest of
/// the daemon uses for overridable external behaviour.
pub struct ProcessAgentAdapter;

impl ProcessAgentAdapter {
    pub fn new() -> Self {
        Self
    }

    fn resolve_command(options: &StartupOptions) -> Result<Vec<String>, AgentError> {
        if let Some(Value::Array(items)) = options.get("command") {
            let command: Vec<String> =
                items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
            if !command.is_empty() {
                return Ok(command);
            }
        }
        if let Ok(raw) = std::env::var("WORMHOLE_AGENT_COMMAND") {
            let command: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
            if !command.is_empty() {
                return Ok(command);
            }
        }
        Err(AgentError::NotConfigured(
            "no agent command: set startup_options.command or WORMHOLE_AGENT_COMMAND".to_string(),
        ))
    }
}

impl Default for ProcessAgentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentAdapter for ProcessAgentAdapter {
    async fn connect(
        &self,
        directory: &Path,
        options: &StartupOptions,
        resume: Option<&str>,
    ) -> Result<AgentHandle, AgentError> {
        let command = Self::resolve_command(options)?;
        let (program, args) = command.split_first().ok_or_else(|| {
            AgentError::NotConfigured("agent command is empty".to_string())
        })?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(directory)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(resume_id) = resume {
            cmd.env("WORMHOLE_AGENT_RESUME", resume_id);
        }

        let mut child: Child = cmd.spawn()?;
        let stdin = child.stdin.take().ok_or(AgentError::ExitedBeforeReady)?;
        let stdout = child.stdout.take().ok_or(AgentError::ExitedBeforeReady)?;
        let stderr = child.stderr.take().ok_or(AgentError::ExitedBeforeReady)?;

        let (to_agent_tx, mut to_agent_rx) = mpsc::channel::<AgentCommand>(32);
        let (from_agent_tx, from_agent_rx) = mpsc::channel::<AgentEvent>(256);

        // Writer task: forwards queries/interrupts to the agent's stdin.
        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(command) = to_agent_rx.recv().await {
                let line = match command {
                    AgentCommand::Query(text) => serde_json::json!({"type": "query", "text": text}),
                    AgentCommand::Interrupt => serde_json::json!({"type": "interrupt"}),
                    AgentCommand::Disconnect => break,
                    AgentCommand::PermissionResponse { request_id, outcome } => {
                        match outcome {
                            PermissionOutcome::Allow => serde_json::json!({
                                "type": "can_use_tool_response",
                                "request_id": request_id,
                                "behavior": "allow",
                            }),
                            PermissionOutcome::Deny { reason, interrupt } => serde_json::json!({
                                "type": "can_use_tool_response",
                                "request_id": request_id,
                                "behavior": "deny",
                                "message": reason,
                                "interrupt": interrupt,
                            }),
                        }
                    }
                };
                let mut bytes = match serde_json::to_vec(&line) {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(error = %e, "failed to serialise agent command");
                        continue;
                    }
                };
                bytes.push(b'\n');
                if stdin.write_all(&bytes).await.is_err() {
                    break;
                }
            }
        });

        // Reader task: parses the agent's stdout as line-delimited JSON and
        // forwards it as AgentEvents; intercepts `can_use_tool` requests.
        let events_tx = from_agent_tx.clone();
        let to_agent_for_responses = to_agent_tx.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) if line.trim().is_empty() => continue,
                    Ok(Some(line)) => match serde_json::from_str::<Value>(&line) {
                        Ok(value) if value.get("type").and_then(Value::as_str) == Some("can_use_tool") => {
                            let tool_name =
                                value.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
                            let tool_input = value.get("input").cloned().unwrap_or(Value::Null);
                            let request_id = value.get("request_id").cloned().unwrap_or(Value::Null);
                            let (respond_tx, respond_rx) = oneshot::channel();
                            let forward_to_stdin = to_agent_for_responses.clone();
                            tokio::spawn(async move {
                                if let Ok(outcome) = respond_rx.await {
                                    let _ = forward_to_stdin
                                        .send(AgentCommand::PermissionResponse { request_id, outcome })
                                        .await;
                                }
                            });
                            if events_tx
                                .send(AgentEvent::PermissionRequest {
                                    tool_name,
                                    tool_input,
                                    respond: respond_tx,
                                })
                                .await
                                .is_err()
                            {
                                break;
                            }
                        }
                        Ok(value) => {
                            if events_tx.send(AgentEvent::Message(value)).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "skipping unparsable agent stdout line"),
                    },
                    Ok(None) => {
                        let _ = events_tx.send(AgentEvent::Ended).await;
                        break;
                    }
                    Err(e) => {
                        let _ = events_tx.send(AgentEvent::Errored(e.to_string())).await;
                        break;
                    }
                }
            }
        });

        // Reaper: prevents zombies and logs a clean exit code.
        tokio::spawn(async move {
            let mut stderr_lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = stderr_lines.next_line().await {
                debug!(agent_stderr = %line);
            }
            match child.wait().await {
                Ok(status) => info!(?status, "agent process exited"),
                Err(e) => warn!(error = %e, "failed to wait on agent process"),
            }
        });

        Ok(AgentHandle { to_agent: to_agent_tx, from_agent: from_agent_rx })
    }
}

/// A scripted agent used by session tests: replays a fixed sequence of
/// messages, then ends the stream. Does not spawn a process.
#[cfg(any(test, feature = "test-support"))]
pub struct FakeAgentAdapter {
    pub scripted_messages: Vec<Value>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeAgentAdapter {
    pub fn new(scripted_messages: Vec<Value>) -> Self {
        Self { scripted_messages }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl AgentAdapter for FakeAgentAdapter {
    async fn connect(
        &self,
        _directory: &Path,
        _options: &StartupOptions,
        _resume: Option<&str>,
    ) -> Result<AgentHandle, AgentError> {
        let (to_agent_tx, mut to_agent_rx) = mpsc::channel::<AgentCommand>(32);
        let (from_agent_tx, from_agent_rx) = mpsc::channel::<AgentEvent>(256);
        let messages = self.scripted_messages.clone();

        tokio::spawn(async move {
            // Wait for the first query before replaying, mirroring a real
            // agent that stays silent until asked something.
            while let Some(command) = to_agent_rx.recv().await {
                if let AgentCommand::Query(_) = command {
                    break;
                }
            }
            for message in messages {
                if from_agent_tx.send(AgentEvent::Message(message)).await.is_err() {
                    return;
                }
            }
            let _ = from_agent_tx.send(AgentEvent::Ended).await;
            // Keep draining so the session can still send Interrupt/Disconnect
            // without the channel closing under it.
            while to_agent_rx.recv().await.is_some() {}
        });

        Ok(AgentHandle { to_agent: to_agent_tx, from_agent: from_agent_rx })
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
