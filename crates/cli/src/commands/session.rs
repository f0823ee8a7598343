// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wormhole session` — open, close, list, and query sessions over the
//! local control socket.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use clap::{Args, Subcommand};
use wormhole_wire::ControlResponse;

use crate::client::DaemonClient;
use crate::output::{format_or_json, handle_list, OutputFormat};

#[derive(Args)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommand,
}

#[derive(Debug, Subcommand)]
pub enum SessionCommand {
    /// Start a new session for an agent in a working directory
    Open {
        /// Session name, must be unique among live sessions
        name: String,
        /// Working directory the agent runs in
        #[arg(default_value = ".")]
        directory: PathBuf,
        /// Startup options as a raw JSON object, passed through to the agent
        #[arg(long)]
        options: Option<String>,
    },
    /// Stop a session and forget its replay buffer
    Close {
        /// Session name
        name: String,
    },
    /// List all live sessions
    List,
    /// Send text input to a session
    Query {
        /// Session name
        name: String,
        /// Text to send
        text: String,
    },
}

pub async fn handle(
    command: SessionCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        SessionCommand::Open { name, directory, options } => {
            let options = options.map(|raw| serde_json::from_str(&raw)).transpose()?;
            let directory = std::fs::canonicalize(&directory)
                .map_err(|e| anyhow!("invalid directory {}: {e}", directory.display()))?;
            let response = client.open_session(name, directory, options).await?;
            report_success(response, format)
        }
        SessionCommand::Close { name } => {
            let response = client.close_session(name).await?;
            report_success(response, format)
        }
        SessionCommand::List => {
            let response = client.list_sessions().await?;
            match response {
                ControlResponse::SessionList { sessions } => {
                    handle_list(format, &sessions, "No sessions", |items| {
                        let name_width =
                            items.iter().map(|s| s.name.len()).max().unwrap_or(0).max("NAME".len());
                        println!("{:<name_width$} {:<18} DIRECTORY", "NAME", "STATE");
                        for s in items {
                            println!(
                                "{:<name_width$} {:<18} {}",
                                s.name,
                                s.state.to_string(),
                                s.directory.display()
                            );
                        }
                    })
                }
                ControlResponse::Error { code, message } => bail!("{code}: {message}"),
                other => bail!("unexpected response: {other:?}"),
            }
        }
        SessionCommand::Query { name, text } => {
            let response = client.query_session(name, text).await?;
            report_success(response, format)
        }
    }
}

fn report_success(response: ControlResponse, format: OutputFormat) -> Result<()> {
    match response {
        ControlResponse::Success { message, data } => {
            format_or_json(format, &data, || println!("{message}"))
        }
        ControlResponse::Error { code, message } => bail!("{code}: {message}"),
        other => bail!("unexpected response: {other:?}"),
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
