// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wormhole status` — report whether the daemon is running and, if so, its
//! port, machine name, and session/client counts.

use anyhow::{bail, Result};
use wormhole_wire::ControlResponse;

use crate::client::DaemonClient;
use crate::output::{format_or_json, OutputFormat};

pub async fn handle(client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let response = match client.get_status().await {
        Ok(r) => r,
        Err(e) if e.is_not_running() => return print_not_running(format),
        Err(e) => return Err(e.into()),
    };

    match response {
        ControlResponse::Status { running, port, machine_name, session_count, connected_clients } => {
            let obj = serde_json::json!({
                "running": running,
                "port": port,
                "machine_name": machine_name,
                "session_count": session_count,
                "connected_clients": connected_clients,
            });
            format_or_json(format, &obj, || {
                println!("Status: running");
                println!("Machine: {machine_name}");
                println!("Port: {port}");
                println!("Sessions: {session_count}");
                println!("Connected clients: {connected_clients}");
            })
        }
        ControlResponse::Error { code, message } => bail!("{code}: {message}"),
        other => bail!("unexpected response: {other:?}"),
    }
}

fn print_not_running(format: OutputFormat) -> Result<()> {
    let obj = serde_json::json!({ "running": false });
    format_or_json(format, &obj, || println!("Daemon not running"))
}
