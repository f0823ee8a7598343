// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wormholed`: the daemon binary entry point.

use std::sync::Arc;

use tracing::{error, info, warn};
use wormhole_daemon::agent::ProcessAgentAdapter;
use wormhole_daemon::{control, discovery, env, logging, peer, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let state_dir = env::state_dir();
    std::fs::create_dir_all(&state_dir)?;
    let _logging_guard = logging::init(&state_dir, &env::log_filter());

    info!("wormholed starting up");

    let port = env::port();
    let machine_name = env::machine_name();
    let agent_adapter: Arc<dyn wormhole_daemon::agent::AgentAdapter> =
        Arc::new(ProcessAgentAdapter::new());

    let state =
        AppState::boot(state_dir, port, env::buffer_bytes(), agent_adapter, machine_name.clone())
            .await?;

    let tcp_listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "public endpoint listening");

    let control_path = env::control_socket_path();
    let control_listener = control::bind(&control_path).await?;

    let announcer = if env::discovery_disabled() {
        None
    } else {
        match discovery::Announcer::start(port, &machine_name, env!("CARGO_PKG_VERSION")) {
            Ok(a) => Some(a),
            Err(e) => {
                warn!(error = %e, "failed to start service discovery, continuing without it");
                None
            }
        }
    };

    let control_state = Arc::clone(&state);
    tokio::spawn(control::accept_loop(control_listener, control_state));

    let public_state = Arc::clone(&state);
    let public_accept = tokio::spawn(async move {
        loop {
            match tcp_listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = Arc::clone(&public_state);
                    tokio::spawn(peer::handle_connection(stream, state));
                }
                Err(e) => error!(error = %e, "public accept failed"),
            }
        }
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    public_accept.abort();
    state.shutdown().await;
    if let Some(announcer) = announcer {
        announcer.stop();
    }
    let _ = std::fs::remove_file(&control_path);

    info!("wormholed shut down cleanly");
    Ok(())
}
