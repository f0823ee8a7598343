// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `wormhole`: the control-plane CLI. A thin client over the daemon's local
//! Unix control socket — it never touches the event log or registry
//! directly.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod commands;
mod env;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{session, status};
use output::OutputFormat;

#[derive(Parser)]
#[command(name = "wormhole", version, about = "Control-plane client for wormholed")]
struct Cli {
    /// Output format
    #[arg(long, value_enum, global = true, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Session management
    Session(session::SessionArgs),
    /// Daemon status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = client::connect();

    match cli.command {
        Command::Session(args) => session::handle(args.command, &client, cli.format).await,
        Command::Status => status::handle(&client, cli.format).await,
    }
}
