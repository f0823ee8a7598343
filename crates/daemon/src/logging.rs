// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing setup: a rotating file layer under the state directory plus a
//! stderr layer for foreground operation, both gated by the same filter.

use std::path::Path;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Guard that must be kept alive for the lifetime of the process; dropping
/// it stops the non-blocking file writer from flushing further lines.
pub struct LoggingGuard {
    _file_guard: tracing_appender::non_blocking::WorkerGuard,
}

pub fn init(state_dir: &Path, filter_directive: &str) -> LoggingGuard {
    let log_dir = state_dir.join("logs");
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "wormholed.log");
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_new(filter_directive).unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(file_writer).with_ansi(false);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    tracing_subscriber::registry().with(filter).with(file_layer).with(stderr_layer).init();

    LoggingGuard { _file_guard: file_guard }
}
