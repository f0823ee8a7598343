// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Newline-delimited JSON framing shared by the public frame stream and the
//! local control socket.
//!
//! One JSON value per line. This is the simplest framing that gives crash-safe,
//! streamable messages over either a TCP socket or a Unix socket without
//! pulling in a general-purpose websocket stack; the daemon never sends
//! binary payloads.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("timed out waiting for frame")]
    Timeout,

    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read one newline-delimited JSON value from `reader`, bounded by `timeout`.
///
/// Returns `Ok(None)` on a clean EOF before any byte of the next line arrives
/// (nothing read); a partial line followed by EOF is a protocol error.
pub async fn read_line_json<R, T>(
    reader: &mut BufReader<R>,
    timeout: Duration,
) -> Result<Option<T>, ProtocolError>
where
    R: tokio::io::AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut line = String::new();
    let read = tokio::time::timeout(timeout, reader.read_line(&mut line))
        .await
        .map_err(|_| ProtocolError::Timeout)??;

    if read == 0 {
        return Ok(None);
    }
    let trimmed = line.trim_end_matches('\n').trim_end_matches('\r');
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

/// Write one value as a newline-terminated JSON line to `writer`.
pub async fn write_line_json<W, T>(
    writer: &mut W,
    value: &T,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut payload = serde_json::to_vec(value)?;
    payload.push(b'\n');
    tokio::time::timeout(timeout, async {
        writer.write_all(&payload).await?;
        writer.flush().await
    })
    .await
    .map_err(|_| ProtocolError::Timeout)??;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[tokio::test]
    async fn round_trips_a_value() {
        let mut buf = Vec::new();
        write_line_json(&mut buf, &json!({"a": 1}), Duration::from_secs(1)).await.unwrap();
        assert_eq!(buf, b"{\"a\":1}\n");

        let mut reader = BufReader::new(Cursor::new(buf));
        let value: serde_json::Value =
            read_line_json(&mut reader, Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[tokio::test]
    async fn clean_eof_returns_none() {
        let mut reader = BufReader::new(Cursor::new(Vec::new()));
        let value: Option<serde_json::Value> =
            read_line_json(&mut reader, Duration::from_secs(1)).await.unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn malformed_json_is_an_error() {
        let mut reader = BufReader::new(Cursor::new(b"not json\n".to_vec()));
        let result: Result<Option<serde_json::Value>, _> =
            read_line_json(&mut reader, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(ProtocolError::Malformed(_))));
    }
}
