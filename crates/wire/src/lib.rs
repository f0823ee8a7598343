// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! wormhole-wire: the two wire formats the daemon speaks.
//!
//! `frame` is the public, per-peer protocol (subscribe/input/events/
//! permission round-trips). `control` is the local, single-shot
//! request/response protocol over the control socket. Both ride on the same
//! newline-delimited JSON `codec`.

pub mod codec;
pub mod control;
pub mod frame;

pub use codec::{read_line_json, write_line_json, ProtocolError};
pub use control::{ControlRequest, ControlResponse};
pub use frame::{AllMarker, ClientFrame, ControlAction, ServerFrame, SessionSummary, Subscription};
