// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fans a session's events out to every interested peer.
//!
//! Peers are tracked by a bounded sender; a peer's own read/write loop is
//! the thing that actually owns its socket, so removal here is just
//! bookkeeping. Events for one session are enqueued onto each subscribed
//! peer's channel in order, back to back, so two events never race each
//! other onto the same peer out of sequence; a full or closed channel is
//! skipped rather than awaited, so one slow peer still cannot stall another.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::warn;
use wormhole_wire::{ServerFrame, Subscription};

pub type PeerId = u64;

/// A peer's declared interest in sessions: nothing yet, everything, or a
/// finite named set.
#[derive(Debug, Clone, Default)]
enum Subscriptions {
    #[default]
    None,
    All,
    Named(HashSet<String>),
}

impl Subscriptions {
    fn wants(&self, session: &str) -> bool {
        match self {
            Subscriptions::None => false,
            Subscriptions::All => true,
            Subscriptions::Named(names) => names.contains(session),
        }
    }

    fn extend_from(&mut self, subscription: Subscription) {
        match subscription {
            Subscription::All(_) => *self = Subscriptions::All,
            Subscription::Names(names) => match self {
                Subscriptions::All => {}
                Subscriptions::None => *self = Subscriptions::Named(names.into_iter().collect()),
                Subscriptions::Named(existing) => existing.extend(names),
            },
        }
    }
}

struct PeerEntry {
    sender: mpsc::Sender<ServerFrame>,
    subscriptions: Mutex<Subscriptions>,
}

/// Maintains the set of connected peers and fans events out to them.
#[derive(Default)]
pub struct Broadcaster {
    peers: Mutex<HashMap<PeerId, PeerEntry>>,
    next_id: AtomicU64,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self { peers: Mutex::new(HashMap::new()), next_id: AtomicU64::new(1) }
    }

    /// Register a new peer, returning its id and nothing else — the caller
    /// keeps the receiving half of `sender` and writes frames to the socket.
    pub fn add(&self, sender: mpsc::Sender<ServerFrame>) -> PeerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.peers.lock().insert(id, PeerEntry { sender, subscriptions: Mutex::new(Subscriptions::default()) });
        id
    }

    /// Drop a peer. Safe to call more than once or for an unknown id.
    pub fn remove(&self, id: PeerId) {
        self.peers.lock().remove(&id);
    }

    /// Extend a peer's subscription set. No-op if the peer is gone.
    pub fn subscribe(&self, id: PeerId, subscription: Subscription) {
        if let Some(entry) = self.peers.lock().get(&id) {
            entry.subscriptions.lock().extend_from(subscription);
        }
    }

    /// Number of currently connected peers, for `get_status`.
    pub fn peer_count(&self) -> usize {
        self.peers.lock().len()
    }

    /// Send `frame` to every peer subscribed to `session`, in the order
    /// this is called. Best-effort: a full or closed peer channel is simply
    /// skipped, the peer's own read loop will notice disconnection. Two
    /// calls for the same session from the same caller are therefore
    /// delivered to a given peer in that order, which is what keeps a
    /// peer's `event` sequence numbers strictly increasing.
    pub fn broadcast(&self, session: &str, frame: ServerFrame) {
        let senders: Vec<mpsc::Sender<ServerFrame>> = {
            let peers = self.peers.lock();
            peers
                .values()
                .filter(|entry| entry.subscriptions.lock().wants(session))
                .map(|entry| entry.sender.clone())
                .collect()
        };
        for sender in senders {
            if let Err(e) = sender.try_send(frame.clone()) {
                warn!(%e, "dropping frame for a full or closed peer channel");
            }
        }
    }
}

#[cfg(test)]
#[path = "broadcaster_tests.rs"]
mod tests;
