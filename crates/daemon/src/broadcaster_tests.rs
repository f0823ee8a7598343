// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use tokio::sync::mpsc;
use wormhole_wire::{AllMarker, ServerFrame};

fn ping() -> ServerFrame {
    ServerFrame::Ping
}

#[tokio::test]
async fn unsubscribed_peer_receives_nothing() {
    let broadcaster = Broadcaster::new();
    let (tx, mut rx) = mpsc::channel(8);
    broadcaster.add(tx);

    broadcaster.broadcast("a", ping());
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn named_subscription_receives_matching_session_only() {
    let broadcaster = Broadcaster::new();
    let (tx, mut rx) = mpsc::channel(8);
    let id = broadcaster.add(tx);
    broadcaster.subscribe(id, Subscription::Names(vec!["a".to_string()]));

    broadcaster.broadcast("b", ping());
    broadcaster.broadcast("a", ping());

    let received = rx.recv().await.unwrap();
    assert!(matches!(received, ServerFrame::Ping));
    // Only the "a" broadcast should have been delivered.
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn wildcard_subscription_receives_every_session() {
    let broadcaster = Broadcaster::new();
    let (tx, mut rx) = mpsc::channel(8);
    let id = broadcaster.add(tx);
    broadcaster.subscribe(id, Subscription::All(AllMarker));

    broadcaster.broadcast("a", ping());
    broadcaster.broadcast("b", ping());

    rx.recv().await.unwrap();
    rx.recv().await.unwrap();
}

#[tokio::test]
async fn removed_peer_is_skipped_without_affecting_others() {
    let broadcaster = Broadcaster::new();
    let (tx1, mut rx1) = mpsc::channel(8);
    let (tx2, mut rx2) = mpsc::channel(8);
    let id1 = broadcaster.add(tx1);
    let id2 = broadcaster.add(tx2);
    broadcaster.subscribe(id1, Subscription::All(AllMarker));
    broadcaster.subscribe(id2, Subscription::All(AllMarker));

    broadcaster.remove(id1);
    broadcaster.broadcast("a", ping());

    assert!(rx2.recv().await.is_some());
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(rx1.try_recv().is_err());
}

#[tokio::test]
async fn events_for_one_session_arrive_in_broadcast_order() {
    let broadcaster = Broadcaster::new();
    let (tx, mut rx) = mpsc::channel(8);
    let id = broadcaster.add(tx);
    broadcaster.subscribe(id, Subscription::All(AllMarker));

    for sequence in 1..=20u64 {
        broadcaster.broadcast(
            "a",
            ServerFrame::Event {
                session: "a".to_string(),
                sequence,
                timestamp: chrono::Utc::now(),
                message: serde_json::json!({}),
            },
        );
    }

    for expected in 1..=20u64 {
        match rx.recv().await.unwrap() {
            ServerFrame::Event { sequence, .. } => assert_eq!(sequence, expected),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

#[tokio::test]
async fn peer_count_reflects_add_and_remove() {
    let broadcaster = Broadcaster::new();
    assert_eq!(broadcaster.peer_count(), 0);
    let (tx, _rx) = mpsc::channel(8);
    let id = broadcaster.add(tx);
    assert_eq!(broadcaster.peer_count(), 1);
    broadcaster.remove(id);
    assert_eq!(broadcaster.peer_count(), 0);
}

#[tokio::test]
async fn remove_is_idempotent_for_unknown_id() {
    let broadcaster = Broadcaster::new();
    broadcaster.remove(999);
    assert_eq!(broadcaster.peer_count(), 0);
}
