// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::callback;
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn publish_is_invisible_until_commit() {
    let bus = MemoryTagBus::new();

    bus.publish("a/b", json!(1)).await.unwrap();
    assert_eq!(bus.get("a/b").await, None);

    bus.commit().await.unwrap();
    assert_eq!(bus.get("a/b").await, Some(json!(1)));
}

#[tokio::test]
async fn commit_dispatches_matching_subscriptions() {
    let bus = MemoryTagBus::new();
    let seen: Arc<parking_lot::Mutex<Vec<(String, TagValue)>>> = Arc::default();

    let seen_cb = Arc::clone(&seen);
    bus.subscribe(
        &["supervisor/_cmd/**".to_string()],
        callback(move |key, value| {
            let seen = Arc::clone(&seen_cb);
            async move {
                seen.lock().push((key, value));
            }
        }),
    )
    .await
    .unwrap();

    bus.publish("supervisor/_cmd/restart", json!({"app_id": "mtc-01"}))
        .await
        .unwrap();
    bus.publish("supervisor/_event/ignored", json!(0))
        .await
        .unwrap();
    bus.commit().await.unwrap();

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "supervisor/_cmd/restart");
}

#[tokio::test]
async fn handler_may_publish_and_commit_reentrantly() {
    let bus = MemoryTagBus::new();

    let bus_cb = bus.clone();
    bus.subscribe(
        &["ping".to_string()],
        callback(move |_, _| {
            let bus = bus_cb.clone();
            async move {
                bus.publish("pong", json!("ack")).await.ok();
                bus.commit().await.ok();
            }
        }),
    )
    .await
    .unwrap();

    bus.publish("ping", json!(1)).await.unwrap();
    bus.commit().await.unwrap();

    assert_eq!(bus.get("pong").await, Some(json!("ack")));
}

#[tokio::test]
async fn disconnect_drops_subscriptions() {
    let bus = MemoryTagBus::new();
    let seen: Arc<parking_lot::Mutex<u32>> = Arc::default();

    let seen_cb = Arc::clone(&seen);
    bus.subscribe(
        &["k".to_string()],
        callback(move |_, _| {
            let seen = Arc::clone(&seen_cb);
            async move {
                *seen.lock() += 1;
            }
        }),
    )
    .await
    .unwrap();

    bus.connect().await.unwrap();
    assert!(bus.is_connected());
    bus.disconnect().await.unwrap();
    assert!(!bus.is_connected());

    bus.publish("k", json!(1)).await.unwrap();
    bus.commit().await.unwrap();
    assert_eq!(*seen.lock(), 0);
}

#[tokio::test]
async fn clear_drops_committed_state() {
    let bus = MemoryTagBus::new();
    bus.publish("k", json!(1)).await.unwrap();
    bus.commit().await.unwrap();

    bus.clear().await.unwrap();
    assert_eq!(bus.get("k").await, None);
}

#[tokio::test]
async fn sync_records_patterns_once() {
    let bus = MemoryTagBus::new();
    bus.sync(&["a/**".to_string()]).await.unwrap();
    bus.sync(&["a/**".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(bus.synced_patterns(), vec!["a/**", "b"]);

    assert!(bus.sync(&[String::new()]).await.is_err());
}

#[tokio::test]
async fn last_committed_write_wins() {
    let bus = MemoryTagBus::new();
    bus.publish("k", json!(1)).await.unwrap();
    bus.publish("k", json!(2)).await.unwrap();
    bus.commit().await.unwrap();
    assert_eq!(bus.get("k").await, Some(json!(2)));
}
