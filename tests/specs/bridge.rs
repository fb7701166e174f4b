//! Bridge specs against real worker processes
//!
//! `cat` echoes every request line, so each request comes back as its own
//! reply: the correlation id is intact and `value` is whatever we sent.

#![cfg(unix)]

use dx_bridge::{Bridge, BridgeConfig, BridgeError, CommandSpawner};
use dx_wire::WorkerRequest;
use serde_json::json;
use std::time::Duration;

const WITHIN: Duration = Duration::from_secs(5);

fn echo_bridge() -> Bridge {
    Bridge::new(CommandSpawner::new("cat"), BridgeConfig::default())
}

#[tokio::test]
async fn echo_worker_answers_each_request() {
    let bridge = echo_bridge();
    bridge.start().await.unwrap();

    let value = bridge
        .enqueue_with_timeout(WorkerRequest::typed("echo").with("value", json!({"n": 1})), WITHIN)
        .await
        .unwrap();

    assert_eq!(value, json!({"n": 1}));
    bridge.shutdown().await;
}

#[tokio::test]
async fn concurrent_callers_each_get_their_own_reply() {
    let bridge = echo_bridge();

    let calls = (0..8).map(|n| {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            bridge.enqueue_with_timeout(WorkerRequest::typed("echo").with("value", n), WITHIN).await
        })
    });
    let mut replies = Vec::new();
    for call in calls.collect::<Vec<_>>() {
        replies.push(call.await.unwrap().unwrap());
    }

    assert_eq!(replies, (0..8).map(|n| json!(n)).collect::<Vec<_>>());
    bridge.shutdown().await;
}

#[tokio::test]
async fn request_to_exiting_worker_fails_as_terminated() {
    let spawner = CommandSpawner::new("sh").args(["-c", "read line; exit 3"]);
    let bridge = Bridge::new(spawner, BridgeConfig::default().auto_start(false));
    bridge.start().await.unwrap();

    let err = bridge.enqueue_with_timeout(WorkerRequest::typed("echo"), WITHIN).await.unwrap_err();

    assert!(matches!(err, BridgeError::WorkerTerminated { .. }), "got {err:?}");
    bridge.shutdown().await;
}

#[tokio::test]
async fn stopped_bridge_restarts_lazily() {
    let bridge = echo_bridge();
    let first = bridge.start().await.unwrap();
    bridge.stop().await;

    let value = bridge
        .enqueue_with_timeout(WorkerRequest::typed("echo").with("value", "again"), WITHIN)
        .await
        .unwrap();

    assert_eq!(value, json!("again"));
    let status = bridge.status().await.unwrap();
    assert!(status.worker.is_some_and(|w| w.generation > first.generation));
    bridge.shutdown().await;
}

#[tokio::test]
async fn shut_down_bridge_rejects_requests() {
    let bridge = echo_bridge();
    bridge.start().await.unwrap();
    bridge.shutdown().await;

    let err = bridge.enqueue(WorkerRequest::typed("echo")).await.unwrap_err();
    assert!(matches!(err, BridgeError::ShutDown));
}
