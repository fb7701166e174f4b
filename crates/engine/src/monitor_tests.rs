// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dx_core::FakeClock;
use serde_json::json;
use yare::parameterized;

fn event(value: Value) -> WorkerEvent {
    let Value::Object(mut body) = value else { panic!("event must be an object") };
    let kind = body.remove(TYPE_FIELD).and_then(|v| v.as_str().map(String::from)).unwrap();
    WorkerEvent::new(kind, body)
}

fn window(clock: &FakeClock) -> MonitorWindow<FakeClock> {
    MonitorWindow::with_clock(MonitorConfig::new("ROOM-7"), clock.clone())
}

#[parameterized(
    monitoring_data = { "monitoring_data", true },
    pose = { "pose", true },
    stopped = { "stopped", false },
    error = { "error", false },
)]
fn only_monitoring_kinds_are_samples(kind: &str, accepted: bool) {
    let clock = FakeClock::new();
    let mut window = window(&clock);
    assert_eq!(window.observe(&event(json!({ "type": kind, "yaw": 1.0 }))), accepted);
    assert_eq!(window.samples(), u64::from(accepted));
}

#[test]
fn empty_window_yields_nothing() {
    let clock = FakeClock::new();
    let mut window = window(&clock);
    clock.advance(Duration::from_secs(10));

    assert!(!window.is_due());
    assert!(window.close().is_none());
}

#[test]
fn window_is_due_after_its_length() {
    let clock = FakeClock::new();
    let mut window = window(&clock);
    window.observe(&event(json!({ "type": "pose", "yaw": 1.0 })));

    clock.advance(Duration::from_millis(4_999));
    assert!(!window.is_due());
    clock.advance(Duration::from_millis(1));
    assert!(window.is_due());
}

#[test]
fn record_carries_means_and_metadata() {
    let clock = FakeClock::new();
    let mut window = window(&clock);
    window.observe(&event(json!({
        "type": "monitoring_data", "yaw": 10.0, "pitch": 2.0, "timestamp": 1.0,
    })));
    clock.advance(Duration::from_secs(1));
    window.observe(&event(json!({
        "type": "pose", "yaw": 20.0, "ok": true, "has_face": true, "frame_b64": "abc",
    })));
    clock.advance(Duration::from_secs(4));

    let record = window.close().unwrap();

    assert_eq!(record.room_code, "ROOM-7");
    assert_eq!(record.mimetype, "video/webm");
    assert_eq!(record.scores, json!({ "samples": 2, "means": { "yaw": 15.0, "pitch": 2.0 } }));
    assert!(!record.is_phone_present);
    assert_eq!(record.start_time.timestamp_millis() as u64, FakeClock::DEFAULT_EPOCH_MS);
    assert_eq!(record.created_at.timestamp_millis() as u64, FakeClock::DEFAULT_EPOCH_MS + 5_000);
    assert!(record.video_path.is_none());
}

#[parameterized(
    snake = { "phone_present" },
    camel = { "isPhonePresent" },
    prefixed = { "is_phone_present" },
)]
fn any_phone_sample_flags_the_window(field: &str) {
    let clock = FakeClock::new();
    let mut window = window(&clock);
    window.observe(&event(json!({ "type": "monitoring_data", "yaw": 1.0 })));
    let mut flagged = json!({ "type": "monitoring_data" });
    flagged[field] = json!(true);
    window.observe(&event(flagged));
    window.observe(&event(json!({ "type": "monitoring_data", "yaw": 1.0 })));

    assert!(window.close().unwrap().is_phone_present);
}

#[test]
fn each_window_gets_a_fresh_uuid_and_resets() {
    let clock = FakeClock::new();
    let mut window = window(&clock);
    window.observe(&event(json!({ "type": "pose", "yaw": 1.0 })));
    let first = window.close().unwrap();
    window.observe(&event(json!({ "type": "pose", "roll": 3.0 })));
    let second = window.close().unwrap();

    assert_ne!(first.transaction_id, second.transaction_id);
    assert!(uuid::Uuid::parse_str(first.transaction_id.as_str()).is_ok());
    assert_eq!(second.scores, json!({ "samples": 1, "means": { "roll": 3.0 } }));
}
