// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[yare::parameterized(
    declined          = { json!({ "ok": true, "shouldUploadVideo": false }), true },
    wants_video       = { json!({ "ok": true, "shouldUploadVideo": true }),  false },
    unspecified       = { json!({ "ok": true }),                             false },
    rejected          = { json!({ "ok": false, "shouldUploadVideo": false }), false },
    empty             = { json!({}),                                          false },
)]
fn post_log_ack_evidence_declined(ack: Value, expected: bool) {
    let ack: PostLogAck = serde_json::from_value(ack).unwrap();
    assert_eq!(ack.evidence_declined(), expected);
}

#[test]
fn bulk_ack_accepts_id_alias_in_failures() {
    let ack: BulkAck = serde_json::from_value(json!({
        "accepted": ["tx1", "tx2"],
        "failed": [{ "id": "tx3", "error": "duplicate" }, { "transactionId": "tx4" }],
    }))
    .unwrap();

    assert_eq!(ack.accepted, vec![TransactionId::from("tx1"), TransactionId::from("tx2")]);
    assert_eq!(ack.failed[0].transaction_id, "tx3");
    assert_eq!(ack.failed[0].error, "duplicate");
    assert_eq!(ack.failed[1].transaction_id, "tx4");
    assert!(ack.failed[1].error.is_empty());
}

#[test]
fn bulk_ack_defaults_to_empty() {
    let ack: BulkAck = serde_json::from_value(json!({})).unwrap();
    assert!(ack.accepted.is_empty());
    assert!(ack.failed.is_empty());
}

#[test]
fn bulk_payload_wraps_logs() {
    let record = OfflineLogRecord::builder().transaction_id("tx1").build();
    let value = serde_json::to_value(BulkPayload { logs: vec![record] }).unwrap();
    assert_eq!(value["logs"][0]["transactionId"], "tx1");
}

#[test]
fn client_frame_omits_missing_ack_id() {
    let frame = ClientFrame { event: "ping".into(), ack_id: None, data: json!({}) };
    let value = serde_json::to_value(frame).unwrap();
    assert!(value.get("ackId").is_none());
}

#[test]
fn server_frame_parses_ack() {
    let frame = ServerFrame::parse(r#"{"ackId":7,"data":{"ok":true}}"#).unwrap();
    assert_eq!(frame, ServerFrame::Ack { ack_id: 7, data: json!({ "ok": true }) });
}

#[test]
fn server_frame_parses_push() {
    let frame = ServerFrame::parse(
        r#"{"event":"upload_recording_url","data":{"transactionId":"tx1","url":"https://u"}}"#,
    )
    .unwrap();
    match frame {
        ServerFrame::Push { event, data } => {
            assert_eq!(event, events::UPLOAD_RECORDING_URL);
            let request: UploadRequest = serde_json::from_value(data).unwrap();
            assert_eq!(request.transaction_id, "tx1");
            assert_eq!(request.url, "https://u");
        }
        other => panic!("expected push, got {other:?}"),
    }
}

#[yare::parameterized(
    not_json   = { "hello" },
    no_keys    = { r#"{"data":1}"# },
    array      = { "[]" },
)]
fn server_frame_rejects(text: &str) {
    assert!(ServerFrame::parse(text).is_none());
}
