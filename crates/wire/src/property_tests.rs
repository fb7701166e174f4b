// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Property tests for worker line decoding.

use dx_core::CorrelationId;
use proptest::prelude::*;
use serde_json::Value;

use super::*;

proptest! {
    #[test]
    fn decode_never_panics(line in ".*") {
        let _ = decode_line(&line);
    }

    #[test]
    fn encoded_request_decodes_as_reply_with_same_id(
        id in "[a-zA-Z0-9_-]{1,32}",
        kind in "[a-z_]{1,16}",
        n in any::<i64>(),
    ) {
        let request = WorkerRequest::typed(kind.clone()).with("value", n);
        let line = encode_request(&CorrelationId::from(id.as_str()), &request).unwrap();

        // A worker that echoes the request back produces a reply for the same id
        match decode_line(&line) {
            Some(Inbound::Reply { correlation_id, value, event }) => {
                prop_assert_eq!(correlation_id.as_str(), id.as_str());
                prop_assert_eq!(value, Value::from(n));
                prop_assert_eq!(event.map(|e| e.kind().to_string()), Some(kind));
            }
            other => prop_assert!(false, "expected reply, got {:?}", other),
        }
    }

    #[test]
    fn encoded_request_is_one_frame(text in ".*") {
        let request = WorkerRequest::typed("t").with("text", text);
        let line = encode_request(&CorrelationId::new(), &request).unwrap();
        prop_assert_eq!(line.matches('\n').count(), 1);
        prop_assert!(line.ends_with('\n'));
    }
}
