// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Envelope Codec
//!
//! Serializes protocol envelopes to and from the carrier's wire format: one
//! JSON string per message. Malformed input yields
//! [`BridgeError::MalformedPayload`], which every call site treats as
//! "ignore this message" rather than a condition to propagate. There is no
//! schema versioning; wire compatibility is the caller's responsibility.

use crate::error::{BridgeError, BridgeResult};
use crate::message::{RequestEnvelope, ResponseEnvelope};

/// Serializes a request envelope to its wire string.
pub fn encode_request(envelope: &RequestEnvelope) -> BridgeResult<String> {
    serde_json::to_string(envelope).map_err(|e| BridgeError::MalformedPayload(e.to_string()))
}

/// Deserializes a request envelope from a wire string.
pub fn decode_request(raw: &str) -> BridgeResult<RequestEnvelope> {
    serde_json::from_str(raw).map_err(|e| BridgeError::MalformedPayload(e.to_string()))
}

/// Serializes a response envelope to its wire string.
pub fn encode_response(envelope: &ResponseEnvelope) -> BridgeResult<String> {
    serde_json::to_string(envelope).map_err(|e| BridgeError::MalformedPayload(e.to_string()))
}

/// Deserializes a response envelope from a wire string.
pub fn decode_response(raw: &str) -> BridgeResult<ResponseEnvelope> {
    serde_json::from_str(raw).map_err(|e| BridgeError::MalformedPayload(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{KvPair, MessageType, Origin, ResponseResult, TEARDOWN_ID};
    use proptest::prelude::*;
    use serde_json::{json, Value};

    #[test]
    fn request_round_trip() {
        let req = RequestEnvelope::new(
            Origin::from("https://app.example"),
            7,
            MessageType::Get,
            json!(["a", "b"]),
        );
        let decoded = decode_request(&encode_request(&req).unwrap()).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn set_payload_round_trip() {
        let pairs = vec![KvPair::new("k", json!("v")), KvPair::new("n", json!(42))];
        let req = RequestEnvelope::new(
            Origin::from("https://app.example"),
            3,
            MessageType::Set,
            serde_json::to_value(&pairs).unwrap(),
        );
        let decoded = decode_request(&encode_request(&req).unwrap()).unwrap();
        let parsed: Vec<KvPair> = serde_json::from_value(decoded.payload).unwrap();
        assert_eq!(parsed, pairs);
    }

    #[test]
    fn response_variants_round_trip() {
        for resp in [
            ResponseEnvelope::ack(12),
            ResponseEnvelope::close(),
            ResponseEnvelope::data(9, json!([{"a": "1"}, {"b": null}])),
            ResponseEnvelope::failure(4, "boom"),
        ] {
            let decoded = decode_response(&encode_response(&resp).unwrap()).unwrap();
            assert_eq!(decoded, resp);
        }
    }

    #[test]
    fn close_notice_carries_sentinel_id() {
        let decoded = decode_response(&encode_response(&ResponseEnvelope::close()).unwrap()).unwrap();
        assert_eq!(decoded.id, TEARDOWN_ID);
        assert_eq!(decoded.result, ResponseResult::Close);
        assert!(decoded.error.is_none());
    }

    #[test]
    fn malformed_input_is_reported_not_panicked() {
        for raw in ["", "not json", "{\"id\":", "[1,2,3]", "{\"id\":true}"] {
            assert!(matches!(
                decode_request(raw),
                Err(BridgeError::MalformedPayload(_))
            ));
            assert!(matches!(
                decode_response(raw),
                Err(BridgeError::MalformedPayload(_))
            ));
        }
    }

    #[test]
    fn unknown_request_type_still_decodes() {
        // Foreign types must not fail the envelope; dispatch drops them.
        let raw = r#"{"sender":"https://x.example","id":5,"type":"EXEC","payload":null}"#;
        let decoded = decode_request(raw).unwrap();
        assert_eq!(decoded.kind, MessageType::Unknown);
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let raw = r#"{"sender":"https://x.example","id":8,"type":"SYN"}"#;
        let decoded = decode_request(raw).unwrap();
        assert_eq!(decoded.payload, Value::Null);
    }

    fn arb_value() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            any::<i64>().prop_map(Value::from),
            "[a-z0-9 ]{0,16}".prop_map(Value::from),
        ]
    }

    proptest! {
        #[test]
        fn request_round_trip_law(
            sender in "[a-z.:/0-9]{1,24}",
            id in 1u64..u64::MAX,
            payload in arb_value(),
        ) {
            let req = RequestEnvelope::new(Origin::new(sender), id, MessageType::Set, payload);
            let decoded = decode_request(&encode_request(&req).unwrap()).unwrap();
            prop_assert_eq!(decoded, req);
        }

        #[test]
        fn response_round_trip_law(id in proptest::num::u64::ANY, payload in arb_value(), error in proptest::option::of("[a-z ]{0,12}")) {
            let resp = ResponseEnvelope {
                id,
                result: ResponseResult::Data(payload),
                error,
            };
            let decoded = decode_response(&encode_response(&resp).unwrap()).unwrap();
            prop_assert_eq!(decoded, resp);
        }
    }
}
