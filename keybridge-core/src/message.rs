// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire Protocol Message Types
//!
//! Envelope types exchanged between clients and the hub. Requests travel
//! client to hub, responses hub to client; nothing else crosses the carrier.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Correlation id pairing a request with its eventual response.
///
/// Drawn from a monotonically increasing, client-local generator. Unique
/// among concurrently pending requests on one client; never reused while
/// pending.
pub type CorrelationId = u64;

/// Reserved correlation id for the hub's teardown broadcast.
///
/// The client-side generator starts above it and never produces it, so the
/// teardown notice can never collide with an in-flight request.
pub const TEARDOWN_ID: CorrelationId = 0;

/// Security principal identifying a script execution context
/// (scheme+host+port equivalent). Equality is exact string match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    /// Wraps an origin string.
    pub fn new(origin: impl Into<String>) -> Self {
        Origin(origin.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Origin {
    fn from(origin: &str) -> Self {
        Origin(origin.to_string())
    }
}

impl From<String> for Origin {
    fn from(origin: String) -> Self {
        Origin(origin)
    }
}

/// Message types understood by the hub.
///
/// A closed set: dispatch is a fixed match over these variants, never a
/// method-name lookup. Wire names are matched case-insensitively; anything
/// unrecognized decodes as `Unknown` and is dropped on dispatch, so one
/// foreign frame cannot poison the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Handshake carrying the client's unique identifier as payload.
    Mount,
    /// Detach notice; removes the sender from the hub's trusted set.
    Unmount,
    /// Heartbeat probe; acknowledged without any state change.
    Syn,
    /// Read a batch of keys.
    Get,
    /// Write a batch of key/value pairs.
    Set,
    /// Remove a batch of keys.
    Delete,
    /// Anything else found on the wire.
    Unknown,
}

impl MessageType {
    /// Upper-case wire name.
    pub fn as_wire(&self) -> &'static str {
        match self {
            MessageType::Mount => "MOUNT",
            MessageType::Unmount => "UNMOUNT",
            MessageType::Syn => "SYN",
            MessageType::Get => "GET",
            MessageType::Set => "SET",
            MessageType::Delete => "DELETE",
            MessageType::Unknown => "UNKNOWN",
        }
    }

    /// Case-insensitive parse; unrecognized names map to `Unknown`.
    pub fn from_wire(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "MOUNT" => MessageType::Mount,
            "UNMOUNT" => MessageType::Unmount,
            "SYN" => MessageType::Syn,
            "GET" => MessageType::Get,
            "SET" => MessageType::Set,
            "DELETE" => MessageType::Delete,
            _ => MessageType::Unknown,
        }
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_wire())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(MessageType::from_wire(&name))
    }
}

/// One key/value pair in a SET batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KvPair {
    pub key: String,
    pub value: Value,
}

impl KvPair {
    pub fn new(key: impl Into<String>, value: Value) -> Self {
        KvPair {
            key: key.into(),
            value,
        }
    }
}

/// Request envelope, sent client to hub.
///
/// The `sender` field is client-supplied data; trust decisions use the
/// carrier-authenticated origin instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub sender: Origin,
    pub id: CorrelationId,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub payload: Value,
}

impl RequestEnvelope {
    pub fn new(sender: Origin, id: CorrelationId, kind: MessageType, payload: Value) -> Self {
        RequestEnvelope {
            sender,
            id,
            kind,
            payload,
        }
    }
}

/// Result slot of a response: a bare acknowledgment, the hub's close
/// marker, or action data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    /// Bare acknowledgment, no data payload. Drives the client's
    /// connection state only.
    Ack,
    /// Teardown marker; only valid together with [`TEARDOWN_ID`].
    Close,
    /// Action result data.
    Data(Value),
}

/// Response envelope, sent hub to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: CorrelationId,
    pub result: ResponseResult,
    pub error: Option<String>,
}

impl ResponseEnvelope {
    /// Acknowledgment for a handshake or heartbeat request.
    pub fn ack(id: CorrelationId) -> Self {
        ResponseEnvelope {
            id,
            result: ResponseResult::Ack,
            error: None,
        }
    }

    /// Teardown notice, tagged with the reserved sentinel id.
    pub fn close() -> Self {
        ResponseEnvelope {
            id: TEARDOWN_ID,
            result: ResponseResult::Close,
            error: None,
        }
    }

    /// Successful action result.
    pub fn data(id: CorrelationId, value: Value) -> Self {
        ResponseEnvelope {
            id,
            result: ResponseResult::Data(value),
            error: None,
        }
    }

    /// Whole-call failure: `{ result: null, error: message }`.
    pub fn failure(id: CorrelationId, message: impl Into<String>) -> Self {
        ResponseEnvelope {
            id,
            result: ResponseResult::Data(Value::Null),
            error: Some(message.into()),
        }
    }
}
