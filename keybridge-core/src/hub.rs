// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Hub Dispatcher
//!
//! Server-side core: maintains the set of incorporated origins, routes
//! inbound requests to handshake handling or storage actions, and emits
//! correlated responses. The sole trust boundary lives here: a message from
//! an origin that is neither incorporated (for anything but MOUNT) nor in
//! the candidate pool (for MOUNT) is dropped without a reply.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::adapter::StorageAdapter;
use crate::codec::{decode_request, encode_response};
use crate::message::{KvPair, MessageType, Origin, RequestEnvelope, ResponseEnvelope};

/// Minimal membership metadata for one incorporated origin.
#[derive(Debug, Clone)]
pub struct Membership {
    /// Unique identifier the client presented in its MOUNT payload.
    pub client_id: String,
    /// Unix time of incorporation (seconds).
    pub mounted_at: u64,
}

/// One outbound frame and the origin it must be routed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub dest: Origin,
    pub frame: String,
}

/// The central mediator owning the key-value store.
pub struct Hub<S: StorageAdapter> {
    /// Origins expected to connect; membership in this pool is the
    /// precondition for incorporation.
    pool: HashSet<Origin>,
    /// Incorporated origins and their membership metadata.
    observatory: HashMap<Origin, Membership>,
    storage: S,
    closed: bool,
}

impl<S: StorageAdapter> Hub<S> {
    pub fn new(candidates: impl IntoIterator<Item = Origin>, storage: S) -> Self {
        Hub {
            pool: candidates.into_iter().collect(),
            observatory: HashMap::new(),
            storage,
            closed: false,
        }
    }

    pub fn member_count(&self) -> usize {
        self.observatory.len()
    }

    pub fn is_member(&self, origin: &Origin) -> bool {
        self.observatory.contains_key(origin)
    }

    pub fn membership(&self, origin: &Origin) -> Option<&Membership> {
        self.observatory.get(origin)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Handles one inbound frame from `sender`, the carrier-authenticated
    /// origin. Returns the response frame to route back, if the request
    /// warrants one. Malformed, untrusted, and unrecognized messages all
    /// produce `None`.
    pub fn handle_frame(&mut self, sender: &Origin, raw: &str) -> Option<OutboundFrame> {
        if self.closed {
            return None;
        }
        let request = match decode_request(raw) {
            Ok(request) => request,
            Err(e) => {
                debug!(origin = %sender, error = %e, "dropping undecodable frame");
                return None;
            }
        };
        if request.sender != *sender {
            // The envelope field is client-supplied; the carrier origin wins.
            debug!(
                claimed = %request.sender,
                actual = %sender,
                "envelope sender differs from carrier origin"
            );
        }
        if !self.trusted(sender, request.kind) {
            // Expected filtering outcome, not a protocol error; trace only.
            let outcome = crate::error::BridgeError::UntrustedOrigin(sender.to_string());
            trace!(kind = request.kind.as_wire(), "{outcome}");
            return None;
        }

        let response = match request.kind {
            MessageType::Mount => Some(self.mount(sender, &request)),
            MessageType::Unmount => {
                self.unmount(sender);
                None
            }
            MessageType::Syn => Some(ResponseEnvelope::ack(request.id)),
            MessageType::Get => Some(self.get(request)),
            MessageType::Set => Some(self.set(request)),
            MessageType::Delete => Some(self.delete(request)),
            MessageType::Unknown => None,
        }?;

        match encode_response(&response) {
            Ok(frame) => Some(OutboundFrame {
                dest: sender.clone(),
                frame,
            }),
            Err(e) => {
                warn!(error = %e, "failed to encode response");
                None
            }
        }
    }

    /// Best-effort teardown: one close notice per incorporated origin,
    /// tagged with the reserved sentinel id. The hub stops handling frames
    /// afterwards.
    pub fn shutdown(&mut self) -> Vec<OutboundFrame> {
        self.closed = true;
        let frame = match encode_response(&ResponseEnvelope::close()) {
            Ok(frame) => frame,
            Err(_) => return Vec::new(),
        };
        info!(members = self.observatory.len(), "hub closing, broadcasting teardown notice");
        let notices = self
            .observatory
            .keys()
            .map(|origin| OutboundFrame {
                dest: origin.clone(),
                frame: frame.clone(),
            })
            .collect();
        self.observatory.clear();
        notices
    }

    /// MOUNT needs pool eligibility; every other type needs prior
    /// incorporation.
    fn trusted(&self, sender: &Origin, kind: MessageType) -> bool {
        match kind {
            MessageType::Mount => self.pool.contains(sender),
            _ => self.observatory.contains_key(sender),
        }
    }

    fn mount(&mut self, sender: &Origin, request: &RequestEnvelope) -> ResponseEnvelope {
        if !self.observatory.contains_key(sender) {
            let client_id = request.payload.as_str().unwrap_or_default().to_string();
            info!(origin = %sender, client_id = %client_id, "incorporated origin");
            self.observatory.insert(
                sender.clone(),
                Membership {
                    client_id,
                    mounted_at: unix_now(),
                },
            );
        }
        // Re-mount leaves membership untouched but is still acknowledged,
        // so a client whose first ack was lost can finish its handshake.
        ResponseEnvelope::ack(request.id)
    }

    fn unmount(&mut self, sender: &Origin) {
        if self.observatory.remove(sender).is_some() {
            info!(origin = %sender, "origin detached");
        }
    }

    fn get(&mut self, request: RequestEnvelope) -> ResponseEnvelope {
        let keys: Vec<String> = match serde_json::from_value(request.payload) {
            Ok(keys) => keys,
            Err(e) => return ResponseEnvelope::failure(request.id, format!("invalid GET payload: {e}")),
        };
        let entries = keys
            .iter()
            .map(|key| {
                let value = match self.storage.get(key) {
                    Ok(Some(value)) => value,
                    Ok(None) => Value::Null,
                    Err(e) => {
                        warn!(key = %key, error = %e, "adapter get failed");
                        Value::Null
                    }
                };
                single_entry(key, value)
            })
            .collect();
        ResponseEnvelope::data(request.id, Value::Array(entries))
    }

    fn set(&mut self, request: RequestEnvelope) -> ResponseEnvelope {
        let pairs: Vec<KvPair> = match serde_json::from_value(request.payload) {
            Ok(pairs) => pairs,
            Err(e) => return ResponseEnvelope::failure(request.id, format!("invalid SET payload: {e}")),
        };
        let entries = pairs
            .into_iter()
            .map(|pair| {
                let ok = match self.storage.set(&pair.key, pair.value) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(key = %pair.key, error = %e, "adapter set failed");
                        false
                    }
                };
                single_entry(&pair.key, Value::Bool(ok))
            })
            .collect();
        ResponseEnvelope::data(request.id, Value::Array(entries))
    }

    fn delete(&mut self, request: RequestEnvelope) -> ResponseEnvelope {
        let keys: Vec<String> = match serde_json::from_value(request.payload) {
            Ok(keys) => keys,
            Err(e) => {
                return ResponseEnvelope::failure(request.id, format!("invalid DELETE payload: {e}"))
            }
        };
        let entries = keys
            .iter()
            .map(|key| {
                let ok = match self.storage.delete(key) {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(key = %key, error = %e, "adapter delete failed");
                        false
                    }
                };
                single_entry(key, Value::Bool(ok))
            })
            .collect();
        ResponseEnvelope::data(request.id, Value::Array(entries))
    }
}

/// `{ key: value }` — the per-key result object shape.
fn single_entry(key: &str, value: Value) -> Value {
    let mut entry = serde_json::Map::with_capacity(1);
    entry.insert(key.to_string(), value);
    Value::Object(entry)
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
