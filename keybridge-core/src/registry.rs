// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Request Registry
//!
//! Tracks in-flight requests by correlation id, mapping each to a
//! single-shot completion. Entries resolve exactly once; a response whose
//! id is unknown is the caller's cue to discard it. There is no automatic
//! timeout eviction: a response that never arrives leaves its entry
//! pending, unless the owner opts into [`RequestRegistry::sweep_expired`].

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::error::BridgeError;
use crate::message::{CorrelationId, TEARDOWN_ID};

/// Outcome delivered to a completion: action result data, or the reported
/// error string from the response envelope.
pub type Reply = Result<Value, String>;

/// Single-shot completion handle for one pending request.
pub struct Completion(Box<dyn FnOnce(Reply) + Send>);

impl Completion {
    pub fn new(f: impl FnOnce(Reply) + Send + 'static) -> Self {
        Completion(Box::new(f))
    }

    /// A completion that discards its reply; used for requests whose only
    /// observable effect is a connection-state transition.
    pub fn discard() -> Self {
        Completion(Box::new(|_| {}))
    }

    fn fire(self, reply: Reply) {
        (self.0)(reply);
    }
}

/// What a registry entry was issued for.
///
/// Heartbeats are fire-and-forget pings and never enter the registry; their
/// acknowledgments act on the connection state alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Handshake request.
    Mount,
    /// Storage action (get/set/delete).
    Action,
}

struct Pending {
    kind: RequestKind,
    issued_at: Instant,
    completion: Completion,
}

/// Client-local table of in-flight requests.
pub struct RequestRegistry {
    next_id: CorrelationId,
    pending: HashMap<CorrelationId, Pending>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        RequestRegistry {
            next_id: TEARDOWN_ID + 1,
            pending: HashMap::new(),
        }
    }

    /// Allocates a fresh correlation id. Monotonic; never the teardown
    /// sentinel; never reused while a request is pending.
    pub fn allocate(&mut self) -> CorrelationId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Records an in-flight request under `id`.
    pub fn register(&mut self, id: CorrelationId, kind: RequestKind, completion: Completion) {
        self.pending.insert(
            id,
            Pending {
                kind,
                issued_at: Instant::now(),
                completion,
            },
        );
    }

    /// Resolves a data/error response. Fires and removes the entry exactly
    /// once; returns false for unknown ids (stale, duplicate, or foreign
    /// responses), which the caller discards.
    pub fn resolve(&mut self, id: CorrelationId, reply: Reply) -> bool {
        match self.pending.remove(&id) {
            Some(entry) => {
                entry.completion.fire(reply);
                true
            }
            None => false,
        }
    }

    /// Acknowledgment path: removes a terminal (non-heartbeat) entry
    /// without firing its completion, returning its kind. Heartbeat acks
    /// have no entry here and fall through to `None`.
    pub fn acknowledge(&mut self, id: CorrelationId) -> Option<RequestKind> {
        self.pending.remove(&id).map(|entry| entry.kind)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Fails every entry older than `expiry` with a reported error and
    /// removes it. Returns how many were swept. Opt-in: callers that want
    /// the source behavior (pending forever) simply never call this.
    pub fn sweep_expired(&mut self, expiry: Duration) -> usize {
        let now = Instant::now();
        let expired: Vec<CorrelationId> = self
            .pending
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.issued_at) > expiry)
            .map(|(id, _)| *id)
            .collect();
        for id in &expired {
            if let Some(entry) = self.pending.remove(id) {
                entry
                    .completion
                    .fire(Err(BridgeError::Expired(*id).to_string()));
            }
        }
        expired.len()
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        RequestRegistry::new()
    }
}
