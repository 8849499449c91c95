// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Loopback Carrier
//!
//! In-memory carrier bus for tests and same-process embeddings. Every
//! endpoint is bound to one origin; a frame sent to an origin lands in that
//! endpoint's inbox tagged with the sender's origin. Fault injection knobs
//! (drop, duplicate) cover the delivery behavior the protocol must
//! tolerate.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::carrier::{Carrier, CarrierResult, InboundFrame};
use crate::message::Origin;

#[derive(Default)]
struct BusInner {
    inboxes: HashMap<Origin, VecDeque<InboundFrame>>,
}

/// Shared in-memory bus connecting loopback endpoints.
#[derive(Clone, Default)]
pub struct LoopbackBus {
    inner: Arc<Mutex<BusInner>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        LoopbackBus::default()
    }

    /// Registers an endpoint bound to `origin` and returns its carrier.
    /// The endpoint starts ready.
    pub fn endpoint(&self, origin: impl Into<Origin>) -> LoopbackCarrier {
        let origin = origin.into();
        self.inner
            .lock()
            .expect("loopback bus lock poisoned")
            .inboxes
            .entry(origin.clone())
            .or_default();
        LoopbackCarrier {
            origin,
            bus: self.inner.clone(),
            ready: true,
            drop_next: false,
            duplicate_next: false,
            sent: Vec::new(),
        }
    }
}

/// One endpoint on a [`LoopbackBus`].
pub struct LoopbackCarrier {
    origin: Origin,
    bus: Arc<Mutex<BusInner>>,
    ready: bool,
    drop_next: bool,
    duplicate_next: bool,
    sent: Vec<(Origin, String)>,
}

impl LoopbackCarrier {
    /// Overrides the readiness flag, e.g. to model a channel whose physical
    /// carrier has not finished establishing.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Loses the next sent frame in flight.
    pub fn drop_next_send(&mut self) {
        self.drop_next = true;
    }

    /// Delivers the next sent frame twice.
    pub fn duplicate_next_send(&mut self) {
        self.duplicate_next = true;
    }

    /// Everything this endpoint has attempted to send, including frames
    /// lost to fault injection.
    pub fn sent_frames(&self) -> &[(Origin, String)] {
        &self.sent
    }
}

impl Carrier for LoopbackCarrier {
    fn origin(&self) -> &Origin {
        &self.origin
    }

    fn ready(&self) -> bool {
        self.ready
    }

    fn send(&mut self, dest: &Origin, frame: &str) -> CarrierResult<()> {
        self.sent.push((dest.clone(), frame.to_string()));
        if self.drop_next {
            self.drop_next = false;
            return Ok(());
        }
        let copies = if self.duplicate_next {
            self.duplicate_next = false;
            2
        } else {
            1
        };
        let mut inner = self.bus.lock().expect("loopback bus lock poisoned");
        // A destination nobody registered swallows the frame, matching the
        // fire-and-forget contract.
        if let Some(inbox) = inner.inboxes.get_mut(dest) {
            for _ in 0..copies {
                inbox.push_back(InboundFrame {
                    origin: self.origin.clone(),
                    frame: frame.to_string(),
                });
            }
        }
        Ok(())
    }

    fn recv(&mut self) -> CarrierResult<Option<InboundFrame>> {
        let mut inner = self.bus.lock().expect("loopback bus lock poisoned");
        Ok(inner
            .inboxes
            .get_mut(&self.origin)
            .and_then(VecDeque::pop_front))
    }

    fn has_pending(&self) -> bool {
        let inner = self.bus.lock().expect("loopback bus lock poisoned");
        inner
            .inboxes
            .get(&self.origin)
            .is_some_and(|inbox| !inbox.is_empty())
    }
}
