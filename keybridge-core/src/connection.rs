// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Connection Link
//!
//! Client-side model of handshake and heartbeat progress. The handshake and
//! the heartbeat share a single state: any acknowledgment from the hub
//! confirms connectivity, and only the hub's explicit close notice revokes
//! it. A lost heartbeat after the initial connection never reverts the
//! state on its own.

use std::time::{Duration, Instant};

use crate::carrier::{Carrier, CarrierResult};
use crate::message::Origin;

/// Connection state of a client toward its hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not attached, or detached by the hub's close notice.
    Disconnected,
    /// MOUNT sent, no acknowledgment seen yet.
    AwaitingAck,
    /// An acknowledgment (handshake or heartbeat) has arrived.
    Connected,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::AwaitingAck => "awaiting-ack",
            ConnectionState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Owns the carrier and the connection state toward one hub origin.
pub struct ConnectionLink<C: Carrier> {
    carrier: C,
    hub_origin: Origin,
    state: ConnectionState,
    heartbeat_interval: Duration,
    last_heartbeat: Option<Instant>,
}

impl<C: Carrier> ConnectionLink<C> {
    pub fn new(carrier: C, hub_origin: Origin, heartbeat_interval: Duration) -> Self {
        ConnectionLink {
            carrier,
            hub_origin,
            state: ConnectionState::Disconnected,
            heartbeat_interval,
            last_heartbeat: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn hub_origin(&self) -> &Origin {
        &self.hub_origin
    }

    pub fn carrier(&self) -> &C {
        &self.carrier
    }

    pub fn carrier_mut(&mut self) -> &mut C {
        &mut self.carrier
    }

    /// True when an inbound frame's sender is the configured hub origin.
    /// Everything else is filtered before any processing.
    pub fn accepts(&self, origin: &Origin) -> bool {
        *origin == self.hub_origin
    }

    /// Sends one frame to the hub.
    pub fn send_frame(&mut self, frame: &str) -> CarrierResult<()> {
        let dest = self.hub_origin.clone();
        self.carrier.send(&dest, frame)
    }

    /// MOUNT has been issued; an acknowledgment is outstanding.
    pub fn mark_awaiting(&mut self) {
        self.state = ConnectionState::AwaitingAck;
    }

    /// Any acknowledgment (handshake or heartbeat) confirms connectivity.
    pub fn on_ack(&mut self) {
        self.state = ConnectionState::Connected;
    }

    /// The hub's close notice revokes connectivity; nothing else does.
    pub fn on_close(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.last_heartbeat = None;
    }

    /// True when the recurring heartbeat should fire: the link is attached
    /// and the fixed interval has elapsed since the last probe.
    pub fn heartbeat_due(&self, now: Instant) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        match self.last_heartbeat {
            None => true,
            Some(last) => now.duration_since(last) >= self.heartbeat_interval,
        }
    }

    pub fn note_heartbeat(&mut self, now: Instant) {
        self.last_heartbeat = Some(now);
    }
}

// INLINE_TEST_REQUIRED: Tests private state transitions and heartbeat timing
#[cfg(test)]
mod tests {
    use super::*;
    use crate::loopback::LoopbackBus;

    fn link(interval: Duration) -> ConnectionLink<crate::loopback::LoopbackCarrier> {
        let bus = LoopbackBus::new();
        let carrier = bus.endpoint("https://app.example");
        ConnectionLink::new(carrier, Origin::from("https://store.example"), interval)
    }

    #[test]
    fn starts_disconnected() {
        let link = link(Duration::from_secs(1));
        assert_eq!(link.state(), ConnectionState::Disconnected);
        assert!(!link.is_connected());
    }

    #[test]
    fn ack_connects_and_close_disconnects() {
        let mut link = link(Duration::from_secs(1));
        link.mark_awaiting();
        assert_eq!(link.state(), ConnectionState::AwaitingAck);

        link.on_ack();
        assert!(link.is_connected());

        link.on_close();
        assert_eq!(link.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn heartbeat_is_idle_while_disconnected() {
        let link = link(Duration::ZERO);
        assert!(!link.heartbeat_due(Instant::now()));
    }

    #[test]
    fn heartbeat_fires_on_interval_once_attached() {
        let mut link = link(Duration::from_millis(10));
        link.mark_awaiting();

        let now = Instant::now();
        assert!(link.heartbeat_due(now));
        link.note_heartbeat(now);
        assert!(!link.heartbeat_due(now));
        assert!(link.heartbeat_due(now + Duration::from_millis(10)));
    }

    #[test]
    fn only_the_hub_origin_is_accepted() {
        let link = link(Duration::ZERO);
        assert!(link.accepts(&Origin::from("https://store.example")));
        assert!(!link.accepts(&Origin::from("https://evil.example")));
    }
}
