// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bridge Client
//!
//! The public-facing client object. All storage operations are gated behind
//! an affirmatively established connection: `store()` hands out a chainable
//! handle only while the link is connected, and every operation re-checks
//! the gate before touching the carrier.
//!
//! # Example
//!
//! ```ignore
//! use keybridge_core::{BridgeClient, ClientConfig, LoopbackBus};
//!
//! let bus = LoopbackBus::new();
//! let carrier = bus.endpoint("https://app.example");
//! let config = ClientConfig::new("https://store.example");
//! let mut client = BridgeClient::new(carrier, config);
//!
//! client.attach()?;
//! // ... pump() until connected ...
//! client.store()?.get(&["a", "b"], |reply| println!("{reply:?}"))?;
//! ```

use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace};
use uuid::Uuid;

use crate::carrier::Carrier;
use crate::codec::{decode_response, encode_request};
use crate::connection::{ConnectionLink, ConnectionState};
use crate::error::{BridgeError, BridgeResult};
use crate::message::{
    KvPair, MessageType, Origin, RequestEnvelope, ResponseEnvelope, ResponseResult, TEARDOWN_ID,
};
use crate::registry::{Completion, Reply, RequestKind, RequestRegistry};

/// Callback invoked with the client's unique identifier on incorporation
/// and on detachment.
pub type LifecycleCallback = Box<dyn Fn(&str) + Send>;

/// Configuration for a bridge client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Origin of the hub that owns the store; the only origin trusted for
    /// inbound responses.
    pub hub_origin: Origin,
    /// Fixed heartbeat interval.
    pub heartbeat_interval: Duration,
    /// Optional expiry after which pending requests are failed during
    /// `tick()`. `None` preserves the pending-forever behavior.
    pub request_expiry: Option<Duration>,
}

impl ClientConfig {
    pub fn new(hub_origin: impl Into<Origin>) -> Self {
        ClientConfig {
            hub_origin: hub_origin.into(),
            heartbeat_interval: Duration::from_secs(5),
            request_expiry: None,
        }
    }
}

/// Client endpoint of the bridge.
pub struct BridgeClient<C: Carrier> {
    link: ConnectionLink<C>,
    registry: RequestRegistry,
    client_id: String,
    request_expiry: Option<Duration>,
    on_incorporated: Option<LifecycleCallback>,
    on_detached: Option<LifecycleCallback>,
}

impl<C: Carrier> BridgeClient<C> {
    pub fn new(carrier: C, config: ClientConfig) -> Self {
        BridgeClient {
            link: ConnectionLink::new(carrier, config.hub_origin, config.heartbeat_interval),
            registry: RequestRegistry::new(),
            client_id: Uuid::new_v4().to_string(),
            request_expiry: config.request_expiry,
            on_incorporated: None,
            on_detached: None,
        }
    }

    /// Unique identifier of this client instance; carried as the MOUNT
    /// payload and passed to the lifecycle callbacks.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    pub fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }

    pub fn carrier(&self) -> &C {
        self.link.carrier()
    }

    /// Registers a callback fired when the hub acknowledges this client's
    /// handshake.
    pub fn on_incorporated(&mut self, callback: impl Fn(&str) + Send + 'static) {
        self.on_incorporated = Some(Box::new(callback));
    }

    /// Registers a callback fired when the hub tears the channel down or
    /// the client detaches itself.
    pub fn on_detached(&mut self, callback: impl Fn(&str) + Send + 'static) {
        self.on_detached = Some(Box::new(callback));
    }

    /// Issues the MOUNT handshake toward the hub and starts awaiting its
    /// acknowledgment. Valid once the carrier reports ready; may be called
    /// again after a teardown to re-handshake.
    pub fn attach(&mut self) -> BridgeResult<()> {
        if !self.link.carrier().ready() {
            return Err(BridgeError::NotReady);
        }
        let id = self.registry.allocate();
        let request = self.request(id, MessageType::Mount, Value::String(self.client_id.clone()));
        self.link.send_frame(&encode_request(&request)?)?;
        self.registry.register(id, RequestKind::Mount, Completion::discard());
        self.link.mark_awaiting();
        Ok(())
    }

    /// Detaches from the hub: best-effort UNMOUNT notice, local state reset.
    pub fn detach(&mut self) -> BridgeResult<()> {
        if self.link.state() == ConnectionState::Disconnected {
            return Ok(());
        }
        let id = self.registry.allocate();
        let request = self.request(id, MessageType::Unmount, Value::Null);
        // UNMOUNT receives no reply; nothing to register.
        self.link.send_frame(&encode_request(&request)?)?;
        self.link.on_close();
        if let Some(callback) = &self.on_detached {
            callback(&self.client_id);
        }
        Ok(())
    }

    /// Heartbeat driver; call on every timer tick. Emits a SYN probe when
    /// the fixed interval has elapsed and, when an expiry is configured,
    /// sweeps pending requests that outlived it.
    pub fn tick(&mut self) -> BridgeResult<()> {
        let now = Instant::now();
        if self.link.heartbeat_due(now) {
            // Heartbeats are fire-and-forget: they take a correlation id
            // but never enter the registry.
            let id = self.registry.allocate();
            let request = self.request(id, MessageType::Syn, Value::Null);
            self.link.send_frame(&encode_request(&request)?)?;
            self.link.note_heartbeat(now);
        }
        if let Some(expiry) = self.request_expiry {
            let swept = self.registry.sweep_expired(expiry);
            if swept > 0 {
                debug!(swept, "expired pending requests");
            }
        }
        Ok(())
    }

    /// Drains inbound frames through the connection and correlation logic.
    /// Frames from foreign origins and frames that do not decode are
    /// dropped here; they never reach the registry.
    pub fn pump(&mut self) -> BridgeResult<()> {
        while let Some(inbound) = self.link.carrier_mut().recv()? {
            if !self.link.accepts(&inbound.origin) {
                trace!(origin = %inbound.origin, "dropping frame from foreign origin");
                continue;
            }
            match decode_response(&inbound.frame) {
                Ok(response) => self.handle_response(response),
                Err(e) => debug!(error = %e, "dropping undecodable response"),
            }
        }
        Ok(())
    }

    /// Gated accessor: resolves to the chainable store handle only while
    /// connected, and fails with a descriptive connectivity error
    /// otherwise.
    pub fn store(&mut self) -> BridgeResult<StoreHandle<'_, C>> {
        self.check_gate()?;
        Ok(StoreHandle { client: self })
    }

    fn handle_response(&mut self, response: ResponseEnvelope) {
        match response.result {
            ResponseResult::Close if response.id == TEARDOWN_ID => {
                // Teardown broadcast: connectivity is revoked, pending
                // entries stay untouched (their callbacks never fire).
                debug!("hub teardown notice received");
                self.link.on_close();
                if let Some(callback) = &self.on_detached {
                    callback(&self.client_id);
                }
            }
            ResponseResult::Close => {
                debug!(id = response.id, "close marker without the sentinel id, dropped");
            }
            ResponseResult::Ack => {
                self.link.on_ack();
                if let Some(kind) = self.registry.acknowledge(response.id) {
                    if kind == RequestKind::Mount {
                        if let Some(callback) = &self.on_incorporated {
                            callback(&self.client_id);
                        }
                    }
                }
            }
            ResponseResult::Data(value) => {
                let reply: Reply = match response.error {
                    Some(error) => Err(error),
                    None => Ok(value),
                };
                if !self.registry.resolve(response.id, reply) {
                    trace!(id = response.id, "response with unknown correlation id discarded");
                }
            }
        }
    }

    fn check_gate(&self) -> BridgeResult<()> {
        if !self.link.is_connected() {
            return Err(BridgeError::NotConnected {
                hub_origin: self.link.hub_origin().to_string(),
                state: self.link.state().to_string(),
            });
        }
        Ok(())
    }

    fn request(&self, id: u64, kind: MessageType, payload: Value) -> RequestEnvelope {
        RequestEnvelope::new(self.link.carrier().origin().clone(), id, kind, payload)
    }

    fn issue(
        &mut self,
        kind: MessageType,
        payload: Value,
        completion: impl FnOnce(Reply) + Send + 'static,
    ) -> BridgeResult<()> {
        self.check_gate()?;
        let id = self.registry.allocate();
        let request = self.request(id, kind, payload);
        self.link.send_frame(&encode_request(&request)?)?;
        self.registry.register(id, RequestKind::Action, Completion::new(completion));
        Ok(())
    }
}

/// Chainable handle over the hub store.
///
/// Each operation validates its batch, issues the request, and hands the
/// same handle back, so calls compose: `store()?.get(..)?.set(..)?`.
pub struct StoreHandle<'a, C: Carrier> {
    client: &'a mut BridgeClient<C>,
}

impl<'a, C: Carrier> StoreHandle<'a, C> {
    /// Requests the values of `keys`. The completion receives one
    /// `{ key: value-or-null }` object per requested key, in request order.
    pub fn get(
        self,
        keys: &[&str],
        completion: impl FnOnce(Reply) + Send + 'static,
    ) -> BridgeResult<Self> {
        validate_batch(keys.len(), "get")?;
        let payload = serde_json::to_value(keys)
            .map_err(|e| BridgeError::InvalidBatch(e.to_string()))?;
        self.client.issue(MessageType::Get, payload, completion)?;
        Ok(self)
    }

    /// Writes `pairs`. The completion receives one `{ key: bool }` object
    /// per pair, in request order.
    pub fn set(
        self,
        pairs: &[KvPair],
        completion: impl FnOnce(Reply) + Send + 'static,
    ) -> BridgeResult<Self> {
        validate_batch(pairs.len(), "set")?;
        let payload = serde_json::to_value(pairs)
            .map_err(|e| BridgeError::InvalidBatch(e.to_string()))?;
        self.client.issue(MessageType::Set, payload, completion)?;
        Ok(self)
    }

    /// Removes `keys`. The completion receives one `{ key: bool }` object
    /// per key, in request order.
    pub fn delete(
        self,
        keys: &[&str],
        completion: impl FnOnce(Reply) + Send + 'static,
    ) -> BridgeResult<Self> {
        validate_batch(keys.len(), "delete")?;
        let payload = serde_json::to_value(keys)
            .map_err(|e| BridgeError::InvalidBatch(e.to_string()))?;
        self.client.issue(MessageType::Delete, payload, completion)?;
        Ok(self)
    }
}

/// The batch contract: a proper, non-empty sequence. Violations surface
/// synchronously and nothing is sent.
fn validate_batch(len: usize, operation: &str) -> BridgeResult<()> {
    if len == 0 {
        return Err(BridgeError::InvalidBatch(format!(
            "{operation} requires at least one entry"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode_request;
    use crate::loopback::{LoopbackBus, LoopbackCarrier};

    fn client(bus: &LoopbackBus) -> BridgeClient<LoopbackCarrier> {
        let carrier = bus.endpoint("https://app.example");
        let mut config = ClientConfig::new("https://store.example");
        config.heartbeat_interval = Duration::ZERO;
        BridgeClient::new(carrier, config)
    }

    #[test]
    fn gated_operations_fail_fast_with_zero_traffic() {
        let bus = LoopbackBus::new();
        let mut client = client(&bus);

        // Spec scenario: get before the handshake completes.
        let err = client.store().err().expect("gate must hold");
        assert!(matches!(err, BridgeError::NotConnected { .. }));
        assert!(client.carrier().sent_frames().is_empty());

        // Still gated while awaiting the first ack.
        client.attach().unwrap();
        assert_eq!(client.state(), ConnectionState::AwaitingAck);
        assert!(client.store().is_err());
        // Only the MOUNT frame ever went out.
        assert_eq!(client.carrier().sent_frames().len(), 1);
    }

    #[test]
    fn attach_requires_a_ready_carrier() {
        let bus = LoopbackBus::new();
        let mut carrier = bus.endpoint("https://app.example");
        carrier.set_ready(false);
        let mut client = BridgeClient::new(carrier, ClientConfig::new("https://store.example"));

        assert!(matches!(client.attach(), Err(BridgeError::NotReady)));
        assert!(client.carrier().sent_frames().is_empty());
    }

    #[test]
    fn attach_sends_mount_with_client_id() {
        let bus = LoopbackBus::new();
        let mut client = client(&bus);
        client.attach().unwrap();

        let (dest, raw) = &client.carrier().sent_frames()[0];
        assert_eq!(dest.as_str(), "https://store.example");
        let request = decode_request(raw).unwrap();
        assert_eq!(request.kind, MessageType::Mount);
        assert_eq!(request.sender, Origin::from("https://app.example"));
        assert_eq!(request.payload, Value::String(client.client_id().to_string()));
    }

    #[test]
    fn tick_is_idle_until_attached() {
        let bus = LoopbackBus::new();
        let mut client = client(&bus);
        client.tick().unwrap();
        assert!(client.carrier().sent_frames().is_empty());

        client.attach().unwrap();
        client.tick().unwrap();
        let (_, raw) = client.carrier().sent_frames().last().unwrap();
        assert_eq!(decode_request(raw).unwrap().kind, MessageType::Syn);
    }

    #[test]
    fn empty_batches_are_contract_violations() {
        let bus = LoopbackBus::new();
        let mut client = client(&bus);
        // Force the gate open without a hub.
        client.attach().unwrap();
        deliver_ack(&bus, &mut client);

        let sent_before = client.carrier().sent_frames().len();
        let err = client.store().unwrap().get(&[], |_| {}).err().unwrap();
        assert!(matches!(err, BridgeError::InvalidBatch(_)));
        assert_eq!(client.carrier().sent_frames().len(), sent_before);
    }

    #[test]
    fn foreign_origin_responses_are_dropped() {
        let bus = LoopbackBus::new();
        let mut stranger = bus.endpoint("https://evil.example");
        let mut client = client(&bus);
        client.attach().unwrap();

        // A spoofed ack from the wrong origin must not connect us.
        let ack = crate::codec::encode_response(&ResponseEnvelope::ack(1)).unwrap();
        stranger.send(&Origin::from("https://app.example"), &ack).unwrap();
        client.pump().unwrap();
        assert_eq!(client.state(), ConnectionState::AwaitingAck);
    }

    #[test]
    fn teardown_resets_state_without_firing_pending_callbacks() {
        let bus = LoopbackBus::new();
        let mut client = client(&bus);
        client.attach().unwrap();
        deliver_ack(&bus, &mut client);
        assert!(client.is_connected());

        let fired = std::sync::Arc::new(std::sync::Mutex::new(false));
        let flag = fired.clone();
        client
            .store()
            .unwrap()
            .get(&["a"], move |_| *flag.lock().unwrap() = true)
            .unwrap();
        assert_eq!(client.pending_count(), 1);

        let mut hub_end = bus.endpoint("https://store.example");
        let close = crate::codec::encode_response(&ResponseEnvelope::close()).unwrap();
        hub_end.send(&Origin::from("https://app.example"), &close).unwrap();
        client.pump().unwrap();

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!*fired.lock().unwrap());
        assert_eq!(client.pending_count(), 1);
    }

    #[test]
    fn detach_sends_unmount_and_resets_state() {
        let bus = LoopbackBus::new();
        let mut client = client(&bus);
        let detached = std::sync::Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let sink = detached.clone();
        client.on_detached(move |id| sink.lock().unwrap().push(id.to_string()));

        // Detaching while already disconnected is a no-op.
        client.detach().unwrap();
        assert!(client.carrier().sent_frames().is_empty());

        client.attach().unwrap();
        deliver_ack(&bus, &mut client);
        assert!(client.is_connected());

        client.detach().unwrap();
        assert_eq!(client.state(), ConnectionState::Disconnected);
        let (_, raw) = client.carrier().sent_frames().last().unwrap();
        assert_eq!(decode_request(raw).unwrap().kind, MessageType::Unmount);
        assert_eq!(detached.lock().unwrap().as_slice(), [client.client_id()]);
    }

    /// Routes a hub-origin ack for the most recent outbound request.
    fn deliver_ack(bus: &LoopbackBus, client: &mut BridgeClient<LoopbackCarrier>) {
        let (_, raw) = client.carrier().sent_frames().last().unwrap();
        let id = decode_request(raw).unwrap().id;
        let mut hub_end = bus.endpoint("https://store.example");
        let ack = crate::codec::encode_response(&ResponseEnvelope::ack(id)).unwrap();
        hub_end.send(&Origin::from("https://app.example"), &ack).unwrap();
        client.pump().unwrap();
    }
}
