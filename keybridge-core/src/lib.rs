// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Keybridge Core Library
//!
//! Cross-origin shared key-value state over a centrally-mediated,
//! fire-and-forget message channel.
//!
//! # Architecture
//!
//! - **Carrier trait**: platform-agnostic interface for the origin-tagged
//!   message channel
//! - **Message types + codec**: the wire protocol (one JSON string per
//!   frame)
//! - **Connection link**: client-side handshake/heartbeat state machine
//! - **Request registry**: correlation of in-flight requests to single-shot
//!   completions
//! - **Bridge client**: gated, chainable get/set/delete facade
//! - **Hub dispatcher**: origin trust boundary, action routing, per-key
//!   error isolation, teardown broadcast
//! - **Storage adapters**: the key-value collaborators behind the hub
//!
//! # Example
//!
//! ```ignore
//! use keybridge_core::{
//!     BridgeClient, ClientConfig, Hub, LoopbackBus, MemoryAdapter, Origin,
//! };
//!
//! let bus = LoopbackBus::new();
//! let mut hub = Hub::new([Origin::from("https://app.example")], MemoryAdapter::new());
//! let mut hub_end = bus.endpoint("https://store.example");
//!
//! let mut client = BridgeClient::new(
//!     bus.endpoint("https://app.example"),
//!     ClientConfig::new("https://store.example"),
//! );
//! client.attach()?;
//! // ... pump frames between the two endpoints ...
//! client.store()?.get(&["a"], |reply| println!("{reply:?}"))?;
//! ```

pub mod adapter;
pub mod carrier;
pub mod client;
pub mod codec;
pub mod connection;
pub mod error;
pub mod hub;
pub mod loopback;
pub mod message;
pub mod registry;

#[cfg(feature = "websocket")]
pub mod websocket;

// Error types
pub use error::{AdapterError, BridgeError, BridgeResult};

// Message types
pub use message::{
    CorrelationId, KvPair, MessageType, Origin, RequestEnvelope, ResponseEnvelope, ResponseResult,
    TEARDOWN_ID,
};

// Codec
pub use codec::{decode_request, decode_response, encode_request, encode_response};

// Carrier abstraction
pub use carrier::{Carrier, CarrierConfig, CarrierResult, InboundFrame};

// Loopback carrier for tests and same-process embeddings
pub use loopback::{LoopbackBus, LoopbackCarrier};

// WebSocket carrier for remote hubs
#[cfg(feature = "websocket")]
pub use websocket::WebSocketCarrier;

// Connection management
pub use connection::{ConnectionLink, ConnectionState};

// Request correlation
pub use registry::{Completion, Reply, RequestKind, RequestRegistry};

// Client facade
pub use client::{BridgeClient, ClientConfig, LifecycleCallback, StoreHandle};

// Hub dispatcher
pub use hub::{Hub, Membership, OutboundFrame};

// Storage adapters
pub use adapter::{
    create_adapter, AdapterResult, MemoryAdapter, SqliteAdapter, StorageAdapter, StorageBackend,
};
