// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Carrier Trait
//!
//! Platform-agnostic abstraction for the origin-tagged message channel the
//! protocol rides on.

use crate::error::BridgeError;
use crate::message::Origin;

/// Result type for carrier operations.
pub type CarrierResult<T> = Result<T, BridgeError>;

/// One inbound frame with its transport-authenticated sender origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundFrame {
    pub origin: Origin,
    pub frame: String,
}

/// Configuration for carrier connections.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    /// Hub URL/address to dial.
    pub url: String,
    /// The local principal this carrier sends as.
    pub origin: Origin,
    /// Connection timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Receive poll timeout in milliseconds. Kept short: `recv` is a
    /// polling call driven from the client's pump loop.
    pub poll_timeout_ms: u64,
}

impl Default for CarrierConfig {
    fn default() -> Self {
        CarrierConfig {
            url: String::new(),
            origin: Origin::new(""),
            connect_timeout_ms: 10_000,
            poll_timeout_ms: 50,
        }
    }
}

/// Carrier trait for the underlying message channel.
///
/// The carrier is fire-and-forget and unordered: it may drop, duplicate, or
/// reorder any individual frame, and the protocol above is built to tolerate
/// that. It authenticates the sender origin of every inbound frame but
/// performs no filtering of its own; deciding which origins to trust is the
/// protocol core's job.
///
/// # Synchronous Interface
///
/// This trait uses synchronous polling methods for simplicity in the core
/// library. Platform implementations may internally use async runtimes but
/// expose a non-blocking interface here.
pub trait Carrier: Send {
    /// The local principal this carrier sends as.
    fn origin(&self) -> &Origin;

    /// True once outbound sends are valid.
    fn ready(&self) -> bool;

    /// Queues one opaque frame to the destination origin. Fire-and-forget:
    /// a returned `Ok` promises nothing about delivery.
    fn send(&mut self, dest: &Origin, frame: &str) -> CarrierResult<()>;

    /// Polls the next inbound frame, if any. Returns `Ok(None)` when no
    /// frame is available; never blocks beyond the configured poll timeout.
    fn recv(&mut self) -> CarrierResult<Option<InboundFrame>>;

    /// Non-blocking check for queued inbound frames.
    fn has_pending(&self) -> bool;
}
