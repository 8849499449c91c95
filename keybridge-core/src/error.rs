// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bridge error types.

use thiserror::Error;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by the protocol core.
///
/// Propagation policy: filtering failures (`MalformedPayload`,
/// `UntrustedOrigin`) are swallowed at the boundary where the offending
/// message is dropped; adapter failures are turned into per-entry response
/// data by the dispatcher; connectivity and contract failures are the only
/// ones surfaced synchronously to callers.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// A frame that did not decode as a protocol envelope. Callers treat
    /// this as "ignore the message", never as a fatal condition.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Sender origin is neither incorporated nor pool-eligible. Never
    /// replied to, never surfaced over the carrier.
    #[error("untrusted origin: {0}")]
    UntrustedOrigin(String),

    /// The storage adapter failed for one key or pair.
    #[error("adapter failure: {0}")]
    AdapterFailure(String),

    /// A gated operation was attempted while the connection was not
    /// affirmatively established. No carrier I/O was performed.
    #[error("not connected to hub {hub_origin} (connection state: {state})")]
    NotConnected { hub_origin: String, state: String },

    /// Batch argument failed validation; nothing was sent.
    #[error("invalid batch: {0}")]
    InvalidBatch(String),

    /// The underlying carrier failed to send or receive.
    #[error("carrier failure: {0}")]
    CarrierFailure(String),

    /// Outbound sends are not valid yet.
    #[error("carrier not ready")]
    NotReady,

    /// A pending request outlived the configured expiry (optional-expiry
    /// sweeps only; disabled by default).
    #[error("request {0} expired before a response arrived")]
    Expired(u64),
}

/// Storage adapter error types.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("adapter failure: {0}")]
    Failure(String),
}
