//! Per-connection WebSocket pump.
//!
//! Bridges one websocket peer into the dispatcher: the HTTP `Origin`
//! header presented during the handshake is the authenticated principal,
//! inbound text frames go through the hub core one at a time, and
//! responses are routed back through the per-origin peer map.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use keybridge_core::{Origin, OutboundFrame};

use crate::metrics::HubMetrics;
use crate::SharedHub;

/// Routing table from origin to its live outbound channel.
///
/// The carrier is fire-and-forget: routing to an origin whose peer is gone
/// silently drops the frame.
#[derive(Clone, Default)]
pub struct PeerMap {
    inner: Arc<Mutex<HashMap<Origin, UnboundedSender<String>>>>,
}

impl PeerMap {
    pub fn new() -> Self {
        PeerMap::default()
    }

    pub fn insert(&self, origin: Origin, sender: UnboundedSender<String>) {
        self.inner
            .lock()
            .expect("peer map lock poisoned")
            .insert(origin, sender);
    }

    pub fn remove(&self, origin: &Origin) {
        self.inner
            .lock()
            .expect("peer map lock poisoned")
            .remove(origin);
    }

    /// Routes one outbound frame to its destination, if the peer is still
    /// connected.
    pub fn route(&self, out: OutboundFrame) {
        let inner = self.inner.lock().expect("peer map lock poisoned");
        if let Some(sender) = inner.get(&out.dest) {
            let _ = sender.send(out.frame);
        }
    }
}

/// Accepts the websocket handshake, authenticates the peer by its `Origin`
/// header, and runs the frame pump until the connection ends.
pub async fn handle_connection(
    stream: TcpStream,
    hub: SharedHub,
    peers: PeerMap,
    metrics: HubMetrics,
    max_frame_size: usize,
) {
    let mut origin_header: Option<String> = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        origin_header = request
            .headers()
            .get("origin")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        Ok(response)
    };

    let ws_stream = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            warn!(error = %e, "websocket handshake failed");
            metrics.connection_errors.inc();
            return;
        }
    };

    let origin = match origin_header {
        Some(origin) => Origin::new(origin),
        None => {
            // Without an Origin header there is no principal to filter on.
            warn!("peer offered no Origin header, dropping connection");
            metrics.connection_errors.inc();
            return;
        }
    };

    run_peer(ws_stream, origin.clone(), hub, &peers, metrics, max_frame_size).await;
    peers.remove(&origin);
    // Membership in the dispatcher outlives the socket; a reconnecting
    // client re-mounts and is simply re-acknowledged.
}

async fn run_peer(
    ws_stream: WebSocketStream<TcpStream>,
    origin: Origin,
    hub: SharedHub,
    peers: &PeerMap,
    metrics: HubMetrics,
    max_frame_size: usize,
) {
    let (mut sink, mut stream) = ws_stream.split();
    let (sender, mut outbound) = mpsc::unbounded_channel::<String>();
    peers.insert(origin.clone(), sender);
    info!(origin = %origin, "peer channel open");

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                match frame {
                    Some(frame) => {
                        if sink.send(Message::Text(frame)).await.is_err() {
                            break;
                        }
                        metrics.responses_sent.inc();
                    }
                    None => break,
                }
            }
            inbound = stream.next() => {
                match inbound {
                    Some(Ok(Message::Text(raw))) => {
                        if raw.len() > max_frame_size {
                            debug!(origin = %origin, size = raw.len(), "oversized frame dropped");
                            metrics.frames_unanswered.inc();
                            continue;
                        }
                        metrics.frames_received.inc();
                        // The lock serializes dispatcher access, preserving
                        // one-at-a-time handler execution.
                        let response = {
                            let mut hub = hub.lock().expect("hub lock poisoned");
                            hub.handle_frame(&origin, &raw)
                        };
                        match response {
                            Some(out) => peers.route(out),
                            None => metrics.frames_unanswered.inc(),
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = sink.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        // The protocol is text-only.
                        metrics.frames_unanswered.inc();
                    }
                    Some(Err(e)) => {
                        debug!(origin = %origin, error = %e, "websocket error");
                        break;
                    }
                }
            }
        }
    }

    info!(origin = %origin, "peer channel closed");
}
