// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! WebSocket Carrier
//!
//! Real carrier implementation using tungstenite. The link is
//! point-to-point: the dialed hub is the only reachable peer, so every
//! inbound frame is tagged with the configured hub origin and the
//! destination argument of `send` is implicit in the connection. The
//! client's own origin travels in the handshake `Origin` header, which is
//! what the hub authenticates against.

use std::net::TcpStream;
use std::time::Duration;

use tungstenite::client::IntoClientRequest;
use tungstenite::http::HeaderValue;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

use crate::carrier::{Carrier, CarrierConfig, CarrierResult, InboundFrame};
use crate::error::BridgeError;
use crate::message::Origin;

/// WebSocket carrier for connecting a client to a remote hub.
pub struct WebSocketCarrier {
    socket: Option<WebSocket<MaybeTlsStream<TcpStream>>>,
    config: CarrierConfig,
    hub_origin: Origin,
}

impl WebSocketCarrier {
    /// Creates a disconnected carrier; `config.origin` is the local
    /// principal, `hub_origin` tags inbound frames.
    pub fn new(config: CarrierConfig, hub_origin: Origin) -> Self {
        WebSocketCarrier {
            socket: None,
            config,
            hub_origin,
        }
    }

    /// Dials the hub and completes the websocket handshake.
    pub fn connect(&mut self) -> CarrierResult<()> {
        if self.socket.is_some() {
            return Ok(());
        }

        let (host, port) = Self::parse_url(&self.config.url)?;
        let addr = format!("{host}:{port}");

        let tcp_stream = TcpStream::connect(&addr)
            .map_err(|e| BridgeError::CarrierFailure(e.to_string()))?;
        // recv() is a polling call; a short read timeout keeps it from
        // stalling the client's pump loop.
        tcp_stream
            .set_read_timeout(Some(Duration::from_millis(self.config.poll_timeout_ms)))
            .map_err(|e| BridgeError::CarrierFailure(e.to_string()))?;
        tcp_stream
            .set_write_timeout(Some(Duration::from_millis(self.config.connect_timeout_ms)))
            .map_err(|e| BridgeError::CarrierFailure(e.to_string()))?;

        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::CarrierFailure(format!("invalid hub url: {e}")))?;
        let origin_value = HeaderValue::from_str(self.config.origin.as_str())
            .map_err(|e| BridgeError::CarrierFailure(format!("invalid origin header: {e}")))?;
        request.headers_mut().insert("Origin", origin_value);

        let (socket, _response) =
            tungstenite::client(request, MaybeTlsStream::Plain(tcp_stream))
                .map_err(|e| BridgeError::CarrierFailure(format!("websocket handshake failed: {e}")))?;

        self.socket = Some(socket);
        Ok(())
    }

    /// Closes the connection. Safe to call when not connected.
    pub fn disconnect(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
        }
    }

    /// Splits a `ws://host[:port][/path]` URL into host and port.
    fn parse_url(url: &str) -> CarrierResult<(String, u16)> {
        let stripped = url.strip_prefix("ws://").ok_or_else(|| {
            BridgeError::CarrierFailure("invalid URL scheme (expected ws://)".into())
        })?;
        let host_port = stripped.split('/').next().unwrap_or(stripped);

        match host_port.rfind(':') {
            Some(colon) => {
                let host = &host_port[..colon];
                let port: u16 = host_port[colon + 1..]
                    .parse()
                    .map_err(|_| BridgeError::CarrierFailure(format!("invalid port in {url}")))?;
                Ok((host.to_string(), port))
            }
            None => Ok((host_port.to_string(), 80)),
        }
    }
}

impl Carrier for WebSocketCarrier {
    fn origin(&self) -> &Origin {
        &self.config.origin
    }

    fn ready(&self) -> bool {
        self.socket.is_some()
    }

    fn send(&mut self, _dest: &Origin, frame: &str) -> CarrierResult<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or(BridgeError::NotReady)?;
        socket
            .send(Message::Text(frame.to_string()))
            .map_err(|e| BridgeError::CarrierFailure(e.to_string()))?;
        socket
            .flush()
            .map_err(|e| BridgeError::CarrierFailure(format!("flush failed: {e}")))?;
        Ok(())
    }

    fn recv(&mut self) -> CarrierResult<Option<InboundFrame>> {
        let socket = match self.socket.as_mut() {
            Some(socket) => socket,
            None => return Ok(None),
        };

        match socket.read() {
            Ok(Message::Text(frame)) => Ok(Some(InboundFrame {
                origin: self.hub_origin.clone(),
                frame,
            })),
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload));
                Ok(None)
            }
            Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => Ok(None),
            Ok(Message::Binary(_)) => {
                // The protocol is text-only; binary frames are dropped.
                Ok(None)
            }
            Ok(Message::Close(_)) => {
                self.socket = None;
                Ok(None)
            }
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                self.socket = None;
                Ok(None)
            }
            Err(e) => Err(BridgeError::CarrierFailure(e.to_string())),
        }
    }

    fn has_pending(&self) -> bool {
        // The socket offers no cheap non-blocking check; recv() polls with
        // a short timeout instead.
        false
    }
}
