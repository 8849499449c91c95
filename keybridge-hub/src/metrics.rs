//! Prometheus metrics for the hub server.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Metric set registered on a private registry.
#[derive(Clone)]
pub struct HubMetrics {
    registry: Registry,
    pub connections_total: IntCounter,
    pub connections_active: IntGauge,
    pub connection_errors: IntCounter,
    pub frames_received: IntCounter,
    pub frames_unanswered: IntCounter,
    pub responses_sent: IntCounter,
    pub members: IntGauge,
}

impl HubMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let connections_total = IntCounter::new(
            "keybridge_connections_total",
            "Total accepted WebSocket connections",
        )
        .expect("metric definition");
        let connections_active = IntGauge::new(
            "keybridge_connections_active",
            "Currently open WebSocket connections",
        )
        .expect("metric definition");
        let connection_errors = IntCounter::new(
            "keybridge_connection_errors_total",
            "Connections that failed during accept or handshake",
        )
        .expect("metric definition");
        let frames_received = IntCounter::new(
            "keybridge_frames_received_total",
            "Inbound protocol frames handed to the dispatcher",
        )
        .expect("metric definition");
        let frames_unanswered = IntCounter::new(
            "keybridge_frames_unanswered_total",
            "Inbound frames that produced no response (filtered, malformed, or one-way)",
        )
        .expect("metric definition");
        let responses_sent = IntCounter::new(
            "keybridge_responses_sent_total",
            "Outbound response frames written to peers",
        )
        .expect("metric definition");
        let members = IntGauge::new(
            "keybridge_members",
            "Origins currently incorporated by the dispatcher",
        )
        .expect("metric definition");

        let collectors: [Box<dyn prometheus::core::Collector>; 7] = [
            Box::new(connections_total.clone()),
            Box::new(connections_active.clone()),
            Box::new(connection_errors.clone()),
            Box::new(frames_received.clone()),
            Box::new(frames_unanswered.clone()),
            Box::new(responses_sent.clone()),
            Box::new(members.clone()),
        ];
        for collector in collectors {
            registry.register(collector).expect("metric registration");
        }

        HubMetrics {
            registry,
            connections_total,
            connections_active,
            connection_errors,
            frames_received,
            frames_unanswered,
            responses_sent,
            members,
        }
    }

    /// Encodes the registry in the Prometheus text format.
    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for HubMetrics {
    fn default() -> Self {
        HubMetrics::new()
    }
}
