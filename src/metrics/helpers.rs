//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    AUTH_REJECTIONS_TOTAL, CONNECTIONS_CLOSED_TOTAL, CONNECTIONS_OPENED_TOTAL, CONNECTION_STATE,
    EVENTS_DISPATCHED_TOTAL, FRAMES_DROPPED_TOTAL, LISTENER_PANICS_TOTAL,
    MESSAGES_DISCARDED_TOTAL, MESSAGES_SENT_TOTAL, RECONNECTS_EXHAUSTED_TOTAL,
    RECONNECTS_SCHEDULED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording connection lifecycle metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        CONNECTIONS_OPENED_TOTAL.inc();
    }

    /// Close initiated by this client (disconnect, logout, identity switch)
    pub fn record_closed_by_client() {
        CONNECTIONS_CLOSED_TOTAL.with_label_values(&["client"]).inc();
    }

    /// Close reported by the transport (server close, network loss)
    pub fn record_closed_by_server() {
        CONNECTIONS_CLOSED_TOTAL.with_label_values(&["server"]).inc();
    }

    pub fn record_reconnect_scheduled() {
        RECONNECTS_SCHEDULED_TOTAL.inc();
    }

    pub fn record_reconnects_exhausted() {
        RECONNECTS_EXHAUSTED_TOTAL.inc();
    }

    pub fn record_auth_rejected() {
        AUTH_REJECTIONS_TOTAL.inc();
    }

    pub fn set_state(state: i64) {
        CONNECTION_STATE.set(state);
    }
}

/// Helper struct for recording inbound/outbound frame metrics
pub struct FrameMetrics;

impl FrameMetrics {
    pub fn record_dropped(reason: &str) {
        FRAMES_DROPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_cross_tenant() {
        FRAMES_DROPPED_TOTAL.with_label_values(&["cross_tenant"]).inc();
    }

    pub fn record_sent() {
        MESSAGES_SENT_TOTAL.inc();
    }

    pub fn record_discarded() {
        MESSAGES_DISCARDED_TOTAL.inc();
    }
}

/// Helper struct for recording listener dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// `delivered` counts listeners that returned normally
    pub fn record_dispatched(delivered: usize) {
        EVENTS_DISPATCHED_TOTAL.inc_by(delivered as u64);
    }

    pub fn record_listener_panic() {
        LISTENER_PANICS_TOTAL.inc();
    }
}
