//! Prometheus metrics for the realtime client.
//!
//! - Connection lifecycle (opened, closed by initiator, current state)
//! - Reconnect scheduling and auth rejections
//! - Inbound frames dropped before dispatch, by reason
//! - Events dispatched to listeners and listener panics

mod helpers;

pub use helpers::{encode_metrics, ConnectionMetrics, DispatchMetrics, FrameMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "ara_realtime";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Transport connections that completed the handshake
    pub static ref CONNECTIONS_OPENED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_connections_opened_total", METRIC_PREFIX),
        "Total connections that completed the handshake"
    ).unwrap();

    /// Connection closes, by who initiated them (client/server)
    pub static ref CONNECTIONS_CLOSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_connections_closed_total", METRIC_PREFIX),
        "Total connection closes by initiator",
        &["initiator"]
    ).unwrap();

    /// Current connection state (see ConnectionState::as_gauge)
    pub static ref CONNECTION_STATE: IntGauge = register_int_gauge!(
        format!("{}_connection_state", METRIC_PREFIX),
        "Current connection state (0=unauthenticated 1=connecting 2=open 3=reconnecting 4=closed)"
    ).unwrap();

    /// Reconnect timers started
    pub static ref RECONNECTS_SCHEDULED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_reconnects_scheduled_total", METRIC_PREFIX),
        "Total reconnect attempts scheduled"
    ).unwrap();

    /// Reconnect budget exhausted
    pub static ref RECONNECTS_EXHAUSTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_reconnects_exhausted_total", METRIC_PREFIX),
        "Total times the reconnect budget ran out"
    ).unwrap();

    /// Closes with an auth-rejection code
    pub static ref AUTH_REJECTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_auth_rejections_total", METRIC_PREFIX),
        "Total connections closed by the server for authentication reasons"
    ).unwrap();

    // ============================================================================
    // Message Metrics
    // ============================================================================

    /// Inbound frames dropped before dispatch
    pub static ref FRAMES_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_frames_dropped_total", METRIC_PREFIX),
        "Total inbound frames dropped before dispatch",
        &["reason"]
    ).unwrap();

    /// Outbound messages handed to the transport
    pub static ref MESSAGES_SENT_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_sent_total", METRIC_PREFIX),
        "Total outbound messages handed to the transport"
    ).unwrap();

    /// Outbound messages discarded because the connection was not open
    pub static ref MESSAGES_DISCARDED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_discarded_total", METRIC_PREFIX),
        "Total outbound messages discarded while not connected"
    ).unwrap();

    /// Listener invocations
    pub static ref EVENTS_DISPATCHED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_events_dispatched_total", METRIC_PREFIX),
        "Total listener invocations that completed without panicking"
    ).unwrap();

    /// Listeners that panicked
    pub static ref LISTENER_PANICS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_listener_panics_total", METRIC_PREFIX),
        "Total listener panics caught during dispatch"
    ).unwrap();
}
