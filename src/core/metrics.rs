// src/core/metrics.rs

//! Defines and registers Prometheus metrics for relay monitoring.
//!
//! This module uses `lazy_static` to ensure that metrics are registered only once
//! globally for the entire application lifecycle.

use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, TextEncoder, register_counter, register_gauge};

lazy_static! {
    // --- Upstream Session ---
    /// The total number of upstream connection attempts made by the supervisor.
    pub static ref CONNECTION_ATTEMPTS_TOTAL: Counter =
        register_counter!("otprelay_connection_attempts_total", "Total number of upstream connection attempts.").unwrap();
    /// 1 while the current upstream session has joined the namespace, 0 otherwise.
    pub static ref SESSION_JOINED: Gauge =
        register_gauge!("otprelay_session_joined", "Upstream namespace joined (1 for true, 0 for false).").unwrap();
    /// The total number of text frames received from upstream.
    pub static ref FRAMES_RECEIVED_TOTAL: Counter =
        register_counter!("otprelay_frames_received_total", "Total number of text frames received from upstream.").unwrap();
    /// The total number of application frames that decoded into an SMS event.
    pub static ref EVENTS_DECODED_TOTAL: Counter =
        register_counter!("otprelay_events_decoded_total", "Total number of SMS events decoded.").unwrap();
    /// The total number of application frames dropped because they did not decode.
    pub static ref FRAMES_DROPPED_TOTAL: Counter =
        register_counter!("otprelay_frames_dropped_total", "Total number of malformed application frames dropped.").unwrap();
    /// The total number of keepalive frames written upstream.
    pub static ref KEEPALIVES_SENT_TOTAL: Counter =
        register_counter!("otprelay_keepalives_sent_total", "Total number of keepalive frames sent.").unwrap();

    // --- Delivery ---
    /// The total number of alerts accepted by the downstream sink.
    pub static ref ALERTS_DELIVERED_TOTAL: Counter =
        register_counter!("otprelay_alerts_delivered_total", "Total number of alerts delivered.").unwrap();
    /// The total number of alerts dropped after exhausting all delivery attempts.
    pub static ref ALERTS_FAILED_TOTAL: Counter =
        register_counter!("otprelay_alerts_failed_total", "Total number of alerts that could not be delivered.").unwrap();
}

/// Gathers all registered metrics and encodes them in the Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder.encode_to_string(&metric_families).unwrap_or_default()
}
