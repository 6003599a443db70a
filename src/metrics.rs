//! Prometheus metrics collection for roomcast.
//!
//! Tracks connection lifecycle, event throughput, handler errors, and
//! broadcast fan-out. Exposed in text format on the HTTP `/metrics` route.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Currently connected clients.
pub static CONNECTED_CLIENTS: OnceLock<IntGauge> = OnceLock::new();

/// Client events processed by type.
pub static EVENT_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Event handler errors by event and error kind.
pub static EVENT_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Chat messages accepted and broadcast.
pub static MESSAGES_SENT: OnceLock<IntCounter> = OnceLock::new();

/// Room broadcast fan-out: recipients per pushed event.
pub static BROADCAST_FANOUT: OnceLock<Histogram> = OnceLock::new();

/// Outbound events dropped because a client's send queue was full or gone.
pub static EVENTS_DROPPED: OnceLock<IntCounter> = OnceLock::new();

/// Mention notifications persisted.
pub static NOTIFICATIONS_CREATED: OnceLock<IntCounter> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            let m = $init.expect(concat!(stringify!($metric), " creation failed"));
            if let Err(e) = r.register(Box::new(m.clone())) {
                tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
            }
            let _ = $metric.set(m);
        };
    }

    register!(
        CONNECTED_CLIENTS,
        IntGauge::new("chat_connected_clients", "Currently connected clients")
    );
    register!(
        EVENT_COUNTER,
        IntCounterVec::new(
            Opts::new("chat_event_total", "Client events processed by type"),
            &["event"]
        )
    );
    register!(
        EVENT_ERRORS,
        IntCounterVec::new(
            Opts::new("chat_event_errors_total", "Event handler errors by kind"),
            &["event", "error"]
        )
    );
    register!(
        MESSAGES_SENT,
        IntCounter::new("chat_messages_sent_total", "Messages accepted and broadcast")
    );
    register!(
        BROADCAST_FANOUT,
        Histogram::with_opts(
            HistogramOpts::new("chat_broadcast_fanout", "Recipients per room broadcast")
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0])
        )
    );
    register!(
        EVENTS_DROPPED,
        IntCounter::new(
            "chat_events_dropped_total",
            "Outbound events dropped due to backpressure"
        )
    );
    register!(
        NOTIFICATIONS_CREATED,
        IntCounter::new(
            "chat_notifications_created_total",
            "Mention notifications persisted"
        )
    );
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

#[inline]
pub fn client_connected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.inc();
    }
}

#[inline]
pub fn client_disconnected() {
    if let Some(g) = CONNECTED_CLIENTS.get() {
        g.dec();
    }
}

/// Record a processed client event.
#[inline]
pub fn record_event(event: &str) {
    if let Some(c) = EVENT_COUNTER.get() {
        c.with_label_values(&[event]).inc();
    }
}

/// Record an event handler error.
#[inline]
pub fn record_event_error(event: &str, error: &str) {
    if let Some(c) = EVENT_ERRORS.get() {
        c.with_label_values(&[event, error]).inc();
    }
}

/// Record an accepted chat message.
#[inline]
pub fn record_message_sent() {
    if let Some(c) = MESSAGES_SENT.get() {
        c.inc();
    }
}

/// Record broadcast fan-out (how many connections received a room push).
#[inline]
pub fn record_fanout(recipients: usize) {
    if let Some(h) = BROADCAST_FANOUT.get() {
        h.observe(recipients as f64);
    }
}

/// Record an outbound event dropped on backpressure.
#[inline]
pub fn record_dropped() {
    if let Some(c) = EVENTS_DROPPED.get() {
        c.inc();
    }
}

/// Record persisted mention notifications.
#[inline]
pub fn record_notifications(count: usize) {
    if let Some(c) = NOTIFICATIONS_CREATED.get() {
        c.inc_by(count as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_lifecycle() {
        init();
        record_event("send_message");
        record_event_error("send_message", "not_registered");
        record_fanout(3);

        let output = gather_metrics();
        assert!(output.contains("chat_event_total"));
    }
}
