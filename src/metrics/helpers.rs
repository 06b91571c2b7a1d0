//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    DISPATCH_LATENCY, DISPATCH_REQUESTS_TOTAL, MESSAGES_DISPATCHED_TOTAL, OUTBOX_DROPPED_TOTAL,
    OUTBOX_REJECTED_TOTAL, OUTBOX_REQUEUED_TOTAL, OUTBOX_SIZE, RENDER_LATENCY,
    TEMPLATE_CACHE_HITS, TEMPLATE_CACHE_MISSES, TEMPLATE_ERRORS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording template metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    pub fn record_cache_hit() {
        TEMPLATE_CACHE_HITS.inc();
    }

    pub fn record_cache_miss() {
        TEMPLATE_CACHE_MISSES.inc();
    }

    pub fn record_read_error() {
        TEMPLATE_ERRORS_TOTAL.with_label_values(&["read"]).inc();
    }

    pub fn record_compile_error() {
        TEMPLATE_ERRORS_TOTAL.with_label_values(&["compile"]).inc();
    }

    pub fn record_render_error() {
        TEMPLATE_ERRORS_TOTAL.with_label_values(&["render"]).inc();
    }

    /// Record the duration of a paired render in seconds
    pub fn record_render_latency(seconds: f64) {
        RENDER_LATENCY.observe(seconds);
    }
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record an accepted request carrying `messages` messages
    pub fn record_success(endpoint: &str, messages: u64) {
        DISPATCH_REQUESTS_TOTAL
            .with_label_values(&[endpoint, "success"])
            .inc();
        MESSAGES_DISPATCHED_TOTAL.inc_by(messages);
    }

    /// Record a request the API rejected, fully or partially
    pub fn record_api_error(endpoint: &str) {
        DISPATCH_REQUESTS_TOTAL
            .with_label_values(&[endpoint, "api_error"])
            .inc();
    }

    /// Record a request that never got a response
    pub fn record_transport_error(endpoint: &str) {
        DISPATCH_REQUESTS_TOTAL
            .with_label_values(&[endpoint, "transport_error"])
            .inc();
    }

    pub fn record_latency(endpoint: &str, seconds: f64) {
        DISPATCH_LATENCY.with_label_values(&[endpoint]).observe(seconds);
    }
}

/// Helper struct for recording outbox metrics
pub struct OutboxMetrics;

impl OutboxMetrics {
    pub fn set_size(size: usize) {
        OUTBOX_SIZE.set(size as i64);
    }

    pub fn record_rejected() {
        OUTBOX_REJECTED_TOTAL.inc();
    }

    pub fn record_requeued(count: u64) {
        OUTBOX_REQUEUED_TOTAL.inc_by(count);
    }

    pub fn record_dropped(count: u64) {
        OUTBOX_DROPPED_TOTAL.inc_by(count);
    }
}
