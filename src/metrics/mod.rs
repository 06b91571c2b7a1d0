//! Prometheus metrics for the mail client.
//!
//! - Template metrics (cache hits/misses, compile failures, render latency)
//! - Dispatch metrics (requests per endpoint and outcome, latency)
//! - Outbox metrics (size, rejections, re-queued and dropped messages)

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, OutboxMetrics, TemplateMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "trebuchet";

lazy_static! {
    // ============================================================================
    // Template Metrics
    // ============================================================================

    /// Compiled template lookups served from the cache
    pub static ref TEMPLATE_CACHE_HITS: IntCounter = register_int_counter!(
        format!("{}_template_cache_hits_total", METRIC_PREFIX),
        "Compiled template lookups served from the cache"
    ).unwrap();

    /// Compiled template lookups that had to read and compile the source file
    pub static ref TEMPLATE_CACHE_MISSES: IntCounter = register_int_counter!(
        format!("{}_template_cache_misses_total", METRIC_PREFIX),
        "Compiled template lookups that read and compiled the source file"
    ).unwrap();

    /// Template failures by stage (read, compile, render)
    pub static ref TEMPLATE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_template_errors_total", METRIC_PREFIX),
        "Template failures by stage",
        &["stage"]
    ).unwrap();

    /// Time to render an HTML/text body pair
    pub static ref RENDER_LATENCY: Histogram = register_histogram!(
        format!("{}_render_latency_seconds", METRIC_PREFIX),
        "Time to render an HTML/text body pair in seconds",
        vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]
    ).unwrap();

    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Outbound API requests by endpoint and outcome
    pub static ref DISPATCH_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_requests_total", METRIC_PREFIX),
        "Outbound API requests",
        &["endpoint", "outcome"]
    ).unwrap();

    /// Messages carried by successful requests
    pub static ref MESSAGES_DISPATCHED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_dispatched_total", METRIC_PREFIX),
        "Messages accepted by the API"
    ).unwrap();

    /// Outbound request latency by endpoint
    pub static ref DISPATCH_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_dispatch_latency_seconds", METRIC_PREFIX),
        "Outbound API request latency in seconds",
        &["endpoint"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Outbox Metrics
    // ============================================================================

    /// Messages currently waiting in the outbox
    pub static ref OUTBOX_SIZE: IntGauge = register_int_gauge!(
        format!("{}_outbox_size", METRIC_PREFIX),
        "Messages waiting in the outbox"
    ).unwrap();

    /// Enqueue attempts rejected at capacity
    pub static ref OUTBOX_REJECTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_outbox_rejected_total", METRIC_PREFIX),
        "Enqueue attempts rejected because the outbox was full"
    ).unwrap();

    /// Messages put back into the outbox after a failed batch
    pub static ref OUTBOX_REQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_outbox_requeued_total", METRIC_PREFIX),
        "Messages put back into the outbox after a failed batch"
    ).unwrap();

    /// Messages from failed batches that were lost
    pub static ref OUTBOX_DROPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_outbox_dropped_total", METRIC_PREFIX),
        "Messages from failed batches that were discarded"
    ).unwrap();
}
