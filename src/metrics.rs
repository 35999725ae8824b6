//! Prometheus counters for the order engine, exposed at `/metrics`.

use lazy_static::lazy_static;
use prometheus::{register_int_counter, Encoder, IntCounter, TextEncoder};

lazy_static! {
    pub static ref ORDER_CREATIONS: IntCounter = register_int_counter!(
        "tressa_order_creations_total",
        "Total number of orders created"
    )
    .expect("metric can be created");
    pub static ref ORDER_CREATION_FAILURES: IntCounter = register_int_counter!(
        "tressa_order_creation_failures_total",
        "Total number of failed order creations"
    )
    .expect("metric can be created");
    pub static ref ORDER_STATUS_UPDATES: IntCounter = register_int_counter!(
        "tressa_order_status_updates_total",
        "Total number of accepted order status transitions"
    )
    .expect("metric can be created");
    pub static ref ORDER_STATUS_REJECTIONS: IntCounter = register_int_counter!(
        "tressa_order_status_rejections_total",
        "Total number of rejected order status transitions"
    )
    .expect("metric can be created");
    pub static ref PUBLISH_FAILURES: IntCounter = register_int_counter!(
        "tressa_event_publish_failures_total",
        "Total number of failed order event publishes"
    )
    .expect("metric can be created");
}

/// Renders the default registry in Prometheus text format.
pub fn metrics_handler() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
