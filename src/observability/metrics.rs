//! Metrics collection and exposition.
//!
//! # Metrics
//! - `catcher_captures_total` (counter): requests captured
//! - `catcher_blobs_written_total` (counter): opaque bodies stored
//! - `catcher_capture_failures_total` (counter): degraded captures by stage
//! - `catcher_subscribers` (gauge): live stream subscribers
//! - `catcher_deliveries_dropped_total` (counter): records a subscriber missed
//! - `catcher_history_size` (gauge): records held in memory
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Prometheus exporter is optional and runs on its own listener

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            describe();
            tracing::info!(address = %addr, "Metrics exporter listening");
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe() {
    describe_counter!("catcher_captures_total", "Requests captured");
    describe_counter!("catcher_blobs_written_total", "Opaque bodies written to blob storage");
    describe_counter!(
        "catcher_capture_failures_total",
        "Captures that degraded at a given stage"
    );
    describe_gauge!("catcher_subscribers", "Registered live stream subscribers");
    describe_counter!(
        "catcher_deliveries_dropped_total",
        "Records not delivered to a subscriber"
    );
    describe_gauge!("catcher_history_size", "Records held in the history cache");
}

pub fn record_capture() {
    counter!("catcher_captures_total").increment(1);
}

pub fn record_blob_written() {
    counter!("catcher_blobs_written_total").increment(1);
}

/// `stage` is one of `body`, `form`, `blob`, `persist`.
pub fn record_capture_failure(stage: &'static str) {
    counter!("catcher_capture_failures_total", "stage" => stage).increment(1);
}

pub fn set_subscribers(count: usize) {
    gauge!("catcher_subscribers").set(count as f64);
}

pub fn record_delivery_dropped(reason: &'static str) {
    counter!("catcher_deliveries_dropped_total", "reason" => reason).increment(1);
}

pub fn set_history_size(size: usize) {
    gauge!("catcher_history_size").set(size as f64);
}
