// Prometheus metrics for the reporpc API

use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::Once;

lazy_static! {
    // Global registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Batches received total
    pub static ref BATCHES_RECEIVED: IntCounter = IntCounter::new(
        "reporpc_batches_received_total",
        "Total number of evaluation batches received"
    )
    .expect("metric can be created");

    // Requests executed total (counter with project and status labels)
    pub static ref REQUESTS_EXECUTED: CounterVec = CounterVec::new(
        Opts::new("reporpc_requests_executed_total", "Total number of execution requests finished"),
        &["project", "status"]
    )
    .expect("metric can be created");

    // Execution time histogram (in milliseconds)
    pub static ref EXECUTION_TIME: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "reporpc_execution_time_ms",
            "Successful execution time in milliseconds"
        )
        .buckets(vec![100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0]),
        &["project"]
    )
    .expect("metric can be created");

    // Batches rejected before dispatch
    pub static ref BATCHES_REJECTED: CounterVec = CounterVec::new(
        Opts::new("reporpc_batches_rejected_total", "Total batches rejected due to validation"),
        &["reason"]
    )
    .expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry; safe to call more than once
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(BATCHES_RECEIVED.clone()))
            .expect("collector can be registered");

        REGISTRY
            .register(Box::new(REQUESTS_EXECUTED.clone()))
            .expect("collector can be registered");

        REGISTRY
            .register(Box::new(EXECUTION_TIME.clone()))
            .expect("collector can be registered");

        REGISTRY
            .register(Box::new(BATCHES_REJECTED.clone()))
            .expect("collector can be registered");
    });
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn record_batch_received() {
    BATCHES_RECEIVED.inc();
}

pub fn record_batch_rejected(reason: &str) {
    BATCHES_REJECTED.with_label_values(&[reason]).inc();
}

/// Record one finished request; `status` is "ok" or an error kind
pub fn record_request(project: &str, status: &str, execution_time_ms: Option<u64>) {
    REQUESTS_EXECUTED.with_label_values(&[project, status]).inc();
    if let Some(ms) = execution_time_ms {
        EXECUTION_TIME.with_label_values(&[project]).observe(ms as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        init_metrics();
        init_metrics();

        record_request("project1", "ok", Some(120));
        record_batch_rejected("batch_too_large");

        let text = render_metrics().unwrap();
        assert!(text.contains("reporpc_requests_executed_total"));
        assert!(text.contains("project=\"project1\""));
        assert!(text.contains("reason=\"batch_too_large\""));
    }
}
