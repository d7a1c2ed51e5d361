//! Prometheus metrics for ingestion observability.

use std::time::Duration;

use metrics::{counter, histogram};

/// Initialize metrics exporter (Prometheus).
pub fn init_metrics() {
    let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    if let Err(e) = builder.install() {
        tracing::warn!("Failed to install Prometheus exporter: {}", e);
    }
}

/// Record a webhook delivery and how it was answered.
pub fn webhook_received(event_type: &str, outcome: &'static str) {
    counter!(
        "dashboard_webhooks_received_total",
        "event" => event_type.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

/// Record a pipeline upsert (`created` or `updated`).
pub fn pipeline_upserted(kind: &'static str) {
    counter!("dashboard_pipelines_upserted_total", "kind" => kind).increment(1);
}

/// Record job/step records appended to the history.
pub fn job_records_appended(count: usize) {
    counter!("dashboard_job_records_total").increment(count as u64);
}

/// Record a failed job-detail fetch.
pub fn job_fetch_failed(kind: &'static str) {
    counter!("dashboard_job_fetch_failures_total", "kind" => kind).increment(1);
}

/// Record job-detail fetch latency.
pub fn job_fetch_duration(elapsed: Duration) {
    histogram!("dashboard_job_fetch_duration_ms").record(elapsed.as_secs_f64() * 1000.0);
}
