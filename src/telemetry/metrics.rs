//! Prometheus metrics setup and metric definitions

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle> {
    let buckets = vec![
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit zero values so HELP/TYPE lines are
/// present from startup.
pub fn describe_metrics() {
    // HTTP metrics
    describe_counter!("storefront_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "storefront_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "storefront_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    // Database pool metrics
    describe_gauge!(
        "storefront_db_pool_connections_active",
        "Number of active database connections"
    );
    describe_gauge!(
        "storefront_db_pool_connections_idle",
        "Number of idle database connections"
    );

    // Reconciliation metrics
    describe_counter!(
        "storefront_identity_reconcile_total",
        "Identity reconciliation runs by outcome"
    );
    describe_histogram!(
        "storefront_identity_reconcile_duration_seconds",
        "Identity reconciliation duration in seconds"
    );

    // Event hook metrics
    describe_counter!(
        "storefront_events_received_total",
        "Inbound events by name and result"
    );

    // Auth metrics
    describe_counter!("storefront_auth_login_total", "Total number of login attempts");
    describe_counter!(
        "storefront_auth_register_total",
        "Total number of emailpass registrations"
    );

    counter!("storefront_identity_reconcile_total", "outcome" => "created").absolute(0);
    histogram!("storefront_identity_reconcile_duration_seconds").record(0.0);
    counter!("storefront_events_received_total", "name" => "auth.identity.created", "result" => "processed")
        .absolute(0);
    counter!("storefront_auth_login_total", "result" => "success").absolute(0);
    counter!("storefront_auth_register_total", "result" => "success").absolute(0);
    gauge!("storefront_http_requests_in_flight").set(0.0);
}

/// Record connection pool usage
pub fn record_pool_stats(size: u32, idle: usize) {
    let idle = idle as f64;
    gauge!("storefront_db_pool_connections_active").set((size as f64 - idle).max(0.0));
    gauge!("storefront_db_pool_connections_idle").set(idle);
}
