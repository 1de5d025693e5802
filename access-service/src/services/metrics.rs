//! Prometheus metrics for access-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, HistogramVec, TextEncoder,
};

/// Authorization decisions by outcome (allowed, denied, bypass, error).
pub static AUTHZ_DECISIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "access_authz_decisions_total",
        "Total number of authorization decisions by outcome",
        &["outcome"]
    )
    .expect("Failed to register authz_decisions_total")
});

/// Grant rows touched by bulk propagation, by outcome (written, removed, unchanged, failed).
pub static BULK_ROWS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "access_bulk_rows_total",
        "Total number of grant rows processed by bulk role propagation",
        &["outcome"]
    )
    .expect("Failed to register bulk_rows_total")
});

/// Default grant seeding runs by role and outcome.
pub static SEEDING_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "access_default_seeding_total",
        "Total number of default grant seeding runs",
        &["role", "outcome"]
    )
    .expect("Failed to register default_seeding_total")
});

/// Catalog and grant mutations by audit action code.
pub static MUTATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "access_mutations_total",
        "Total number of audited mutations by action code",
        &["action"]
    )
    .expect("Failed to register mutations_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "access_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&AUTHZ_DECISIONS_TOTAL);
    Lazy::force(&BULK_ROWS_TOTAL);
    Lazy::force(&SEEDING_TOTAL);
    Lazy::force(&MUTATIONS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default()
}
