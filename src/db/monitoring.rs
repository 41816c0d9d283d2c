// src/db/monitoring.rs

use std::time::Instant;

use log::debug;
use once_cell::sync::Lazy;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec,
    TextEncoder,
};

use super::error::RepoError;

pub static DB_OPERATION_COUNTER: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "people_db_operations_total",
        "Total number of repository operations executed",
        &["operation", "outcome"]
    )
    .expect("Failed to create DB_OPERATION_COUNTER")
});

pub static DB_OPERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "people_db_operation_duration_seconds",
        "Duration of repository operations in seconds",
        &["operation"],
        vec![0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to create DB_OPERATION_DURATION")
});

/// Runs one repository operation and records its outcome and duration.
pub fn measure<T, F>(operation: &str, f: F) -> Result<T, RepoError>
where
    F: FnOnce() -> Result<T, RepoError>,
{
    let start = Instant::now();
    let result = f();
    let secs = start.elapsed().as_secs_f64();

    let outcome = if result.is_ok() { "ok" } else { "error" };
    DB_OPERATION_COUNTER
        .with_label_values(&[operation, outcome])
        .inc();
    DB_OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(secs);

    debug!("DB operation {} took {:.4} seconds ({})", operation, secs, outcome);
    result
}

/// Default registry in the Prometheus text exposition format.
pub fn gather_metrics() -> prometheus::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
