//! Metrics recording for the `SQLite` record store.

use std::time::Instant;

/// Records the count and latency of one store operation.
///
/// Emits `storage_operations_total` and `storage_operation_duration_ms`,
/// both labelled by backend, operation and status (`success` or `error`).
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Returns the metrics status label for a result.
pub const fn status_label<T>(result: &crate::Result<T>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}
