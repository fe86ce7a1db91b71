use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: booking operations completed. Labels: op, status.
pub const BOOKINGS_TOTAL: &str = "slotwise_bookings_total";

/// Histogram: end-to-end booking operation latency in seconds. Labels: op.
pub const BOOKING_DURATION_SECONDS: &str = "slotwise_booking_duration_seconds";

// ── Contention metrics ──────────────────────────────────────────

/// Counter: conflicts reported by the detector before a write was attempted.
pub const CONFLICTS_DETECTED_TOTAL: &str = "slotwise_conflicts_detected_total";

/// Counter: writes rejected by the store's overlap constraint (lost races).
pub const CONSTRAINT_REJECTIONS_TOTAL: &str = "slotwise_constraint_rejections_total";

/// Counter: version-mismatch rejections on update/cancel.
pub const VERSION_MISMATCHES_TOTAL: &str = "slotwise_version_mismatches_total";

/// Counter: retry attempts taken after a retryable failure.
pub const BOOKING_RETRIES_TOTAL: &str = "slotwise_booking_retries_total";

/// Counter: operations that exhausted their retry budget.
pub const RETRIES_EXHAUSTED_TOTAL: &str = "slotwise_retries_exhausted_total";

/// Install the Prometheus metrics exporter on the given port. No-op when no
/// port is configured; the embedding process decides whether a failed install
/// is fatal.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_without_port_is_a_no_op() {
        // Must not install a global recorder (other tests record metrics into
        // the default no-op sink).
        assert!(init(None).is_ok());
    }
}
