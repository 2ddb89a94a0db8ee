use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: requests handled on the wire. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "tutorbook_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "tutorbook_request_duration_seconds";

// ── Booking / payment domain ────────────────────────────────────

/// Counter: sessions created in PENDING state.
pub const SESSIONS_REQUESTED_TOTAL: &str = "tutorbook_sessions_requested_total";

/// Counter: booking requests refused. Labels: reason.
pub const BOOKINGS_REJECTED_TOTAL: &str = "tutorbook_bookings_rejected_total";

/// Counter: payment attempts. Labels: outcome (completed, rejected, pending).
pub const PAYMENTS_TOTAL: &str = "tutorbook_payments_total";

/// Histogram: gateway charge latency in seconds.
pub const GATEWAY_DURATION_SECONDS: &str = "tutorbook_gateway_duration_seconds";

/// Counter: availability reconciliations. Labels: outcome.
pub const RECONCILIATIONS_TOTAL: &str = "tutorbook_reconciliations_total";

/// Counter: reminder notifications published.
pub const REMINDERS_SENT_TOTAL: &str = "tutorbook_reminders_sent_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "tutorbook_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "tutorbook_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "tutorbook_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "tutorbook_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (transactions per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "tutorbook_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
