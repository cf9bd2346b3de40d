//! Optional Prometheus-backed observability (ambient stack, §10).
//!
//! Disabled by default; enable the `metrics` feature to pull in
//! `prometheus` and register these collectors against a registry of the
//! caller's choosing.

#![cfg(feature = "metrics")]

use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

use crate::error::OjpError;

/// Endpoint- and call-level counters for a [`crate::client::Client`].
///
/// Mirrors the shape of the teacher crate's `RpcPoolMetrics` — per-
/// endpoint counters plus a couple of pool-wide totals — but counts
/// dispatch attempts/outcomes instead of web3 RPC latency.
pub struct ClientMetrics {
    pub dispatch_attempts: IntCounterVec,
    pub dispatch_failures: IntCounterVec,
    pub endpoint_healthy: IntGaugeVec,
}

impl ClientMetrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let dispatch_attempts = IntCounterVec::new(
            Opts::new(
                "ojp_dispatch_attempts_total",
                "Number of dispatch attempts per endpoint",
            ),
            &["endpoint"],
        )?;
        let dispatch_failures = IntCounterVec::new(
            Opts::new(
                "ojp_dispatch_failures_total",
                "Number of dispatch failures per endpoint, labeled by error kind",
            ),
            &["endpoint", "error_kind"],
        )?;
        let endpoint_healthy = IntGaugeVec::new(
            Opts::new(
                "ojp_endpoint_healthy",
                "Whether the registry currently considers an endpoint healthy (1) or not (0)",
            ),
            &["endpoint"],
        )?;

        registry.register(Box::new(dispatch_attempts.clone()))?;
        registry.register(Box::new(dispatch_failures.clone()))?;
        registry.register(Box::new(endpoint_healthy.clone()))?;

        Ok(Self {
            dispatch_attempts,
            dispatch_failures,
            endpoint_healthy,
        })
    }

    pub fn record_attempt(&self, endpoint: &str) {
        self.dispatch_attempts.with_label_values(&[endpoint]).inc();
    }

    pub fn record_failure(&self, endpoint: &str, error: &OjpError) {
        self.dispatch_failures
            .with_label_values(&[endpoint, error_kind(error)])
            .inc();
    }

    pub fn set_healthy(&self, endpoint: &str, healthy: bool) {
        self.endpoint_healthy
            .with_label_values(&[endpoint])
            .set(if healthy { 1 } else { 0 });
    }
}

fn error_kind(error: &OjpError) -> &'static str {
    match error {
        OjpError::InvalidLocator(_) => "invalid_locator",
        OjpError::NoHealthyEndpoints => "no_healthy_endpoints",
        OjpError::TransportUnavailable(_) => "transport_unavailable",
        OjpError::TransportDeadline(_) => "transport_deadline",
        OjpError::MessageTooLarge { .. } => "message_too_large",
        OjpError::RemoteFailure { .. } => "remote_failure",
        OjpError::LobReferenceMissing => "lob_reference_missing",
        OjpError::ProtocolViolation(_) => "protocol_violation",
        OjpError::Cancelled => "cancelled",
        OjpError::LobCloseFailed { .. } => "lob_close_failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_without_collision() {
        let registry = Registry::new();
        let metrics = ClientMetrics::new(&registry).unwrap();
        metrics.record_attempt("a:1");
        metrics.record_failure("a:1", &OjpError::NoHealthyEndpoints);
        metrics.set_healthy("a:1", false);
        assert_eq!(registry.gather().len(), 3);
    }
}
