//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - One registry per server instance; nothing is process-global.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry for the RPC control plane.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    rpc_requests_total: IntCounterVec,
    rpc_responses_dropped_total: IntCounter,
    rpc_pending_requests: IntGauge,
    ws_clients: IntGauge,
    ws_messages_total: IntCounterVec,
}

/// Snapshot of selected gauges and counters for health reporting and tests.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// RPC requests forwarded to the dispatcher.
    pub rpc_dispatched_total: u64,
    /// Late responses discarded because their connection closed.
    pub rpc_responses_dropped_total: u64,
    /// RPC requests awaiting a dispatcher response.
    pub rpc_pending_requests: i64,
    /// Registered push-channel clients.
    pub ws_clients: i64,
    /// Patch messages queued for delivery.
    pub ws_patches_total: u64,
    /// Event messages queued for delivery.
    pub ws_events_total: u64,
    /// Liveness pings queued for delivery.
    pub ws_pings_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let rpc_requests_total = counter_vec(
            "rpc_requests_total",
            "RPC requests by gatekeeping outcome",
            "outcome",
        )?;
        let rpc_responses_dropped_total = counter(
            "rpc_responses_dropped_total",
            "Dispatcher responses discarded after their connection closed",
        )?;
        let rpc_pending_requests = gauge(
            "rpc_pending_requests",
            "RPC requests awaiting a dispatcher response",
        )?;
        let ws_clients = gauge("ws_clients", "Registered WebSocket push clients")?;
        let ws_messages_total = counter_vec(
            "ws_messages_total",
            "Push-channel messages queued by kind",
            "kind",
        )?;

        register(&registry, "rpc_requests_total", &rpc_requests_total)?;
        register(
            &registry,
            "rpc_responses_dropped_total",
            &rpc_responses_dropped_total,
        )?;
        register(&registry, "rpc_pending_requests", &rpc_pending_requests)?;
        register(&registry, "ws_clients", &ws_clients)?;
        register(&registry, "ws_messages_total", &ws_messages_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                rpc_requests_total,
                rpc_responses_dropped_total,
                rpc_pending_requests,
                ws_clients,
                ws_messages_total,
            }),
        })
    }

    /// Count an RPC request by outcome (`dispatched`, `forbidden`, ...).
    pub fn inc_rpc_request(&self, outcome: &str) {
        self.inner
            .rpc_requests_total
            .with_label_values(&[outcome])
            .inc();
    }

    /// Count a dispatcher response dropped for a closed connection.
    pub fn inc_dropped_response(&self) {
        self.inner.rpc_responses_dropped_total.inc();
    }

    /// Set the number of RPC requests awaiting a response.
    pub fn set_pending_requests(&self, pending: usize) {
        self.inner
            .rpc_pending_requests
            .set(i64::try_from(pending).unwrap_or(i64::MAX));
    }

    /// Set the number of registered push clients.
    pub fn set_ws_clients(&self, clients: usize) {
        self.inner
            .ws_clients
            .set(i64::try_from(clients).unwrap_or(i64::MAX));
    }

    /// Count push-channel messages of `kind` queued for delivery.
    pub fn add_ws_messages(&self, kind: &str, count: usize) {
        self.inner
            .ws_messages_total
            .with_label_values(&[kind])
            .inc_by(u64::try_from(count).unwrap_or(u64::MAX));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rpc_dispatched_total: self
                .inner
                .rpc_requests_total
                .with_label_values(&["dispatched"])
                .get(),
            rpc_responses_dropped_total: self.inner.rpc_responses_dropped_total.get(),
            rpc_pending_requests: self.inner.rpc_pending_requests.get(),
            ws_clients: self.inner.ws_clients.get(),
            ws_patches_total: self.ws_messages("patch"),
            ws_events_total: self.ws_messages("event"),
            ws_pings_total: self.ws_messages("ping"),
        }
    }

    fn ws_messages(&self, kind: &str) -> u64 {
        self.inner
            .ws_messages_total
            .with_label_values(&[kind])
            .get()
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn counter_vec(name: &'static str, help: &str, label: &str) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), &[label])
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}
