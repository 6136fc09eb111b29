//! Error types for telemetry operations.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use prometheus::Error as PrometheusError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug)]
pub enum TelemetryError {
    /// Installing the tracing subscriber failed.
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        source: tracing_subscriber::util::TryInitError,
    },
    /// Building a Prometheus collector failed.
    MetricsCollector {
        /// Metric identifier tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Registering a Prometheus collector failed.
    MetricsRegister {
        /// Metric identifier tied to the failure.
        name: &'static str,
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Encoding Prometheus metrics failed.
    MetricsEncode {
        /// Underlying Prometheus error.
        source: PrometheusError,
    },
    /// Rendered metrics output was not valid UTF-8.
    MetricsUtf8 {
        /// Underlying UTF-8 conversion error.
        source: std::string::FromUtf8Error,
    },
}

impl Display for TelemetryError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubscriberInstall { .. } => {
                formatter.write_str("failed to install tracing subscriber")
            }
            Self::MetricsCollector { .. } => {
                formatter.write_str("failed to build metrics collector")
            }
            Self::MetricsRegister { .. } => {
                formatter.write_str("failed to register metrics collector")
            }
            Self::MetricsEncode { .. } => formatter.write_str("failed to encode metrics"),
            Self::MetricsUtf8 { .. } => formatter.write_str("metrics output was not valid utf-8"),
        }
    }
}

impl Error for TelemetryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SubscriberInstall { source } => Some(source),
            Self::MetricsCollector { source, .. }
            | Self::MetricsRegister { source, .. }
            | Self::MetricsEncode { source } => Some(source),
            Self::MetricsUtf8 { source } => Some(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntGauge, Registry};

    #[test]
    fn collector_failures_keep_the_prometheus_cause() {
        let Err(source) = IntGauge::new("rpc pending", "not a valid metric name") else {
            panic!("invalid metric name was accepted");
        };
        let err = TelemetryError::MetricsCollector {
            name: "rpc_pending_requests",
            source,
        };
        assert_eq!(err.to_string(), "failed to build metrics collector");
        let cause = err.source().map(ToString::to_string).unwrap_or_default();
        assert!(cause.contains("rpc pending"), "{cause}");
    }

    #[test]
    fn register_and_utf8_failures_render_constant_messages() {
        let registry = Registry::new();
        let gauge = IntGauge::new("ws_clients", "Registered WebSocket push clients");
        let Ok(gauge) = gauge else {
            panic!("valid gauge was rejected");
        };
        assert!(registry.register(Box::new(gauge.clone())).is_ok());
        let Err(source) = registry.register(Box::new(gauge)) else {
            panic!("duplicate registration was accepted");
        };
        let register = TelemetryError::MetricsRegister {
            name: "ws_clients",
            source,
        };
        assert_eq!(register.to_string(), "failed to register metrics collector");
        assert!(register.source().is_some());

        let Err(source) = String::from_utf8(vec![0xff, 0xfe]) else {
            panic!("invalid utf-8 was accepted");
        };
        let utf8 = TelemetryError::MetricsUtf8 { source };
        assert_eq!(utf8.to_string(), "metrics output was not valid utf-8");
        assert!(utf8.source().is_some());
    }
}
