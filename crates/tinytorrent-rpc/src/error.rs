//! # Design
//!
//! - One crate-level error type for building and starting the RPC server.
//! - Messages are constant; operational context lives in structured fields.
//! - Listener bind failures are not errors: they are logged and the server
//!   keeps running without a listener.

use std::error::Error;
use std::fmt::{self, Display, Formatter};

use tinytorrent_config::ConfigError;
use tinytorrent_telemetry::TelemetryError;

/// Result alias for RPC server operations.
pub type RpcServerResult<T> = std::result::Result<T, RpcServerError>;

/// Errors raised while building or starting the RPC server.
#[derive(Debug)]
pub enum RpcServerError {
    /// The configuration failed validation.
    Config {
        /// Underlying validation error.
        source: ConfigError,
    },
    /// A configured header name cannot be used on the wire.
    InvalidHeaderName {
        /// Configuration field holding the name.
        field: &'static str,
        /// Rejected value.
        value: String,
    },
    /// The metrics registry could not be created.
    Metrics {
        /// Underlying telemetry error.
        source: TelemetryError,
    },
    /// The event-loop thread could not be spawned.
    SpawnWorker {
        /// Underlying IO error.
        source: std::io::Error,
    },
}

impl Display for RpcServerError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { .. } => formatter.write_str("invalid rpc server configuration"),
            Self::InvalidHeaderName { .. } => formatter.write_str("invalid header name"),
            Self::Metrics { .. } => formatter.write_str("failed to initialise rpc metrics"),
            Self::SpawnWorker { .. } => formatter.write_str("failed to spawn rpc event loop"),
        }
    }
}

impl Error for RpcServerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config { source } => Some(source),
            Self::Metrics { source } => Some(source),
            Self::SpawnWorker { source } => Some(source),
            Self::InvalidHeaderName { .. } => None,
        }
    }
}

impl From<ConfigError> for RpcServerError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<TelemetryError> for RpcServerError {
    fn from(source: TelemetryError) -> Self {
        Self::Metrics { source }
    }
}
