//! Error types for configuration operations.

use thiserror::Error;

/// Primary error type for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when it is safe to echo.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Bind URL could not be parsed.
    #[error("invalid bind url")]
    InvalidBindUrl {
        /// Bind URL supplied by the caller.
        value: String,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Two options that must differ were configured with the same value.
    #[error("conflicting configuration fields")]
    Conflict {
        /// First field involved.
        field: &'static str,
        /// Second field involved.
        other: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, value: Option<&str>, reason: &'static str) -> Self {
        Self::InvalidField {
            field,
            value: value.map(str::to_string),
            reason,
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_messages_are_constant() {
        let cases = [
            (
                ConfigError::invalid("rpc_path", Some("rpc"), "must start with '/'"),
                "invalid configuration field",
            ),
            (
                ConfigError::InvalidBindUrl {
                    value: "http://".into(),
                    reason: "missing host",
                },
                "invalid bind url",
            ),
            (
                ConfigError::Conflict {
                    field: "rpc_path",
                    other: "ws_path",
                },
                "conflicting configuration fields",
            ),
        ];
        for (err, message) in cases {
            assert_eq!(err.to_string(), message);
        }
    }
}
