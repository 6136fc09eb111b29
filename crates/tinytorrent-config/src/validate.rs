//! Validation helpers and parsing utilities for server configuration.

use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{BindAddress, RpcServerConfig, ServerOptions, SyncTiming};

impl RpcServerConfig {
    /// Check every field and return the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] naming the first offending field.
    pub fn validate(&self) -> ConfigResult<BindAddress> {
        let bind = parse_bind_url(&self.bind_url)?;
        validate_options(&self.options)?;
        validate_timing(&self.timing)?;
        Ok(bind)
    }
}

/// Split a bind URL such as `http://[::1]:9091/` into host and port.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBindUrl`] when the host or port is missing
/// or malformed.
pub fn parse_bind_url(url: &str) -> ConfigResult<BindAddress> {
    let invalid = |reason: &'static str| ConfigError::InvalidBindUrl {
        value: url.to_string(),
        reason,
    };
    let trimmed = url.trim();
    let authority = trimmed
        .split_once("://")
        .map_or(trimmed, |(_, rest)| rest);
    let authority = authority
        .split_once('/')
        .map_or(authority, |(head, _)| head);
    if authority.is_empty() {
        return Err(invalid("missing host"));
    }

    let (host, port) = if authority.starts_with('[') {
        let close = authority
            .find(']')
            .ok_or_else(|| invalid("unterminated IPv6 literal"))?;
        let host = &authority[..=close];
        let port = authority[close + 1..]
            .strip_prefix(':')
            .ok_or_else(|| invalid("missing port"))?;
        (host, port)
    } else {
        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| invalid("missing port"))?;
        if host.contains(':') {
            return Err(invalid("IPv6 hosts must be bracketed"));
        }
        (host, port)
    };
    if host.is_empty() || host == "[]" {
        return Err(invalid("missing host"));
    }
    let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;

    Ok(BindAddress {
        host: host.to_ascii_lowercase(),
        port,
    })
}

/// Whether `name` is a valid HTTP header field name (an RFC 7230 token).
#[must_use]
pub fn is_header_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|byte| {
            byte.is_ascii_alphanumeric()
                || matches!(
                    byte,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

fn validate_options(options: &ServerOptions) -> ConfigResult<()> {
    for (field, path) in [("rpc_path", &options.rpc_path), ("ws_path", &options.ws_path)] {
        if !path.starts_with('/') {
            return Err(ConfigError::invalid(field, Some(path.as_str()), "must start with '/'"));
        }
    }
    if options.rpc_path == options.ws_path {
        return Err(ConfigError::Conflict {
            field: "rpc_path",
            other: "ws_path",
        });
    }

    for (field, header) in [
        ("token_header", &options.token_header),
        ("session_header", &options.session_header),
    ] {
        if !is_header_token(header) {
            return Err(ConfigError::invalid(
                field,
                Some(header.as_str()),
                "must be a valid header name",
            ));
        }
    }

    if options.token.as_deref().is_some_and(str::is_empty) {
        return Err(ConfigError::invalid("token", None, "must not be empty"));
    }
    if let Some(basic) = &options.basic_auth {
        if basic.user.is_empty() {
            return Err(ConfigError::invalid("basic_auth.user", None, "must not be empty"));
        }
        if basic.user.contains(':') {
            return Err(ConfigError::invalid(
                "basic_auth.user",
                Some(basic.user.as_str()),
                "must not contain ':'",
            ));
        }
    }
    if options.basic_realm.contains('"') {
        return Err(ConfigError::invalid(
            "basic_realm",
            Some(options.basic_realm.as_str()),
            "must not contain '\"'",
        ));
    }
    Ok(())
}

fn validate_timing(timing: &SyncTiming) -> ConfigResult<()> {
    for (field, value) in [
        ("patch_interval", timing.patch_interval),
        ("ping_interval", timing.ping_interval),
        ("poll_interval", timing.poll_interval),
    ] {
        if value == Duration::ZERO {
            return Err(ConfigError::invalid(field, None, "must be greater than zero"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn bind_url_variants_parse() -> Result<()> {
        let cases = [
            ("http://127.0.0.1:8080", "127.0.0.1", 8080),
            ("http://LOCALHOST:9091/transmission", "localhost", 9091),
            ("127.0.0.1:0", "127.0.0.1", 0),
            ("http://[::1]:51413", "[::1]", 51_413),
            ("  http://0.0.0.0:80  ", "0.0.0.0", 80),
        ];
        for (url, host, port) in cases {
            let bind = parse_bind_url(url)?;
            assert_eq!(bind.host, host, "host for {url}");
            assert_eq!(bind.port, port, "port for {url}");
        }
        Ok(())
    }

    #[test]
    fn bind_url_rejects_malformed_input() {
        for url in [
            "",
            "http://",
            "http://127.0.0.1",
            "http://[::1",
            "http://::1:80",
            "http://host:99999",
            "http://:8080",
        ] {
            assert!(
                matches!(
                    parse_bind_url(url),
                    Err(ConfigError::InvalidBindUrl { .. })
                ),
                "expected {url:?} to be rejected"
            );
        }
    }

    #[test]
    fn header_tokens() {
        assert!(is_header_token("X-Transmission-Session-Id"));
        assert!(is_header_token("x_tt.auth"));
        assert!(!is_header_token(""));
        assert!(!is_header_token("bad header"));
        assert!(!is_header_token("colon:name"));
    }

    #[test]
    fn default_config_is_valid() -> Result<()> {
        let bind = RpcServerConfig::default().validate()?;
        assert_eq!(bind.host, "127.0.0.1");
        assert_eq!(bind.port, 8080);
        Ok(())
    }

    #[test]
    fn options_validation_reports_field() {
        let mut config = RpcServerConfig::default();
        config.options.rpc_path = "rpc".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "rpc_path",
                ..
            })
        ));

        let mut config = RpcServerConfig::default();
        config.options.ws_path = config.options.rpc_path.clone();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Conflict { .. })
        ));

        let mut config = RpcServerConfig::default();
        config.options.session_header = "Session Id".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "session_header",
                ..
            })
        ));

        let mut config = RpcServerConfig::default();
        config.options = config.options.with_basic_auth("ad:min", "pw");
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "basic_auth.user",
                ..
            })
        ));

        let mut config = RpcServerConfig::default();
        config.timing.patch_interval = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidField {
                field: "patch_interval",
                ..
            })
        ));
    }
}
