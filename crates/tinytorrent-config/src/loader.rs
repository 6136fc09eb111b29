//! Environment-driven configuration loading.
//!
//! # Design
//! - Unset variables keep their defaults; set-but-invalid values are errors.
//! - Lookup is injectable so tests never touch the process environment.

use std::time::Duration;

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{BasicCredentials, RpcServerConfig};

/// Listener URL.
pub const ENV_BIND: &str = "TT_RPC_BIND";
/// Static API token.
pub const ENV_TOKEN: &str = "TT_RPC_TOKEN";
/// Header carrying the static API token.
pub const ENV_TOKEN_HEADER: &str = "TT_RPC_TOKEN_HEADER";
/// Basic-auth user name.
pub const ENV_BASIC_USER: &str = "TT_RPC_BASIC_USER";
/// Basic-auth password.
pub const ENV_BASIC_PASS: &str = "TT_RPC_BASIC_PASS";
/// Basic-auth realm.
pub const ENV_BASIC_REALM: &str = "TT_RPC_BASIC_REALM";
/// Comma-separated list of trusted origins.
pub const ENV_TRUSTED_ORIGINS: &str = "TT_RPC_TRUSTED_ORIGINS";
/// JSON RPC endpoint path.
pub const ENV_RPC_PATH: &str = "TT_RPC_PATH";
/// WebSocket endpoint path.
pub const ENV_WS_PATH: &str = "TT_RPC_WS_PATH";
/// Session header name.
pub const ENV_SESSION_HEADER: &str = "TT_RPC_SESSION_HEADER";
/// Directory of web UI assets.
pub const ENV_UI_ROOT: &str = "TT_RPC_UI_ROOT";
/// Patch throttle in milliseconds.
pub const ENV_PATCH_INTERVAL_MS: &str = "TT_RPC_PATCH_INTERVAL_MS";
/// Ping interval in milliseconds.
pub const ENV_PING_INTERVAL_MS: &str = "TT_RPC_PING_INTERVAL_MS";

impl RpcServerConfig {
    /// Load configuration from the process environment and validate it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a variable is set to an invalid value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup and validate it.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        if let Some(bind) = read(ENV_BIND) {
            config.bind_url = bind.trim().to_string();
        }
        if let Some(token) = read(ENV_TOKEN) {
            config.options.token = Some(token);
        }
        if let Some(header) = read(ENV_TOKEN_HEADER) {
            config.options.token_header = header.trim().to_string();
        }
        match (read(ENV_BASIC_USER), lookup(ENV_BASIC_PASS)) {
            (Some(user), Some(password)) => {
                config.options.basic_auth = Some(BasicCredentials::new(user, password));
            }
            (Some(_), None) => {
                return Err(ConfigError::invalid(
                    "basic_auth.password",
                    None,
                    "required when a basic-auth user is set",
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::invalid(
                    "basic_auth.user",
                    None,
                    "required when a basic-auth password is set",
                ));
            }
            (None, None) => {}
        }
        if let Some(realm) = read(ENV_BASIC_REALM) {
            config.options.basic_realm = realm;
        }
        if let Some(origins) = read(ENV_TRUSTED_ORIGINS) {
            config.options.trusted_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(path) = read(ENV_RPC_PATH) {
            config.options.rpc_path = path.trim().to_string();
        }
        if let Some(path) = read(ENV_WS_PATH) {
            config.options.ws_path = path.trim().to_string();
        }
        if let Some(header) = read(ENV_SESSION_HEADER) {
            config.options.session_header = header.trim().to_string();
        }
        if let Some(root) = read(ENV_UI_ROOT) {
            config.options.ui_root = Some(root.trim().into());
        }
        if let Some(value) = read(ENV_PATCH_INTERVAL_MS) {
            config.timing.patch_interval = parse_millis("patch_interval", &value)?;
        }
        if let Some(value) = read(ENV_PING_INTERVAL_MS) {
            config.timing.ping_interval = parse_millis("ping_interval", &value)?;
        }

        config.validate()?;
        debug!(
            bind = %config.bind_url,
            rpc_path = %config.options.rpc_path,
            ws_path = %config.options.ws_path,
            credentials = config.options.requires_credentials(),
            trusted_origins = config.options.trusted_origins.len(),
            "loaded rpc server configuration"
        );
        Ok(config)
    }
}

fn parse_millis(field: &'static str, value: &str) -> ConfigResult<Duration> {
    value
        .trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::invalid(field, Some(value), "must be an integer millisecond count"))
}
