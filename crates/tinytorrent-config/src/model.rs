//! Typed configuration models for the RPC control plane.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::defaults::{
    DEFAULT_BASIC_REALM, DEFAULT_BIND_URL, DEFAULT_PATCH_INTERVAL, DEFAULT_PING_INTERVAL,
    DEFAULT_POLL_INTERVAL, DEFAULT_RPC_PATH, DEFAULT_SESSION_HEADER, DEFAULT_TOKEN_HEADER,
    DEFAULT_WS_PATH,
};

/// User name and password accepted through `Authorization: Basic`.
#[derive(Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    /// Expected user name.
    pub user: String,
    /// Expected password.
    pub password: String,
}

impl BasicCredentials {
    /// Build a credential pair.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    /// The `user:password` form carried inside the base64 payload.
    #[must_use]
    pub fn joined(&self) -> String {
        format!("{}:{}", self.user, self.password)
    }
}

impl fmt::Debug for BasicCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("BasicCredentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Access-control and routing options. Immutable once a server is built.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Static API token; `None` disables token authentication.
    pub token: Option<String>,
    /// Header carrying the static token.
    pub token_header: String,
    /// Basic-auth credentials; `None` disables basic authentication.
    pub basic_auth: Option<BasicCredentials>,
    /// Realm advertised on 401 responses when basic auth is enabled.
    pub basic_realm: String,
    /// Exact `Origin` values permitted. Empty allows every origin.
    pub trusted_origins: BTreeSet<String>,
    /// Path of the JSON RPC endpoint.
    pub rpc_path: String,
    /// Path of the WebSocket push channel.
    pub ws_path: String,
    /// Header carrying the per-process session token.
    pub session_header: String,
    /// Directory of web UI assets served on every other path; `None`
    /// answers those paths with 404.
    pub ui_root: Option<PathBuf>,
}

impl ServerOptions {
    /// Whether any credential scheme is configured.
    #[must_use]
    pub const fn requires_credentials(&self) -> bool {
        self.token.is_some() || self.basic_auth.is_some()
    }

    /// Builder-style helper to set the static token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Builder-style helper to enable basic authentication.
    #[must_use]
    pub fn with_basic_auth(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.basic_auth = Some(BasicCredentials::new(user, password));
        self
    }

    /// Builder-style helper to serve the web UI from `root`.
    #[must_use]
    pub fn with_ui_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.ui_root = Some(root.into());
        self
    }

    /// Builder-style helper to add a trusted origin.
    #[must_use]
    pub fn with_trusted_origin(mut self, origin: impl Into<String>) -> Self {
        self.trusted_origins.insert(origin.into());
        self
    }
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            token: None,
            token_header: DEFAULT_TOKEN_HEADER.to_string(),
            basic_auth: None,
            basic_realm: DEFAULT_BASIC_REALM.to_string(),
            trusted_origins: BTreeSet::new(),
            rpc_path: DEFAULT_RPC_PATH.to_string(),
            ws_path: DEFAULT_WS_PATH.to_string(),
            session_header: DEFAULT_SESSION_HEADER.to_string(),
            ui_root: None,
        }
    }
}

impl fmt::Debug for ServerOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServerOptions")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_header", &self.token_header)
            .field("basic_auth", &self.basic_auth)
            .field("basic_realm", &self.basic_realm)
            .field("trusted_origins", &self.trusted_origins)
            .field("rpc_path", &self.rpc_path)
            .field("ws_path", &self.ws_path)
            .field("session_header", &self.session_header)
            .field("ui_root", &self.ui_root)
            .finish()
    }
}

/// Timing knobs for the live update loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncTiming {
    /// Minimum delay between two patch emissions.
    pub patch_interval: Duration,
    /// Interval between liveness pings.
    pub ping_interval: Duration,
    /// Upper bound on one event-loop wait.
    pub poll_interval: Duration,
}

impl Default for SyncTiming {
    fn default() -> Self {
        Self {
            patch_interval: DEFAULT_PATCH_INTERVAL,
            ping_interval: DEFAULT_PING_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Host and port parsed from a bind URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindAddress {
    /// Host as written in the URL, including brackets for IPv6 literals.
    pub host: String,
    /// Port; `0` requests an ephemeral port.
    pub port: u16,
}

impl BindAddress {
    /// Host suitable for socket resolution (IPv6 brackets removed).
    #[must_use]
    pub fn socket_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .unwrap_or(&self.host)
    }
}

/// Full configuration for one RPC server instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcServerConfig {
    /// Listener URL, e.g. `http://127.0.0.1:8080`.
    pub bind_url: String,
    /// Access-control and routing options.
    pub options: ServerOptions,
    /// Live update timing.
    pub timing: SyncTiming,
}

impl RpcServerConfig {
    /// Configuration bound to `bind_url` with default options.
    #[must_use]
    pub fn new(bind_url: impl Into<String>) -> Self {
        Self {
            bind_url: bind_url.into(),
            options: ServerOptions::default(),
            timing: SyncTiming::default(),
        }
    }
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BIND_URL)
    }
}
