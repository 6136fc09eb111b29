//! Shared HTTP constants.

use std::time::Duration;

/// Prefix of a bearer `Authorization` header.
pub(crate) const BEARER_PREFIX: &[u8] = b"Bearer ";
/// Prefix of a basic `Authorization` header.
pub(crate) const BASIC_PREFIX: &[u8] = b"Basic ";
/// Query parameter carrying the API token on WebSocket upgrades.
pub(crate) const WS_TOKEN_QUERY_PARAM: &str = "token";
/// Host spellings always accepted for loopback listeners.
pub(crate) const LOOPBACK_HOSTS: [&str; 5] =
    ["127.0.0.1", "localhost", "[::1]", "::1", "0:0:0:0:0:0:0:1"];
/// Lifetime of a cached CORS preflight.
pub(crate) const CORS_MAX_AGE: Duration = Duration::from_secs(600);
/// Upper bound on a single WebSocket write.
pub(crate) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const CACHE_CONTROL_NO_STORE: &str = "no-store";
