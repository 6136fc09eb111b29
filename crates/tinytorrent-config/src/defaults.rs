//! Default values for the RPC control plane.
//!
//! # Design
//! - Keep wire-visible names and timings in one place so clients and tests agree.

use std::time::Duration;

/// Default bind URL for the RPC listener.
pub const DEFAULT_BIND_URL: &str = "http://127.0.0.1:8080";
/// Default header carrying the static API token.
pub const DEFAULT_TOKEN_HEADER: &str = "X-TT-Auth";
/// Legacy alias accepted alongside the configured token header.
pub const LEGACY_TOKEN_HEADER: &str = "X-TinyTorrent-Token";
/// Default realm advertised in `WWW-Authenticate` challenges.
pub const DEFAULT_BASIC_REALM: &str = "TinyTorrent RPC";
/// Default JSON RPC endpoint path.
pub const DEFAULT_RPC_PATH: &str = "/transmission/rpc";
/// Default WebSocket push channel path.
pub const DEFAULT_WS_PATH: &str = "/transmission/rpc/ws";
/// Default header carrying the CSRF session token.
pub const DEFAULT_SESSION_HEADER: &str = "X-Transmission-Session-Id";
/// Minimum delay between two patch emissions.
pub const DEFAULT_PATCH_INTERVAL: Duration = Duration::from_millis(500);
/// Interval between liveness pings on idle push connections.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(15);
/// Upper bound on a single event-loop wait.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Largest accepted RPC request body.
pub const MAX_RPC_BODY_BYTES: usize = 1 << 20;
