//! Host, origin and credential checks applied before any request is served.
//!
//! # Design
//! - Every check is a pure function of the configured options and the
//!   request headers.
//! - Header values are compared as bytes; non-UTF-8 values never match.
//! - The host check fails closed: a missing or unreadable `Host` is rejected.

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{AUTHORIZATION, HOST, ORIGIN},
    },
    middleware::Next,
    response::Response,
};
use base64::{
    Engine as _, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use std::sync::Arc;
use tinytorrent_config::{LEGACY_TOKEN_HEADER, ServerOptions};
use tracing::debug;

use crate::http::constants::{BASIC_PREFIX, BEARER_PREFIX, LOOPBACK_HOSTS};
use crate::http::errors::ApiError;
use crate::state::ServerState;

/// Standard-alphabet decoder that accepts missing padding and stray trailing bits.
const TOLERANT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::RequireNone)
        .with_decode_allow_trailing_bits(true),
);

/// Reduce a `Host` header value to its lowercase host part.
///
/// Bracketed IPv6 literals keep their brackets. A port is only stripped when
/// the value holds a single `:`, so bare IPv6 literals are left whole.
pub(crate) fn canonicalize_host(raw: &str) -> String {
    let trimmed = raw.trim();
    let host = if trimmed.starts_with('[') {
        trimmed
            .find(']')
            .map_or(trimmed, |close| &trimmed[..=close])
    } else if trimmed.matches(':').count() == 1 {
        trimmed.split_once(':').map_or(trimmed, |(host, _)| host)
    } else {
        trimmed
    };
    host.to_ascii_lowercase()
}

fn is_loopback(host: &str) -> bool {
    LOOPBACK_HOSTS.contains(&host)
}

/// Host names the listener answers to.
#[derive(Debug, Clone)]
pub(crate) struct AllowedHosts {
    hosts: Vec<String>,
}

impl AllowedHosts {
    /// The bind host itself, plus every loopback spelling when the bind host
    /// is a loopback alias.
    pub(crate) fn for_bind_host(bind_host: &str) -> Self {
        let bind = canonicalize_host(bind_host);
        let loopback = is_loopback(&bind);
        let mut hosts = vec![bind];
        if loopback {
            for alias in LOOPBACK_HOSTS {
                if !hosts.iter().any(|host| host == alias) {
                    hosts.push(alias.to_string());
                }
            }
        }
        hosts.retain(|host| !host.is_empty());
        Self { hosts }
    }

    pub(crate) fn allows(&self, host: Option<&HeaderValue>) -> bool {
        host.and_then(|value| value.to_str().ok())
            .map(canonicalize_host)
            .is_some_and(|host| self.hosts.contains(&host))
    }
}

/// Whether the request's `Origin` is acceptable.
///
/// An empty trusted set allows every origin, and requests without an
/// `Origin` header (non-browser clients) are always allowed.
pub(crate) fn origin_allowed(options: &ServerOptions, headers: &HeaderMap) -> bool {
    if options.trusted_origins.is_empty() {
        return true;
    }
    headers.get(ORIGIN).is_none_or(|origin| {
        origin
            .to_str()
            .is_ok_and(|origin| options.trusted_origins.contains(origin))
    })
}

/// Whether the request carries valid credentials. Always true when none are
/// configured.
pub(crate) fn credentials_valid(options: &ServerOptions, headers: &HeaderMap) -> bool {
    if !options.requires_credentials() {
        return true;
    }
    let authorization = headers.get(AUTHORIZATION).map(HeaderValue::as_bytes);

    if let Some(token) = options.token.as_deref() {
        let expected = token.as_bytes();
        let matches_header = |name: &str| {
            headers
                .get(name)
                .is_some_and(|value| value.as_bytes() == expected)
        };
        if matches_header(&options.token_header) || matches_header(LEGACY_TOKEN_HEADER) {
            return true;
        }
        if authorization
            .and_then(|value| value.strip_prefix(BEARER_PREFIX))
            .is_some_and(|bearer| !bearer.is_empty() && bearer == expected)
        {
            return true;
        }
    }

    if let Some(basic) = &options.basic_auth {
        let presented = authorization
            .and_then(|value| value.strip_prefix(BASIC_PREFIX))
            .and_then(|encoded| std::str::from_utf8(encoded).ok())
            .and_then(decode_base64);
        if presented.is_some_and(|decoded| decoded == basic.joined().as_bytes()) {
            return true;
        }
    }
    false
}

/// Credentials check for WebSocket upgrades, which may also present the
/// token as a query parameter.
pub(crate) fn ws_credentials_valid(
    options: &ServerOptions,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> bool {
    if credentials_valid(options, headers) {
        return true;
    }
    match (options.token.as_deref(), query_token) {
        (Some(expected), Some(presented)) => {
            !presented.is_empty() && presented.as_bytes() == expected.as_bytes()
        }
        _ => false,
    }
}

/// Lenient base64: whitespace is ignored, input stops at the first `=`, and
/// missing padding is accepted. Invalid input yields `None`.
pub(crate) fn decode_base64(input: &str) -> Option<Vec<u8>> {
    let compact: String = input
        .chars()
        .take_while(|ch| *ch != '=')
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    TOLERANT_BASE64.decode(compact.as_bytes()).ok()
}

/// Reject requests whose `Host` is not one the listener answers to.
pub(crate) async fn require_allowed_host(
    State(state): State<Arc<ServerState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.allowed_hosts.allows(request.headers().get(HOST)) {
        debug!(
            host = ?request.headers().get(HOST),
            path = %request.uri().path(),
            "rejected request for unexpected host"
        );
        state.metrics.inc_rpc_request("forbidden");
        return Err(ApiError::forbidden("invalid host header"));
    }
    Ok(next.run(request).await)
}
