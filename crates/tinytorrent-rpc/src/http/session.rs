//! Per-process session token used as a CSRF guard on the RPC endpoint.

use std::fmt;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use uuid::Uuid;

use crate::error::{RpcServerError, RpcServerResult};
use crate::http::errors::ApiError;

/// 32 lowercase hex characters, generated once per server.
#[derive(Clone, PartialEq, Eq)]
pub(crate) struct SessionToken(String);

impl SessionToken {
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("SessionToken(<redacted>)")
    }
}

/// Checks the session header and builds the 409 handshake response.
#[derive(Debug)]
pub(crate) struct SessionGuard {
    header: HeaderName,
    token: SessionToken,
    value: HeaderValue,
}

impl SessionGuard {
    pub(crate) fn new(header_name: &str) -> RpcServerResult<Self> {
        let header = HeaderName::try_from(header_name).map_err(|_| {
            RpcServerError::InvalidHeaderName {
                field: "session_header",
                value: header_name.to_string(),
            }
        })?;
        let token = SessionToken::generate();
        let value = HeaderValue::from_str(token.as_str()).map_err(|_| {
            RpcServerError::InvalidHeaderName {
                field: "session_header",
                value: header_name.to_string(),
            }
        })?;
        Ok(Self {
            header,
            token,
            value,
        })
    }

    pub(crate) const fn header(&self) -> &HeaderName {
        &self.header
    }

    pub(crate) const fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Byte-exact comparison of the presented session header.
    pub(crate) fn check(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let presented = headers.get(&self.header);
        if presented.is_some_and(|value| value.as_bytes() == self.token.as_str().as_bytes()) {
            return Ok(());
        }
        Err(ApiError::conflict("session id required")
            .with_header(self.header.clone(), self.value.clone()))
    }
}
