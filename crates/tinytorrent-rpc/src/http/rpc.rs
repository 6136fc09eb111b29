//! JSON RPC endpoint.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{
        HeaderMap, HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use tinytorrent_config::MAX_RPC_BODY_BYTES;
use tracing::{debug, warn};

use crate::dispatch::DispatchOutcome;
use crate::http::constants::CACHE_CONTROL_NO_STORE;
use crate::http::errors::ApiError;
use crate::http::gatekeeper::{credentials_valid, origin_allowed};
use crate::state::ServerState;

pub(crate) async fn handle_rpc(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    match process(&state, &headers, body).await {
        Ok(response) => response,
        Err(err) => {
            state.metrics.inc_rpc_request(err.outcome());
            debug!(status = %err.status, detail = err.detail(), "rpc request rejected");
            err.into_response()
        }
    }
}

async fn process(
    state: &Arc<ServerState>,
    headers: &HeaderMap,
    body: Body,
) -> Result<Response, ApiError> {
    if state.lifecycle.is_destroying() {
        return Err(ApiError::service_unavailable("server is shutting down"));
    }
    if !origin_allowed(&state.options, headers) {
        return Err(ApiError::forbidden("origin not allowed"));
    }
    if !credentials_valid(&state.options, headers) {
        let realm = state
            .options
            .basic_auth
            .as_ref()
            .map(|_| state.options.basic_realm.as_str());
        return Err(ApiError::unauthorized(realm));
    }
    state.session.check(headers)?;

    if declared_length(headers).is_some_and(|length| length > MAX_RPC_BODY_BYTES) {
        return Err(ApiError::payload_too_large("payload too large"));
    }
    let bytes = axum::body::to_bytes(body, MAX_RPC_BODY_BYTES)
        .await
        .map_err(|err| {
            debug!(error = %err, "failed to read rpc request body");
            ApiError::payload_too_large("payload too large")
        })?;
    let payload = String::from_utf8(bytes.into()).map_err(|err| {
        debug!(error = %err, "rpc request body is not valid utf-8");
        ApiError::bad_request("request body is not valid utf-8")
    })?;

    state.metrics.inc_rpc_request("dispatched");
    let pending = state.bridge.submit(payload);
    let request_id = pending.id();
    match pending.wait().await {
        Some(DispatchOutcome::Response(body)) => Ok(json_response(body)),
        Some(DispatchOutcome::Abandoned) => {
            warn!(request_id, "dispatcher dropped an rpc request without answering");
            Err(ApiError::internal("dispatcher dropped the request"))
        }
        None => Err(ApiError::service_unavailable("server is shutting down")),
    }
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn json_response(body: String) -> Response {
    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("application/json")),
            (CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL_NO_STORE)),
        ],
        body,
    )
        .into_response()
}
