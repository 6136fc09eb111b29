//! WebSocket push channel: upgrade checks and the per-socket task.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        RawQuery, State,
        ws::{Message, WebSocket, WebSocketUpgrade, rejection::WebSocketUpgradeRejection},
    },
    http::HeaderMap,
    response::{IntoResponse, Response},
};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::http::constants::{WS_SEND_TIMEOUT, WS_TOKEN_QUERY_PARAM};
use crate::http::errors::ApiError;
use crate::http::gatekeeper::{origin_allowed, ws_credentials_valid};
use crate::state::ServerState;
use crate::sync::registry::Outbound;
use crate::sync::wire;

pub(crate) async fn handle_ws_upgrade(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if state.lifecycle.is_destroying() {
        return ApiError::service_unavailable("server is shutting down").into_response();
    }
    if !origin_allowed(&state.options, &headers) {
        debug!("rejected push upgrade from untrusted origin");
        return ApiError::forbidden("origin not allowed").into_response();
    }
    let query_token = query.as_deref().and_then(token_from_query);
    if !ws_credentials_valid(&state.options, &headers, query_token.as_deref()) {
        debug!("rejected push upgrade without valid credentials");
        return ApiError::forbidden("invalid token").into_response();
    }
    match upgrade {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| run_client(socket, state)),
        Err(rejection) => rejection.into_response(),
    }
}

fn token_from_query(query: &str) -> Option<String> {
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == WS_TOKEN_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
}

async fn run_client(mut socket: WebSocket, state: Arc<ServerState>) {
    let _socket = state.registry.track_socket();
    if state.lifecycle.is_destroying() {
        return;
    }
    let anchor = state.registry.stamp(state.feed.current());
    let Some(initial) = wire::encode_snapshot(anchor.sequence, &anchor.snapshot) else {
        return;
    };
    let (client_id, mut outbound) = state.registry.open(anchor, initial);
    info!(client_id, "push client connected");

    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let message = match frame {
                    Some(Outbound::Text(text)) => Message::Text(text.into()),
                    Some(Outbound::Ping) => Message::Ping(Bytes::new()),
                    None => break,
                };
                match timeout(WS_SEND_TIMEOUT, socket.send(message)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        debug!(client_id, error = %err, "push client write failed");
                        break;
                    }
                    Err(_) => {
                        debug!(client_id, "push client write timed out");
                        break;
                    }
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.registry.remove(client_id);
    let _ = timeout(WS_SEND_TIMEOUT, socket.send(Message::Close(None))).await;
    info!(client_id, "push client disconnected");
}
