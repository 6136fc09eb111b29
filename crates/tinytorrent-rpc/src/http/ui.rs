//! Web UI assets served from `ui_root` on every path the RPC and push
//! routes do not claim. Client-side routes fall back to `index.html`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use tinytorrent_config::ServerOptions;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::debug;

use crate::http::errors::ApiError;
use crate::state::ServerState;

const INDEX_FILE: &str = "index.html";
const API_PREFIX: &str = "/api";

/// Router fallback. Without a configured UI root every path is 404.
pub(crate) async fn serve_ui(State(state): State<Arc<ServerState>>, request: Request) -> Response {
    match serve(&state.options, request).await {
        Ok(response) => response,
        Err(err) => {
            state.metrics.inc_rpc_request(err.outcome());
            err.into_response()
        }
    }
}

async fn serve(options: &ServerOptions, request: Request) -> Result<Response, ApiError> {
    let Some(root) = options.ui_root.as_deref() else {
        return Err(ApiError::not_found("not found"));
    };
    if !matches!(*request.method(), Method::GET | Method::HEAD) {
        return Err(ApiError::not_found("not found"));
    }
    let path = request.uri().path().to_string();
    if !path_is_safe(&path) {
        debug!(path = %path, "rejected unsafe ui path");
        return Err(ApiError::bad_request("bad request"));
    }

    let index = should_fallback_to_index(&path, options).then(|| index_request(&request));
    let Ok(response) = ServeDir::new(root)
        .append_index_html_on_directories(true)
        .oneshot(request)
        .await;
    if response.status() != StatusCode::NOT_FOUND {
        return Ok(response.map(Body::new));
    }

    let Some(index) = index else {
        return Err(ApiError::not_found("not found"));
    };
    let Ok(response) = ServeFile::new(root.join(INDEX_FILE)).oneshot(index).await;
    if response.status() == StatusCode::NOT_FOUND {
        debug!(root = %root.display(), "ui index is missing");
        return Err(ApiError::not_found("not found"));
    }
    Ok(response.map(Body::new))
}

fn index_request(request: &Request) -> Request {
    let mut index = Request::new(Body::empty());
    *index.method_mut() = request.method().clone();
    *index.headers_mut() = request.headers().clone();
    index
}

fn path_is_safe(path: &str) -> bool {
    path.starts_with('/') && !path.contains("..")
}

fn is_under(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Extension-less paths outside the RPC, push and API prefixes are
/// client-side routes.
fn should_fallback_to_index(path: &str, options: &ServerOptions) -> bool {
    if path.is_empty()
        || is_under(path, &options.rpc_path)
        || is_under(path, &options.ws_path)
        || is_under(path, API_PREFIX)
    {
        return false;
    }
    let last = path.rsplit('/').next().unwrap_or_default();
    !last.contains('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_and_relative_paths_are_unsafe() {
        assert!(path_is_safe("/"));
        assert!(path_is_safe("/assets/app.js"));
        assert!(!path_is_safe(""));
        assert!(!path_is_safe("assets/app.js"));
        assert!(!path_is_safe("/../secret"));
        assert!(!path_is_safe("/assets/..%2f..%2fetc"));
    }

    #[test]
    fn only_extensionless_ui_routes_fall_back() {
        let options = ServerOptions::default();
        assert!(should_fallback_to_index("/", &options));
        assert!(should_fallback_to_index("/torrents/42", &options));
        assert!(should_fallback_to_index("/transmissionist", &options));
        assert!(!should_fallback_to_index("", &options));
        assert!(!should_fallback_to_index("/app.css", &options));
        assert!(!should_fallback_to_index("/transmission/rpc", &options));
        assert!(!should_fallback_to_index("/transmission/rpc/extra", &options));
        assert!(!should_fallback_to_index("/api", &options));
        assert!(!should_fallback_to_index("/api/v1/torrents", &options));
        assert!(should_fallback_to_index("/apiary", &options));
    }
}
