//! Router construction for the RPC and push endpoints.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, request::Parts},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::{
    cors::{AllowHeaders, AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::http::constants::CORS_MAX_AGE;
use crate::http::errors::ApiError;
use crate::http::gatekeeper::require_allowed_host;
use crate::http::{rpc, ui, ws};
use crate::state::ServerState;

/// Routes, CORS, host validation and request tracing, outermost last.
pub(crate) fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(
            &state.options.rpc_path,
            post(rpc::handle_rpc).fallback(rpc_method_not_allowed),
        )
        .route(
            &state.options.ws_path,
            get(ws::handle_ws_upgrade).fallback(ws_method_not_allowed),
        )
        .fallback(ui::serve_ui)
        .layer(cors_layer(&state))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_allowed_host,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &ServerState) -> CorsLayer {
    let trusted: Arc<BTreeSet<String>> = Arc::new(state.options.trusted_origins.clone());
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _: &Parts| {
                trusted.is_empty()
                    || origin
                        .to_str()
                        .is_ok_and(|origin| trusted.contains(origin))
            },
        ))
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([state.session.header().clone()])
        .max_age(CORS_MAX_AGE)
}

async fn rpc_method_not_allowed(State(state): State<Arc<ServerState>>) -> Response {
    method_not_allowed(&state, "POST")
}

async fn ws_method_not_allowed(State(state): State<Arc<ServerState>>) -> Response {
    method_not_allowed(&state, "GET")
}

fn method_not_allowed(state: &ServerState, allowed: &'static str) -> Response {
    let err = ApiError::method_not_allowed(allowed);
    state.metrics.inc_rpc_request(err.outcome());
    err.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::body::{Body, to_bytes};
    use axum::http::{
        HeaderName, Request, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_ORIGIN, ACCESS_CONTROL_EXPOSE_HEADERS, ACCESS_CONTROL_MAX_AGE,
            ALLOW, CACHE_CONTROL, HOST, ORIGIN, WWW_AUTHENTICATE,
        },
    };
    use serde_json::Value;
    use std::time::Duration;
    use tinytorrent_config::{MAX_RPC_BODY_BYTES, ServerOptions, SyncTiming};
    use tinytorrent_telemetry::Metrics;
    use tinytorrent_test_support::mocks::{HoldingDispatcher, RecordingDispatcher};
    use tinytorrent_torrent_core::RpcDispatcher;
    use tower::ServiceExt;

    use crate::event_loop::EventLoop;

    const RPC: &str = "/transmission/rpc";
    const SESSION: &str = "x-transmission-session-id";

    fn server(
        options: ServerOptions,
        dispatcher: Arc<dyn RpcDispatcher>,
    ) -> Result<(Router, Arc<ServerState>)> {
        let state = ServerState::new(
            options,
            SyncTiming::default(),
            "127.0.0.1",
            None,
            dispatcher,
            Metrics::new()?,
        )?;
        state.lifecycle.begin();
        tokio::spawn(EventLoop::new(Arc::clone(&state), None).run());
        Ok((build_router(Arc::clone(&state)), state))
    }

    fn rpc_request(session: Option<&str>, body: &str) -> Result<Request<Body>> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(RPC)
            .header(HOST, "127.0.0.1:8080");
        if let Some(session) = session {
            builder = builder.header(SESSION, session);
        }
        Ok(builder.body(Body::from(body.to_string()))?)
    }

    async fn json(response: Response) -> Result<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn session_id(router: &Router) -> Result<String> {
        let response = router.clone().oneshot(rpc_request(None, "{}")?).await?;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let token = response
            .headers()
            .get(SESSION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("missing session header"))?;
        assert_eq!(json(response).await?["error"], "session id required");
        Ok(token)
    }

    #[tokio::test]
    async fn session_handshake_then_dispatch() -> Result<()> {
        let dispatcher = RecordingDispatcher::answering("{\"result\":\"success\"}");
        let (router, state) = server(ServerOptions::default(), dispatcher.clone())?;

        let token = session_id(&router).await?;
        assert_eq!(token.len(), 32);
        assert_eq!(dispatcher.calls(), 0);

        let response = router
            .clone()
            .oneshot(rpc_request(Some(&token), "{\"method\":\"session-get\"}")?)
            .await?;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(CACHE_CONTROL),
            Some(&HeaderValue::from_static("no-store"))
        );
        assert_eq!(json(response).await?["result"], "success");
        assert_eq!(dispatcher.payloads(), vec!["{\"method\":\"session-get\"}".to_string()]);
        assert_eq!(state.metrics.snapshot().rpc_dispatched_total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn foreign_host_is_rejected_everywhere() -> Result<()> {
        let (router, _) = server(
            ServerOptions::default(),
            RecordingDispatcher::answering("{}"),
        )?;
        for path in [RPC, "/transmission/rpc/ws", "/elsewhere"] {
            let request = Request::builder()
                .method(Method::POST)
                .uri(path)
                .header(HOST, "attacker.example")
                .body(Body::empty())?;
            let response = router.clone().oneshot(request).await?;
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{path}");
            assert_eq!(json(response).await?["error"], "invalid host header");
        }

        let request = Request::builder()
            .method(Method::POST)
            .uri(RPC)
            .body(Body::empty())?;
        let response = router.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_paths_are_not_found() -> Result<()> {
        let (router, _) = server(
            ServerOptions::default(),
            RecordingDispatcher::answering("{}"),
        )?;
        let request = Request::builder()
            .uri("/missing")
            .header(HOST, "localhost")
            .body(Body::empty())?;
        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(response).await?["error"], "not found");
        Ok(())
    }

    fn ui_fixture() -> Result<std::path::PathBuf> {
        let root = std::env::temp_dir().join(format!("tt-ui-{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&root)?;
        std::fs::write(root.join("index.html"), "<main>tinytorrent</main>")?;
        std::fs::write(root.join("app.js"), "console.log('tt');")?;
        Ok(root)
    }

    async fn send_plain(router: &Router, method: Method, path: &str) -> Result<Response> {
        let request = Request::builder()
            .method(method)
            .uri(path)
            .header(HOST, "localhost:8080")
            .body(Body::empty())?;
        Ok(router.clone().oneshot(request).await?)
    }

    async fn text(response: Response) -> Result<String> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    #[tokio::test]
    async fn ui_root_serves_assets_and_client_routes() -> Result<()> {
        let root = ui_fixture()?;
        let (router, _) = server(
            ServerOptions::default().with_ui_root(&root),
            RecordingDispatcher::answering("{}"),
        )?;

        let index = send_plain(&router, Method::GET, "/").await?;
        assert_eq!(index.status(), StatusCode::OK);
        assert_eq!(text(index).await?, "<main>tinytorrent</main>");

        let asset = send_plain(&router, Method::GET, "/app.js").await?;
        assert_eq!(asset.status(), StatusCode::OK);
        assert_eq!(text(asset).await?, "console.log('tt');");

        let route = send_plain(&router, Method::GET, "/torrents/42").await?;
        assert_eq!(route.status(), StatusCode::OK);
        assert_eq!(text(route).await?, "<main>tinytorrent</main>");

        let head = send_plain(&router, Method::HEAD, "/torrents/42").await?;
        assert_eq!(head.status(), StatusCode::OK);

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[tokio::test]
    async fn ui_rejects_missing_assets_unsafe_paths_and_writes() -> Result<()> {
        let root = ui_fixture()?;
        let (router, state) = server(
            ServerOptions::default().with_ui_root(&root),
            RecordingDispatcher::answering("{}"),
        )?;

        let missing = send_plain(&router, Method::GET, "/missing.css").await?;
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(missing).await?["error"], "not found");

        let api = send_plain(&router, Method::GET, "/api/torrents").await?;
        assert_eq!(api.status(), StatusCode::NOT_FOUND);

        let traversal = send_plain(&router, Method::GET, "/assets/../../secret").await?;
        assert_eq!(traversal.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(traversal).await?["error"], "bad request");

        let write = send_plain(&router, Method::POST, "/app.js").await?;
        assert_eq!(write.status(), StatusCode::NOT_FOUND);

        let rendered = state.metrics.render()?;
        assert!(rendered.contains("outcome=\"bad_request\""));
        assert!(rendered.contains("outcome=\"not_found\""));

        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[tokio::test]
    async fn ui_without_index_does_not_fall_back() -> Result<()> {
        let root = ui_fixture()?;
        std::fs::remove_file(root.join("index.html"))?;
        let (router, _) = server(
            ServerOptions::default().with_ui_root(&root),
            RecordingDispatcher::answering("{}"),
        )?;
        let route = send_plain(&router, Method::GET, "/torrents/42").await?;
        assert_eq!(route.status(), StatusCode::NOT_FOUND);
        assert_eq!(json(route).await?["error"], "not found");
        std::fs::remove_dir_all(&root)?;
        Ok(())
    }

    #[tokio::test]
    async fn wrong_method_on_endpoints_is_a_json_405() -> Result<()> {
        let (router, state) = server(
            ServerOptions::default(),
            RecordingDispatcher::answering("{}"),
        )?;
        for (method, path, allowed) in [
            (Method::GET, RPC, "POST"),
            (Method::PUT, RPC, "POST"),
            (Method::POST, "/transmission/rpc/ws", "GET"),
        ] {
            let response = send_plain(&router, method, path).await?;
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{path}");
            assert_eq!(
                response.headers().get(ALLOW),
                Some(&HeaderValue::from_static(allowed))
            );
            assert_eq!(
                response.headers().get(CACHE_CONTROL),
                Some(&HeaderValue::from_static("no-store"))
            );
            assert_eq!(json(response).await?["error"], "method not allowed");
        }
        assert!(
            state
                .metrics
                .render()?
                .contains("outcome=\"method_not_allowed\"")
        );
        Ok(())
    }

    #[tokio::test]
    async fn non_utf8_body_is_rejected_before_dispatch() -> Result<()> {
        let dispatcher = RecordingDispatcher::answering("{}");
        let (router, _) = server(ServerOptions::default(), dispatcher.clone())?;
        let token = session_id(&router).await?;

        let request = Request::builder()
            .method(Method::POST)
            .uri(RPC)
            .header(HOST, "127.0.0.1:8080")
            .header(SESSION, &token)
            .body(Body::from(vec![b'{', 0xff, 0xfe, b'}']))?;
        let response = router.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json(response).await?["error"], "request body is not valid utf-8");
        assert_eq!(dispatcher.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn untrusted_origin_is_forbidden() -> Result<()> {
        let dispatcher = RecordingDispatcher::answering("{}");
        let options = ServerOptions::default().with_trusted_origin("tt://app");
        let (router, _) = server(options, dispatcher.clone())?;

        let mut request = rpc_request(None, "{}")?;
        request
            .headers_mut()
            .insert(ORIGIN, HeaderValue::from_static("http://evil.example"));
        let response = router.clone().oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json(response).await?["error"], "origin not allowed");
        assert_eq!(dispatcher.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_credentials_are_unauthorized() -> Result<()> {
        let dispatcher = RecordingDispatcher::answering("{}");
        let (router, _) = server(
            ServerOptions::default().with_token("abc123"),
            dispatcher.clone(),
        )?;
        let response = router.clone().oneshot(rpc_request(None, "{}")?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().get(WWW_AUTHENTICATE).is_none());

        let (router, _) = server(
            ServerOptions::default().with_basic_auth("admin", "secret"),
            dispatcher.clone(),
        )?;
        let response = router.clone().oneshot(rpc_request(None, "{}")?).await?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE),
            Some(&HeaderValue::from_static("Basic realm=\"TinyTorrent RPC\""))
        );
        assert_eq!(json(response).await?["error"], "unauthorized");
        assert_eq!(dispatcher.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn valid_token_reaches_session_check() -> Result<()> {
        let (router, _) = server(
            ServerOptions::default().with_token("abc123"),
            RecordingDispatcher::answering("{}"),
        )?;
        let mut request = rpc_request(None, "{}")?;
        request.headers_mut().insert(
            HeaderName::from_static("x-tt-auth"),
            HeaderValue::from_static("abc123"),
        );
        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        Ok(())
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_dispatch() -> Result<()> {
        let dispatcher = RecordingDispatcher::answering("{}");
        let (router, state) = server(ServerOptions::default(), dispatcher.clone())?;
        let token = session_id(&router).await?;

        let oversized = "x".repeat(MAX_RPC_BODY_BYTES + 1);
        let response = router
            .clone()
            .oneshot(rpc_request(Some(&token), &oversized)?)
            .await?;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(dispatcher.calls(), 0);
        assert!(state.metrics.render()?.contains("outcome=\"too_large\""));
        Ok(())
    }

    #[tokio::test]
    async fn abandoned_request_returns_internal_error() -> Result<()> {
        let dispatcher = HoldingDispatcher::new();
        let (router, _) = server(ServerOptions::default(), dispatcher.clone())?;
        let token = session_id(&router).await?;

        let call = tokio::spawn(router.clone().oneshot(rpc_request(Some(&token), "{}")?));
        while dispatcher.held() == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(dispatcher.abandon_next());
        let response = call.await??;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json(response).await?["error"], "dispatcher dropped the request");
        Ok(())
    }

    #[tokio::test]
    async fn preflight_is_answered_without_credentials() -> Result<()> {
        let options = ServerOptions::default()
            .with_token("abc123")
            .with_trusted_origin("tt://app");
        let (router, _) = server(options, RecordingDispatcher::answering("{}"))?;
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(RPC)
            .header(HOST, "localhost:8080")
            .header(ORIGIN, "tt://app")
            .header("access-control-request-method", "POST")
            .header("access-control-request-headers", "x-tt-auth, content-type")
            .body(Body::empty())?;
        let response = router.clone().oneshot(request).await?;
        assert!(response.status().is_success());
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_ALLOW_ORIGIN),
            Some(&HeaderValue::from_static("tt://app"))
        );
        assert_eq!(
            response.headers().get(ACCESS_CONTROL_MAX_AGE),
            Some(&HeaderValue::from_static("600"))
        );

        let handshake = {
            let mut request = rpc_request(None, "{}")?;
            let headers = request.headers_mut();
            headers.insert(ORIGIN, HeaderValue::from_static("tt://app"));
            headers.insert(
                HeaderName::from_static("x-tt-auth"),
                HeaderValue::from_static("abc123"),
            );
            router.oneshot(request).await?
        };
        assert_eq!(handshake.status(), StatusCode::CONFLICT);
        let exposed = handshake
            .headers()
            .get(ACCESS_CONTROL_EXPOSE_HEADERS)
            .and_then(|value| value.to_str().ok())
            .map(str::to_ascii_lowercase);
        assert_eq!(exposed.as_deref(), Some(SESSION));
        Ok(())
    }

    #[tokio::test]
    async fn push_upgrade_requires_token() -> Result<()> {
        let (router, _) = server(
            ServerOptions::default().with_token("abc123"),
            RecordingDispatcher::answering("{}"),
        )?;
        let request = Request::builder()
            .uri("/transmission/rpc/ws?token=wrong")
            .header(HOST, "127.0.0.1:8080")
            .body(Body::empty())?;
        let response = router.oneshot(request).await?;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(json(response).await?["error"], "invalid token");
        Ok(())
    }

    #[tokio::test]
    async fn destroying_server_answers_unavailable() -> Result<()> {
        let (router, state) = server(
            ServerOptions::default(),
            RecordingDispatcher::answering("{}"),
        )?;
        state.lifecycle.mark_destroying();
        let response = router.oneshot(rpc_request(None, "{}")?).await?;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        Ok(())
    }
}
