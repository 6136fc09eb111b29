//! The single-owner event loop: serves HTTP, drains queued tasks and drives
//! live updates, all on one runtime thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout_at};
use tracing::{debug, error, info, warn};

use crate::http::router::build_router;
use crate::state::ServerState;
use crate::sync::live::LiveUpdates;

/// How long shutdown waits for sockets and the listener to wind down.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(1);
const SOCKET_DRAIN_POLL: Duration = Duration::from_millis(10);

pub(crate) struct EventLoop {
    state: Arc<ServerState>,
    listener: Option<std::net::TcpListener>,
}

impl EventLoop {
    /// `listener` must already be non-blocking. Without one the loop still
    /// runs, it just accepts no connections.
    pub(crate) const fn new(
        state: Arc<ServerState>,
        listener: Option<std::net::TcpListener>,
    ) -> Self {
        Self { state, listener }
    }

    pub(crate) async fn run(self) {
        let Self { state, listener } = self;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let serving = listener.and_then(|listener| serve(&state, listener, shutdown_rx));
        let mut live = LiveUpdates::new(
            state.feed.clone(),
            Arc::clone(&state.registry),
            Arc::clone(&state.lifecycle),
            state.metrics.clone(),
            state.timing,
            Instant::now(),
        );
        debug!("rpc event loop started");

        while state.lifecycle.is_running() {
            tokio::select! {
                () = state.tasks.notified() => {}
                () = sleep(state.timing.poll_interval) => {}
            }
            state.tasks.run_pending();
            live.tick(Instant::now());
        }

        state.tasks.run_pending();
        let released = state.bridge.release_all();
        let closed = state.registry.clear();
        let _ = shutdown_tx.send(());
        debug!(released, closed, "rpc event loop draining");

        let deadline = tokio::time::Instant::now() + SHUTDOWN_GRACE;
        while state.registry.open_sockets() > 0 && tokio::time::Instant::now() < deadline {
            sleep(SOCKET_DRAIN_POLL).await;
        }
        if let Some(server) = serving
            && timeout_at(deadline, server).await.is_err()
        {
            warn!("rpc listener did not stop within the shutdown grace period");
        }
        info!("rpc event loop stopped");
    }
}

fn serve(
    state: &Arc<ServerState>,
    listener: std::net::TcpListener,
    shutdown: oneshot::Receiver<()>,
) -> Option<JoinHandle<()>> {
    let listener = match tokio::net::TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, "failed to register rpc listener with the runtime");
            return None;
        }
    };
    let router = build_router(Arc::clone(state));
    Some(tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.await;
            })
            .await;
        if let Err(err) = result {
            error!(error = %err, "rpc listener terminated unexpectedly");
        }
    }))
}
