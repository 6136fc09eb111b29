//! Public server handle: construction, start/stop and connection info.

use std::net::TcpListener;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use tinytorrent_config::{BindAddress, RpcServerConfig};
use tinytorrent_telemetry::{Metrics, build_sha};
use tinytorrent_torrent_core::{RpcDispatcher, SnapshotSource};
use tracing::{debug, error, info, warn};

use crate::error::{RpcServerError, RpcServerResult};
use crate::event_loop::EventLoop;
use crate::state::ServerState;
use crate::sync::wire::{self, SyncEvent};

const WORKER_THREAD_NAME: &str = "tinytorrent-rpc";

/// Reported to the embedding process once the listener is bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Configured API token, if any.
    pub token: Option<String>,
    /// Port actually bound; `0` until a listener is up.
    pub port: u16,
}

/// HTTP/WebSocket control plane for a torrent engine.
///
/// The server owns one background thread that runs the listener, the
/// dispatch queue and the push loop. Dropping the server stops it.
pub struct RpcServer {
    state: Arc<ServerState>,
    bind: BindAddress,
    worker: Mutex<Option<JoinHandle<()>>>,
    connection: Mutex<ConnectionInfo>,
}

impl RpcServer {
    /// Build a stopped server.
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is invalid or the metrics
    /// registry cannot be created.
    pub fn new(
        config: RpcServerConfig,
        engine: Option<Arc<dyn SnapshotSource>>,
        dispatcher: Arc<dyn RpcDispatcher>,
    ) -> RpcServerResult<Self> {
        let bind = config.validate()?;
        let metrics = Metrics::new()?;
        let state = ServerState::new(
            config.options,
            config.timing,
            &bind.host,
            engine,
            dispatcher,
            metrics,
        )?;
        Ok(Self {
            state,
            bind,
            worker: Mutex::new(None),
            connection: Mutex::new(ConnectionInfo::default()),
        })
    }

    fn lock_guard<'a, T>(mutex: &'a Mutex<T>, name: &'static str) -> MutexGuard<'a, T> {
        mutex
            .lock()
            .unwrap_or_else(|err| panic!("failed to lock {name}: {err}"))
    }

    /// Bind the listener and start the event loop. Calling it on a running
    /// server does nothing.
    ///
    /// A listener that cannot be bound is logged and the loop runs without
    /// one; the connection info then keeps port `0`.
    ///
    /// # Errors
    ///
    /// Returns an error when the event-loop thread cannot be spawned.
    pub fn start(&self) -> RpcServerResult<()> {
        if self.state.lifecycle.is_destroying() || !self.state.lifecycle.begin() {
            return Ok(());
        }

        let listener = self.bind_listener();
        let port = listener
            .as_ref()
            .and_then(|listener| listener.local_addr().ok())
            .map_or(0, |addr| addr.port());
        *Self::lock_guard(&self.connection, "connection info") = ConnectionInfo {
            token: self.state.options.token.clone(),
            port,
        };

        let state = Arc::clone(&self.state);
        let spawned = thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_worker(state, listener));
        match spawned {
            Ok(handle) => {
                *Self::lock_guard(&self.worker, "worker handle") = Some(handle);
                info!(
                    host = %self.bind.host,
                    port,
                    rpc_path = %self.state.options.rpc_path,
                    ws_path = %self.state.options.ws_path,
                    build = build_sha(),
                    "rpc server started"
                );
                Ok(())
            }
            Err(source) => {
                self.state.lifecycle.end();
                Err(RpcServerError::SpawnWorker { source })
            }
        }
    }

    fn bind_listener(&self) -> Option<TcpListener> {
        let address = (self.bind.socket_host(), self.bind.port);
        let listener = match TcpListener::bind(address) {
            Ok(listener) => listener,
            Err(err) => {
                error!(
                    host = %self.bind.host,
                    port = self.bind.port,
                    error = %err,
                    "failed to bind rpc listener"
                );
                return None;
            }
        };
        if let Err(err) = listener.set_nonblocking(true) {
            error!(error = %err, "failed to make rpc listener non-blocking");
            return None;
        }
        Some(listener)
    }

    /// Stop the event loop and wait for its thread. Connected push clients
    /// receive an `app-shutdown` event first. Calling it on a stopped server
    /// does nothing.
    pub fn stop(&self) {
        if !self.state.lifecycle.is_running() {
            self.join_worker();
            return;
        }
        if !self.state.lifecycle.is_destroying() {
            let state = Arc::clone(&self.state);
            self.state.tasks.push(Box::new(move || {
                if let Some(payload) = wire::encode_event(&SyncEvent::AppShutdown) {
                    let reached = state.registry.broadcast(&payload);
                    state.metrics.add_ws_messages("event", reached);
                    debug!(clients = reached, "shutdown event broadcast");
                }
            }));
        }
        self.state.lifecycle.end();
        self.state.tasks.wake();
        self.join_worker();
    }

    fn join_worker(&self) {
        let Some(handle) = Self::lock_guard(&self.worker, "worker handle").take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            warn!("rpc server stopped from its own event loop; not joining");
            return;
        }
        if handle.join().is_err() {
            error!("rpc event loop thread panicked");
        }
        info!("rpc server stopped");
    }

    /// Token and bound port, for the embedding process.
    #[must_use]
    pub fn connection_info(&self) -> ConnectionInfo {
        Self::lock_guard(&self.connection, "connection info").clone()
    }

    /// Whether the event loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.lifecycle.is_running()
    }

    /// Metrics recorded by this server.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.state.metrics
    }
}

impl Drop for RpcServer {
    fn drop(&mut self) {
        self.state.lifecycle.mark_destroying();
        self.stop();
        self.state.registry.clear();
    }
}

fn run_worker(state: Arc<ServerState>, listener: Option<TcpListener>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            error!(error = %err, "failed to build rpc event loop runtime");
            state.lifecycle.end();
            return;
        }
    };
    runtime.block_on(EventLoop::new(state, listener).run());
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use tinytorrent_test_support::mocks::RecordingDispatcher;

    fn ephemeral() -> RpcServerConfig {
        RpcServerConfig::new("http://127.0.0.1:0")
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let result = RpcServer::new(
            RpcServerConfig::new("http://127.0.0.1"),
            None,
            RecordingDispatcher::answering("{}"),
        );
        assert!(matches!(result, Err(RpcServerError::Config { .. })));
    }

    #[test]
    fn start_reports_bound_port_and_stop_is_idempotent() -> Result<()> {
        let mut config = ephemeral();
        config.options.token = Some("abc123".into());
        let server = RpcServer::new(config, None, RecordingDispatcher::answering("{}"))?;
        assert_eq!(server.connection_info(), ConnectionInfo::default());

        server.start()?;
        server.start()?;
        let info = server.connection_info();
        assert_ne!(info.port, 0);
        assert_eq!(info.token.as_deref(), Some("abc123"));
        assert!(server.is_running());

        server.stop();
        assert!(!server.is_running());
        server.stop();
        Ok(())
    }

    #[test]
    fn bind_failure_leaves_server_running_without_listener() -> Result<()> {
        let occupied = TcpListener::bind(("127.0.0.1", 0))?;
        let port = occupied.local_addr()?.port();
        let server = RpcServer::new(
            RpcServerConfig::new(format!("http://127.0.0.1:{port}")),
            None,
            RecordingDispatcher::answering("{}"),
        )?;
        server.start()?;
        assert!(server.is_running());
        assert_eq!(server.connection_info().port, 0);
        server.stop();
        Ok(())
    }

    #[test]
    fn drop_stops_a_running_server() -> Result<()> {
        let server = RpcServer::new(ephemeral(), None, RecordingDispatcher::answering("{}"))?;
        server.start()?;
        let port = server.connection_info().port;
        drop(server);
        assert!(TcpListener::bind(("127.0.0.1", port)).is_ok());
        Ok(())
    }
}
