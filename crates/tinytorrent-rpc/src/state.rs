//! Shared state handed to every handler and to the event loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tinytorrent_config::{ServerOptions, SyncTiming};
use tinytorrent_telemetry::Metrics;
use tinytorrent_torrent_core::{RpcDispatcher, SnapshotSource};

use crate::dispatch::{DispatchBridge, TaskQueue};
use crate::error::RpcServerResult;
use crate::http::gatekeeper::AllowedHosts;
use crate::http::session::SessionGuard;
use crate::sync::feed::SnapshotFeed;
use crate::sync::registry::ClientRegistry;

/// Run flags observed by handlers, the event loop and the owner.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    running: AtomicBool,
    destroying: AtomicBool,
}

impl Lifecycle {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Mark the server running. Returns `false` if it already was.
    pub(crate) fn begin(&self) -> bool {
        !self.running.swap(true, Ordering::AcqRel)
    }

    /// Clear the running flag. Returns whether it was set.
    pub(crate) fn end(&self) -> bool {
        self.running.swap(false, Ordering::AcqRel)
    }

    pub(crate) fn is_destroying(&self) -> bool {
        self.destroying.load(Ordering::Acquire)
    }

    pub(crate) fn mark_destroying(&self) {
        self.destroying.store(true, Ordering::Release);
    }
}

pub(crate) struct ServerState {
    pub(crate) options: ServerOptions,
    pub(crate) timing: SyncTiming,
    pub(crate) allowed_hosts: AllowedHosts,
    pub(crate) session: SessionGuard,
    pub(crate) feed: SnapshotFeed,
    pub(crate) registry: Arc<ClientRegistry>,
    pub(crate) tasks: Arc<TaskQueue>,
    pub(crate) bridge: Arc<DispatchBridge>,
    pub(crate) lifecycle: Arc<Lifecycle>,
    pub(crate) metrics: Metrics,
}

impl ServerState {
    pub(crate) fn new(
        options: ServerOptions,
        timing: SyncTiming,
        bind_host: &str,
        engine: Option<Arc<dyn SnapshotSource>>,
        dispatcher: Arc<dyn RpcDispatcher>,
        metrics: Metrics,
    ) -> RpcServerResult<Arc<Self>> {
        let session = SessionGuard::new(&options.session_header)?;
        let tasks = Arc::new(TaskQueue::default());
        let bridge = Arc::new(DispatchBridge::new(
            Arc::clone(&tasks),
            dispatcher,
            metrics.clone(),
        ));
        Ok(Arc::new(Self {
            allowed_hosts: AllowedHosts::for_bind_host(bind_host),
            session,
            feed: SnapshotFeed::new(engine),
            registry: Arc::new(ClientRegistry::new(metrics.clone())),
            tasks,
            bridge,
            lifecycle: Arc::new(Lifecycle::default()),
            metrics,
            options,
            timing,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions_report_previous_state() {
        let lifecycle = Lifecycle::default();
        assert!(!lifecycle.is_running());
        assert!(lifecycle.begin());
        assert!(!lifecycle.begin());
        assert!(lifecycle.is_running());
        assert!(lifecycle.end());
        assert!(!lifecycle.end());
        assert!(!lifecycle.is_destroying());
        lifecycle.mark_destroying();
        assert!(lifecycle.is_destroying());
    }
}
