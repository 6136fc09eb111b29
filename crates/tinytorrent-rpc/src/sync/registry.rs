//! Registry of connected push-channel clients and their anchors.
//!
//! # Design
//! - The registry owns the only sender for each client queue; removing a
//!   client closes its queue and the socket task then closes the socket.
//! - Writes are queued with `try_send`. A full queue means the client stopped
//!   reading and it is dropped rather than buffered without bound.
//! - The lock is never held across a send that could wait.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tinytorrent_telemetry::Metrics;
use tinytorrent_torrent_core::SessionSnapshot;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Capacity of a client's outbound queue.
pub(crate) const OUTBOUND_QUEUE_CAPACITY: usize = 256;

pub(crate) type ClientId = u64;

/// Frame queued for a client's socket task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outbound {
    Text(String),
    Ping,
}

/// A captured snapshot generation stamped with its capture sequence.
#[derive(Debug, Clone)]
pub(crate) struct Anchor {
    pub(crate) sequence: u64,
    pub(crate) snapshot: Arc<SessionSnapshot>,
}

impl Anchor {
    /// Whether both anchors refer to the same snapshot generation.
    pub(crate) fn same_generation(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.snapshot, &other.snapshot)
    }
}

/// Cloned handle used to queue frames for one client.
#[derive(Debug, Clone)]
pub(crate) struct ClientHandle {
    id: ClientId,
    outbound: mpsc::Sender<Outbound>,
}

impl ClientHandle {
    pub(crate) const fn id(&self) -> ClientId {
        self.id
    }
}

/// A client that must be brought from `from` to the generation being sent.
#[derive(Debug)]
pub(crate) struct Catchup {
    pub(crate) handle: ClientHandle,
    pub(crate) from: Anchor,
}

struct WsClient {
    handle: ClientHandle,
    anchor: Anchor,
}

/// Decrements the open-socket count when a socket task ends.
pub(crate) struct SocketGuard {
    registry: Arc<ClientRegistry>,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.registry.open_sockets.fetch_sub(1, Ordering::AcqRel);
    }
}

pub(crate) struct ClientRegistry {
    clients: Mutex<Vec<WsClient>>,
    next_client_id: AtomicU64,
    next_sequence: AtomicU64,
    open_sockets: AtomicUsize,
    metrics: Metrics,
}

impl ClientRegistry {
    pub(crate) fn new(metrics: Metrics) -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
            next_client_id: AtomicU64::new(1),
            next_sequence: AtomicU64::new(1),
            open_sockets: AtomicUsize::new(0),
            metrics,
        }
    }

    fn lock_guard(&self) -> MutexGuard<'_, Vec<WsClient>> {
        self.clients
            .lock()
            .unwrap_or_else(|err| panic!("failed to lock push clients: {err}"))
    }

    /// Stamp a captured snapshot with the next capture sequence.
    pub(crate) fn stamp(&self, snapshot: Arc<SessionSnapshot>) -> Anchor {
        Anchor {
            sequence: self.next_sequence.fetch_add(1, Ordering::AcqRel),
            snapshot,
        }
    }

    /// Register a client anchored at `anchor`, queueing `initial` before any
    /// other frame can reach it.
    pub(crate) fn open(
        &self,
        anchor: Anchor,
        initial: String,
    ) -> (ClientId, mpsc::Receiver<Outbound>) {
        let (outbound, receiver) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        let id = self.next_client_id.fetch_add(1, Ordering::AcqRel);
        if outbound.try_send(Outbound::Text(initial)).is_ok() {
            self.metrics.add_ws_messages("snapshot", 1);
        }
        let handle = ClientHandle { id, outbound };

        let mut clients = self.lock_guard();
        clients.push(WsClient { handle, anchor });
        let count = clients.len();
        drop(clients);

        self.metrics.set_ws_clients(count);
        debug!(client_id = id, clients = count, "push client registered");
        (id, receiver)
    }

    /// Forget a client, closing its queue. Returns whether it was registered.
    pub(crate) fn remove(&self, id: ClientId) -> bool {
        let mut clients = self.lock_guard();
        let before = clients.len();
        clients.retain(|client| client.handle.id != id);
        let removed = clients.len() != before;
        let count = clients.len();
        drop(clients);

        if removed {
            self.metrics.set_ws_clients(count);
            debug!(client_id = id, clients = count, "push client removed");
        }
        removed
    }

    /// Forget every client. Returns how many were registered.
    pub(crate) fn clear(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock_guard());
        self.metrics.set_ws_clients(0);
        drained.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock_guard().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.lock_guard().is_empty()
    }

    /// Stable copy of every client handle.
    pub(crate) fn handles(&self) -> Vec<ClientHandle> {
        self.lock_guard()
            .iter()
            .map(|client| client.handle.clone())
            .collect()
    }

    /// Move every client not already at or beyond `target` onto it and return
    /// the anchors they are moving from.
    ///
    /// Clients sharing `target`'s generation are skipped, as are clients whose
    /// anchor was captured after `target`.
    pub(crate) fn advance(&self, target: &Anchor) -> Vec<Catchup> {
        let mut clients = self.lock_guard();
        let mut catchups = Vec::new();
        for client in &mut *clients {
            if client.anchor.same_generation(target) || client.anchor.sequence > target.sequence
            {
                continue;
            }
            let from = std::mem::replace(&mut client.anchor, target.clone());
            catchups.push(Catchup {
                handle: client.handle.clone(),
                from,
            });
        }
        catchups
    }

    /// Queue a text frame. Clients that cannot accept it are removed.
    pub(crate) fn deliver(&self, handle: &ClientHandle, payload: &str) -> bool {
        match handle.outbound.try_send(Outbound::Text(payload.to_string())) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(client_id = handle.id, "push client is not reading; dropping it");
                self.remove(handle.id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.remove(handle.id);
                false
            }
        }
    }

    /// Queue `payload` for every client. Returns the number of clients reached.
    pub(crate) fn broadcast(&self, payload: &str) -> usize {
        self.handles()
            .iter()
            .filter(|handle| self.deliver(handle, payload))
            .count()
    }

    /// Queue a liveness ping for every client. A full queue skips the ping.
    /// Returns the number of pings queued.
    pub(crate) fn ping_all(&self) -> usize {
        let queued = self
            .handles()
            .iter()
            .filter(|handle| handle.outbound.try_send(Outbound::Ping).is_ok())
            .count();
        self.metrics.add_ws_messages("ping", queued);
        queued
    }

    /// Count a socket task until the returned guard drops.
    pub(crate) fn track_socket(self: &Arc<Self>) -> SocketGuard {
        self.open_sockets.fetch_add(1, Ordering::AcqRel);
        SocketGuard {
            registry: Arc::clone(self),
        }
    }

    pub(crate) fn open_sockets(&self) -> usize {
        self.open_sockets.load(Ordering::Acquire)
    }
}
