//! Collaborator traits consumed by the RPC control plane.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::model::SessionSnapshot;

/// Read-only view of the engine used by the live update loop.
pub trait SnapshotSource: Send + Sync {
    /// Latest published snapshot. Returning the same `Arc` means "no new generation".
    fn snapshot(&self) -> Arc<SessionSnapshot>;

    /// Number of entries in the active IP blocklist.
    fn blocklist_entry_count(&self) -> usize;
}

/// Interprets RPC request bodies and produces response bodies.
///
/// Implementations may complete inline or hand the completion to another
/// thread; the control plane never blocks on them.
pub trait RpcDispatcher: Send + Sync {
    /// Start handling `payload`. The response is reported through `completion`.
    fn dispatch(&self, payload: String, completion: DispatchCompletion);
}

type Deliver = Box<dyn FnOnce(Option<String>) + Send>;

/// One-shot handle used by a dispatcher to hand back its response.
///
/// Completing consumes the handle, so a response is delivered at most once.
/// Dropping the handle without completing reports the request as abandoned.
pub struct DispatchCompletion {
    deliver: Option<Deliver>,
}

impl DispatchCompletion {
    /// Wrap a delivery callback. It receives `Some(body)` on completion or
    /// `None` if the handle is dropped unused.
    #[must_use]
    pub fn new<F>(deliver: F) -> Self
    where
        F: FnOnce(Option<String>) + Send + 'static,
    {
        Self {
            deliver: Some(Box::new(deliver)),
        }
    }

    /// Deliver the response body. Safe to call from any thread.
    pub fn complete(mut self, response: impl Into<String>) {
        if let Some(deliver) = self.deliver.take() {
            deliver(Some(response.into()));
        }
    }
}

impl Drop for DispatchCompletion {
    fn drop(&mut self) {
        if let Some(deliver) = self.deliver.take() {
            debug!("dispatch completion dropped without a response");
            deliver(None);
        }
    }
}

impl fmt::Debug for DispatchCompletion {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DispatchCompletion")
            .field("pending", &self.deliver.is_some())
            .finish()
    }
}

/// Publish/read cell an engine can use to expose its latest snapshot.
///
/// Every `publish` creates a new generation; readers only ever observe
/// complete snapshots.
pub struct SnapshotCell {
    current: RwLock<Arc<SessionSnapshot>>,
    blocklist_entries: AtomicUsize,
}

impl SnapshotCell {
    /// Create a cell seeded with `initial`.
    #[must_use]
    pub fn new(initial: SessionSnapshot) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            blocklist_entries: AtomicUsize::new(0),
        }
    }

    /// Replace the current snapshot and return the new generation.
    pub fn publish(&self, snapshot: SessionSnapshot) -> Arc<SessionSnapshot> {
        let next = Arc::new(snapshot);
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|err| panic!("failed to lock snapshot cell: {err}"));
        *guard = Arc::clone(&next);
        next
    }

    /// Record the size of the active blocklist.
    pub fn set_blocklist_entry_count(&self, count: usize) {
        self.blocklist_entries.store(count, Ordering::Release);
    }
}

impl Default for SnapshotCell {
    fn default() -> Self {
        Self::new(SessionSnapshot::default())
    }
}

impl SnapshotSource for SnapshotCell {
    fn snapshot(&self) -> Arc<SessionSnapshot> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|err| panic!("failed to lock snapshot cell: {err}"));
        Arc::clone(&guard)
    }

    fn blocklist_entry_count(&self) -> usize {
        self.blocklist_entries.load(Ordering::Acquire)
    }
}
