//! Hand-off between HTTP handlers, the dispatcher and the event loop.
//!
//! # Design
//! - Dispatchers may complete from any thread. A completion only enqueues a
//!   task; the task runs on the event-loop thread and resolves the waiting
//!   handler there.
//! - The pending map holds one entry per request whose connection is still
//!   open. A handler dropped mid-flight removes its entry, so a late
//!   response finds nothing and is discarded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tinytorrent_telemetry::Metrics;
use tinytorrent_torrent_core::{DispatchCompletion, RpcDispatcher};
use tokio::sync::{Notify, oneshot};
use tracing::debug;

/// Deferred unit of work executed on the event-loop thread.
pub(crate) type PendingTask = Box<dyn FnOnce() + Send>;

/// Queue of tasks handed to the event loop from arbitrary threads.
#[derive(Default)]
pub(crate) struct TaskQueue {
    tasks: Mutex<Vec<PendingTask>>,
    wake: Notify,
}

impl TaskQueue {
    fn lock_guard(&self) -> MutexGuard<'_, Vec<PendingTask>> {
        self.tasks
            .lock()
            .unwrap_or_else(|err| panic!("failed to lock pending tasks: {err}"))
    }

    /// Enqueue `task` and wake the event loop.
    pub(crate) fn push(&self, task: PendingTask) {
        self.lock_guard().push(task);
        self.wake.notify_one();
    }

    /// Wake the event loop without queueing work.
    pub(crate) fn wake(&self) {
        self.wake.notify_one();
    }

    /// Resolves once `push` or `wake` is called. A wake issued while nobody
    /// waits is remembered for the next call.
    pub(crate) async fn notified(&self) {
        self.wake.notified().await;
    }

    /// Run every queued task in enqueue order. Tasks queued while draining
    /// wait for the next call.
    pub(crate) fn run_pending(&self) -> usize {
        let tasks = std::mem::take(&mut *self.lock_guard());
        let count = tasks.len();
        for task in tasks {
            task();
        }
        count
    }
}

pub(crate) type RequestId = u64;

/// What a waiting RPC handler receives.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum DispatchOutcome {
    Response(String),
    /// The dispatcher dropped its completion without answering.
    Abandoned,
}

type PendingMap = HashMap<RequestId, oneshot::Sender<DispatchOutcome>>;

pub(crate) struct DispatchBridge {
    next_request_id: AtomicU64,
    pending: Mutex<PendingMap>,
    tasks: Arc<TaskQueue>,
    dispatcher: Arc<dyn RpcDispatcher>,
    metrics: Metrics,
}

impl DispatchBridge {
    pub(crate) fn new(
        tasks: Arc<TaskQueue>,
        dispatcher: Arc<dyn RpcDispatcher>,
        metrics: Metrics,
    ) -> Self {
        Self {
            next_request_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            tasks,
            dispatcher,
            metrics,
        }
    }

    fn lock_guard(&self) -> MutexGuard<'_, PendingMap> {
        self.pending
            .lock()
            .unwrap_or_else(|err| panic!("failed to lock pending requests: {err}"))
    }

    /// Register a request and hand `payload` to the dispatcher.
    pub(crate) fn submit(self: &Arc<Self>, payload: String) -> PendingResponse {
        let id = self.next_request_id.fetch_add(1, Ordering::AcqRel);
        let (sender, receiver) = oneshot::channel();
        let count = {
            let mut pending = self.lock_guard();
            pending.insert(id, sender);
            pending.len()
        };
        self.metrics.set_pending_requests(count);

        let bridge = Arc::downgrade(self);
        let tasks = Arc::clone(&self.tasks);
        let completion = DispatchCompletion::new(move |response| {
            tasks.push(Box::new(move || resolve(&bridge, id, response)));
        });
        debug!(request_id = id, bytes = payload.len(), "dispatching rpc request");
        self.dispatcher.dispatch(payload, completion);

        PendingResponse {
            id,
            bridge: Arc::clone(self),
            receiver,
        }
    }

    fn deliver(&self, id: RequestId, response: Option<String>) {
        let (entry, count) = {
            let mut pending = self.lock_guard();
            (pending.remove(&id), pending.len())
        };
        self.metrics.set_pending_requests(count);
        let Some(sender) = entry else {
            debug!(request_id = id, "dropping response for a closed connection");
            self.metrics.inc_dropped_response();
            return;
        };
        let outcome = response.map_or(DispatchOutcome::Abandoned, DispatchOutcome::Response);
        if sender.send(outcome).is_err() {
            debug!(request_id = id, "rpc handler went away before its response");
        }
    }

    /// Forget a request without answering it.
    pub(crate) fn forget(&self, id: RequestId) -> bool {
        let (removed, count) = {
            let mut pending = self.lock_guard();
            (pending.remove(&id).is_some(), pending.len())
        };
        if removed {
            self.metrics.set_pending_requests(count);
        }
        removed
    }

    /// Release every waiting handler without a response.
    pub(crate) fn release_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.lock_guard());
        self.metrics.set_pending_requests(0);
        drained.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.lock_guard().len()
    }
}

fn resolve(bridge: &Weak<DispatchBridge>, id: RequestId, response: Option<String>) {
    if let Some(bridge) = bridge.upgrade() {
        bridge.deliver(id, response);
    }
}

/// A submitted request awaiting its response. Dropping it forgets the request.
pub(crate) struct PendingResponse {
    id: RequestId,
    bridge: Arc<DispatchBridge>,
    receiver: oneshot::Receiver<DispatchOutcome>,
}

impl PendingResponse {
    pub(crate) const fn id(&self) -> RequestId {
        self.id
    }

    /// Wait for the outcome. `None` means the server released the request
    /// during shutdown.
    pub(crate) async fn wait(mut self) -> Option<DispatchOutcome> {
        (&mut self.receiver).await.ok()
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if self.bridge.forget(self.id) {
            debug!(request_id = self.id, "rpc connection closed before its response");
        }
    }
}
