//! Engine and dispatcher doubles.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tinytorrent_torrent_core::{
    DispatchCompletion, RpcDispatcher, SessionSnapshot, SnapshotCell, SnapshotSource,
    TorrentSnapshot,
};

use crate::fixtures::session_of;

fn lock<'a, T>(mutex: &'a Mutex<T>, name: &'a str) -> MutexGuard<'a, T> {
    mutex
        .lock()
        .unwrap_or_else(|err| panic!("failed to lock {name}: {err}"))
}

/// Engine double whose snapshots are published by the test.
#[derive(Default)]
pub struct ScriptedEngine {
    cell: SnapshotCell,
    reads: AtomicUsize,
}

impl ScriptedEngine {
    /// Engine seeded with `torrents`.
    #[must_use]
    pub fn with_torrents(torrents: Vec<TorrentSnapshot>) -> Arc<Self> {
        Arc::new(Self {
            cell: SnapshotCell::new(session_of(torrents)),
            reads: AtomicUsize::new(0),
        })
    }

    /// Publish a new generation built from `torrents`.
    pub fn publish_torrents(&self, torrents: Vec<TorrentSnapshot>) -> Arc<SessionSnapshot> {
        self.cell.publish(session_of(torrents))
    }

    /// Publish an explicit snapshot.
    pub fn publish(&self, snapshot: SessionSnapshot) -> Arc<SessionSnapshot> {
        self.cell.publish(snapshot)
    }

    /// Change the reported blocklist size.
    pub fn set_blocklist_entries(&self, count: usize) {
        self.cell.set_blocklist_entry_count(count);
    }

    /// Number of `snapshot()` calls observed.
    #[must_use]
    pub fn snapshot_reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl SnapshotSource for ScriptedEngine {
    fn snapshot(&self) -> Arc<SessionSnapshot> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.cell.snapshot()
    }

    fn blocklist_entry_count(&self) -> usize {
        self.cell.blocklist_entry_count()
    }
}

/// Dispatcher that answers inline and records every payload.
pub struct RecordingDispatcher {
    response: String,
    payloads: Mutex<Vec<String>>,
}

impl RecordingDispatcher {
    /// Dispatcher answering every request with `response`.
    #[must_use]
    pub fn answering(response: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            response: response.into(),
            payloads: Mutex::new(Vec::new()),
        })
    }

    /// Number of dispatched requests.
    #[must_use]
    pub fn calls(&self) -> usize {
        lock(&self.payloads, "recorded payloads").len()
    }

    /// Payloads received so far.
    #[must_use]
    pub fn payloads(&self) -> Vec<String> {
        lock(&self.payloads, "recorded payloads").clone()
    }
}

impl RpcDispatcher for RecordingDispatcher {
    fn dispatch(&self, payload: String, completion: DispatchCompletion) {
        lock(&self.payloads, "recorded payloads").push(payload);
        completion.complete(self.response.clone());
    }
}

/// Dispatcher that parks completions until the test releases them.
#[derive(Default)]
pub struct HoldingDispatcher {
    held: Mutex<VecDeque<(String, DispatchCompletion)>>,
}

impl HoldingDispatcher {
    /// Create an empty holding dispatcher.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of parked requests.
    #[must_use]
    pub fn held(&self) -> usize {
        lock(&self.held, "held completions").len()
    }

    /// Complete the oldest parked request with `response`, returning its payload.
    pub fn release_next(&self, response: &str) -> Option<String> {
        let next = lock(&self.held, "held completions").pop_front();
        next.map(|(payload, completion)| {
            completion.complete(response);
            payload
        })
    }

    /// Complete the oldest parked request from a separate thread.
    pub fn release_next_from_thread(&self, response: &str) -> Option<thread::JoinHandle<()>> {
        let next = lock(&self.held, "held completions").pop_front();
        let response = response.to_string();
        next.map(|(_, completion)| thread::spawn(move || completion.complete(response)))
    }

    /// Drop the oldest parked request without answering it.
    pub fn abandon_next(&self) -> bool {
        lock(&self.held, "held completions").pop_front().is_some()
    }
}

impl RpcDispatcher for HoldingDispatcher {
    fn dispatch(&self, payload: String, completion: DispatchCompletion) {
        lock(&self.held, "held completions").push_back((payload, completion));
    }
}

/// Dispatcher that answers from a worker thread after a delay.
pub struct ThreadedDispatcher {
    delay: Duration,
    calls: AtomicUsize,
}

impl ThreadedDispatcher {
    /// Dispatcher answering after `delay` with an echo of the request.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    /// Number of dispatched requests.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RpcDispatcher for ThreadedDispatcher {
    fn dispatch(&self, payload: String, completion: DispatchCompletion) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay;
        thread::spawn(move || {
            thread::sleep(delay);
            completion.complete(format!("{{\"echo\":{payload}}}"));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::torrent;
    use std::sync::mpsc;

    fn capture() -> (DispatchCompletion, mpsc::Receiver<Option<String>>) {
        let (tx, rx) = mpsc::channel();
        let completion = DispatchCompletion::new(move |body| {
            let _ = tx.send(body);
        });
        (completion, rx)
    }

    #[test]
    fn scripted_engine_counts_reads() {
        let engine = ScriptedEngine::with_torrents(vec![torrent(1)]);
        let first = engine.snapshot();
        engine.publish_torrents(vec![torrent(1), torrent(2)]);
        let second = engine.snapshot();
        assert_eq!(engine.snapshot_reads(), 2);
        assert_eq!(first.torrents.len(), 1);
        assert_eq!(second.torrents.len(), 2);
    }

    #[test]
    fn recording_dispatcher_answers_inline() {
        let dispatcher = RecordingDispatcher::answering("{\"result\":\"success\"}");
        let (completion, rx) = capture();
        dispatcher.dispatch("{\"method\":\"session-get\"}".into(), completion);
        assert_eq!(dispatcher.calls(), 1);
        assert_eq!(
            rx.try_recv().ok().flatten().as_deref(),
            Some("{\"result\":\"success\"}")
        );
    }

    #[test]
    fn holding_dispatcher_releases_in_order() {
        let dispatcher = HoldingDispatcher::new();
        let (first, first_rx) = capture();
        let (second, second_rx) = capture();
        dispatcher.dispatch("a".into(), first);
        dispatcher.dispatch("b".into(), second);
        assert_eq!(dispatcher.held(), 2);
        assert_eq!(dispatcher.release_next("one").as_deref(), Some("a"));
        assert_eq!(first_rx.try_recv().ok().flatten().as_deref(), Some("one"));
        assert!(dispatcher.abandon_next());
        assert_eq!(second_rx.try_recv().ok(), Some(None));
    }

    #[test]
    fn threaded_dispatcher_completes_off_thread() {
        let dispatcher = ThreadedDispatcher::with_delay(Duration::from_millis(5));
        let (completion, rx) = capture();
        dispatcher.dispatch("1".into(), completion);
        let body = rx
            .recv_timeout(Duration::from_secs(2))
            .ok()
            .flatten();
        assert_eq!(body.as_deref(), Some("{\"echo\":1}"));
        assert_eq!(dispatcher.calls(), 1);
    }
}
