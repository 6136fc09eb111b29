//! Snapshot access with a stable fallback when no engine is attached.

use std::sync::Arc;

use tinytorrent_torrent_core::{SessionSnapshot, SnapshotSource};

#[derive(Clone)]
pub(crate) struct SnapshotFeed {
    engine: Option<Arc<dyn SnapshotSource>>,
    empty: Arc<SessionSnapshot>,
}

impl SnapshotFeed {
    pub(crate) fn new(engine: Option<Arc<dyn SnapshotSource>>) -> Self {
        Self {
            engine,
            empty: Arc::new(SessionSnapshot::default()),
        }
    }

    /// Latest engine snapshot. Without an engine this is always the same
    /// empty generation.
    pub(crate) fn current(&self) -> Arc<SessionSnapshot> {
        self.engine
            .as_ref()
            .map_or_else(|| Arc::clone(&self.empty), |engine| engine.snapshot())
    }

    pub(crate) fn blocklist_entries(&self) -> usize {
        self.engine
            .as_ref()
            .map_or(0, |engine| engine.blocklist_entry_count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tinytorrent_test_support::fixtures::torrent;
    use tinytorrent_test_support::mocks::ScriptedEngine;

    #[test]
    fn missing_engine_yields_one_empty_generation() {
        let feed = SnapshotFeed::new(None);
        let first = feed.current();
        assert!(first.torrents.is_empty());
        assert!(Arc::ptr_eq(&first, &feed.current()));
        assert_eq!(feed.blocklist_entries(), 0);
    }

    #[test]
    fn engine_snapshots_pass_through() {
        let engine = ScriptedEngine::with_torrents(vec![torrent(1)]);
        engine.set_blocklist_entries(3);
        let source: Arc<dyn SnapshotSource> = engine.clone();
        let feed = SnapshotFeed::new(Some(source));
        assert_eq!(feed.current().torrents.len(), 1);
        assert_eq!(feed.blocklist_entries(), 3);
        assert_eq!(engine.snapshot_reads(), 1);
    }
}
