//! Structural comparison of two snapshot generations.

use std::collections::{HashMap, HashSet};

use tinytorrent_torrent_core::{SessionSnapshot, TorrentId, TorrentSnapshot};

/// Differences between a previous and a current snapshot.
///
/// `removed` follows the previous snapshot's order. `added`, `updated` and
/// `finished` follow the current snapshot's order.
#[derive(Debug, Default)]
pub(crate) struct SnapshotDiff<'a> {
    pub(crate) removed: Vec<TorrentId>,
    pub(crate) added: Vec<&'a TorrentSnapshot>,
    /// `(previous, current)` pairs for torrents whose record changed.
    pub(crate) updated: Vec<(&'a TorrentSnapshot, &'a TorrentSnapshot)>,
    /// Torrents whose `is_finished` flag flipped from false to true.
    pub(crate) finished: Vec<TorrentId>,
    pub(crate) session_changed: bool,
}

impl SnapshotDiff<'_> {
    /// Whether a patch built from this diff would carry any information.
    pub(crate) fn is_empty(&self) -> bool {
        !self.session_changed
            && self.removed.is_empty()
            && self.added.is_empty()
            && self.updated.is_empty()
    }
}

/// Whether the session-level aggregates differ between two snapshots.
pub(crate) fn session_changed(previous: &SessionSnapshot, current: &SessionSnapshot) -> bool {
    previous.session != current.session
}

/// Compare `previous` against `current`.
pub(crate) fn diff<'a>(
    previous: &'a SessionSnapshot,
    current: &'a SessionSnapshot,
) -> SnapshotDiff<'a> {
    let previous_by_id: HashMap<TorrentId, &TorrentSnapshot> = previous
        .torrents
        .iter()
        .map(|torrent| (torrent.id, torrent))
        .collect();
    let current_ids: HashSet<TorrentId> =
        current.torrents.iter().map(|torrent| torrent.id).collect();

    let mut result = SnapshotDiff {
        session_changed: session_changed(previous, current),
        ..SnapshotDiff::default()
    };

    result.removed = previous
        .torrents
        .iter()
        .map(|torrent| torrent.id)
        .filter(|id| !current_ids.contains(id))
        .collect();

    for torrent in &current.torrents {
        match previous_by_id.get(&torrent.id) {
            None => result.added.push(torrent),
            Some(&before) if before != torrent => {
                if !before.is_finished && torrent.is_finished {
                    result.finished.push(torrent.id);
                }
                result.updated.push((before, torrent));
            }
            Some(_) => {}
        }
    }
    result
}
