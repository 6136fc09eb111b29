//! Snapshot builders for tests.

use tinytorrent_torrent_core::{
    SessionSnapshot, SessionStats, TorrentId, TorrentSnapshot, TorrentState,
};

/// A downloading torrent with deterministic field values derived from `id`.
#[must_use]
pub fn torrent(id: TorrentId) -> TorrentSnapshot {
    TorrentSnapshot {
        id,
        hash: format!("{id:040x}"),
        name: format!("torrent-{id}"),
        state: TorrentState::Downloading,
        total_size: 1_000,
        total_wanted: 1_000,
        left_until_done: 1_000,
        size_when_done: 1_000,
        eta: -1,
        download_dir: "/downloads".to_string(),
        ..TorrentSnapshot::default()
    }
}

/// `base` marked as finished and seeding.
#[must_use]
pub fn finished(mut base: TorrentSnapshot) -> TorrentSnapshot {
    base.is_finished = true;
    base.state = TorrentState::Seeding;
    base.progress = 1.0;
    base.total_done = base.total_wanted;
    base.total_wanted_done = base.total_wanted;
    base.left_until_done = 0;
    base
}

/// Session snapshot whose aggregates are derived from `torrents`.
#[must_use]
pub fn session_of(torrents: Vec<TorrentSnapshot>) -> SessionSnapshot {
    let count = |predicate: fn(&TorrentSnapshot) -> bool| {
        torrents.iter().filter(|torrent| predicate(torrent)).count() as u64
    };
    let stats = SessionStats {
        download_rate: torrents.iter().map(|torrent| torrent.download_rate).sum(),
        upload_rate: torrents.iter().map(|torrent| torrent.upload_rate).sum(),
        torrent_count: torrents.len() as u64,
        active_torrent_count: count(|torrent| {
            matches!(
                torrent.state,
                TorrentState::Downloading | TorrentState::Seeding
            )
        }),
        paused_torrent_count: count(|torrent| torrent.state == TorrentState::Unknown),
        dht_nodes: 0,
    };
    SessionSnapshot::new(stats, torrents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_aggregates_follow_torrents() {
        let mut fast = torrent(1);
        fast.download_rate = 100;
        let snapshot = session_of(vec![fast, finished(torrent(2))]);
        assert_eq!(snapshot.session.torrent_count, 2);
        assert_eq!(snapshot.session.download_rate, 100);
        assert_eq!(snapshot.session.active_torrent_count, 2);
        assert!(snapshot.torrents[1].is_finished);
    }
}
