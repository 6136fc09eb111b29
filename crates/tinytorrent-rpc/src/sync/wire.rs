//! JSON messages written to push-channel clients.
//!
//! Every message is an object tagged by `type`:
//! - `snapshot`: full state, sent once when a client connects.
//! - `patch`: changes relative to what the client last received.
//! - `event`: discrete notifications (`torrent-added`, `app-shutdown`, ...).

use serde::Serialize;
use serde_json::{Map, Value};
use tinytorrent_torrent_core::{SessionSnapshot, SessionStats, TorrentId, TorrentSnapshot};
use tracing::error;

use crate::sync::diff::SnapshotDiff;

/// Discrete notification broadcast to every client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub(crate) enum SyncEvent {
    TorrentAdded { id: TorrentId },
    TorrentFinished { id: TorrentId },
    BlocklistUpdated { count: usize },
    AppShutdown,
}

impl SyncEvent {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::TorrentAdded { .. } => "torrent-added",
            Self::TorrentFinished { .. } => "torrent-finished",
            Self::BlocklistUpdated { .. } => "blocklist-updated",
            Self::AppShutdown => "app-shutdown",
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum SyncMessage<'a> {
    Snapshot {
        sequence: u64,
        data: SnapshotData<'a>,
    },
    Patch {
        sequence: u64,
        data: PatchData<'a>,
    },
    Event {
        data: &'a SyncEvent,
    },
}

#[derive(Serialize)]
struct SnapshotData<'a> {
    session: &'a SessionStats,
    torrents: &'a [TorrentSnapshot],
}

#[derive(Serialize)]
struct PatchData<'a> {
    session: &'a SessionStats,
    torrents: TorrentChanges<'a>,
}

#[derive(Serialize)]
struct TorrentChanges<'a> {
    added: &'a [&'a TorrentSnapshot],
    updated: Vec<Map<String, Value>>,
    removed: &'a [TorrentId],
}

/// Full-state message for a newly connected client.
pub(crate) fn encode_snapshot(sequence: u64, snapshot: &SessionSnapshot) -> Option<String> {
    encode(&SyncMessage::Snapshot {
        sequence,
        data: SnapshotData {
            session: &snapshot.session,
            torrents: &snapshot.torrents,
        },
    })
}

/// Patch message taking a client to `current`.
///
/// Updated torrents carry only their `id` and the fields whose value changed.
pub(crate) fn encode_patch(
    sequence: u64,
    current: &SessionSnapshot,
    diff: &SnapshotDiff<'_>,
) -> Option<String> {
    let updated = diff
        .updated
        .iter()
        .map(|(before, after)| changed_fields(before, after))
        .collect::<Result<Vec<_>, _>>();
    let updated = match updated {
        Ok(updated) => updated,
        Err(err) => {
            error!(error = %err, "failed to encode torrent delta");
            return None;
        }
    };
    encode(&SyncMessage::Patch {
        sequence,
        data: PatchData {
            session: &current.session,
            torrents: TorrentChanges {
                added: &diff.added,
                updated,
                removed: &diff.removed,
            },
        },
    })
}

pub(crate) fn encode_event(event: &SyncEvent) -> Option<String> {
    encode(&SyncMessage::Event { data: event })
}

fn encode(message: &SyncMessage<'_>) -> Option<String> {
    serde_json::to_string(message)
        .map_err(|err| error!(error = %err, "failed to encode push message"))
        .ok()
}

fn changed_fields(
    before: &TorrentSnapshot,
    after: &TorrentSnapshot,
) -> Result<Map<String, Value>, serde_json::Error> {
    let Value::Object(previous) = serde_json::to_value(before)? else {
        return Ok(Map::new());
    };
    let Value::Object(current) = serde_json::to_value(after)? else {
        return Ok(Map::new());
    };
    let mut delta = Map::new();
    delta.insert("id".to_string(), Value::from(after.id));
    for (key, value) in current {
        if previous.get(&key) != Some(&value) {
            delta.insert(key, value);
        }
    }
    Ok(delta)
}
