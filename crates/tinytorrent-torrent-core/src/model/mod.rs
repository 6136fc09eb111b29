//! Point-in-time torrent and session views published by the engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TorrentCoreError;

/// Engine-assigned torrent identifier, unique within a snapshot.
pub type TorrentId = i64;

/// Coarse lifecycle state reported by the engine for a torrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TorrentState {
    /// Verifying pieces already on disk.
    CheckingFiles,
    /// Resolving metadata for a magnet link.
    DownloadingMetadata,
    /// Actively transferring payload.
    Downloading,
    /// All wanted pieces are present.
    Finished,
    /// Complete and uploading to peers.
    Seeding,
    /// Validating fast-resume data.
    CheckingResumeData,
    /// State not reported or not recognised.
    #[default]
    Unknown,
}

impl TorrentState {
    /// Wire representation of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CheckingFiles => "checking-files",
            Self::DownloadingMetadata => "downloading-metadata",
            Self::Downloading => "downloading",
            Self::Finished => "finished",
            Self::Seeding => "seeding",
            Self::CheckingResumeData => "checking-resume-data",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TorrentState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for TorrentState {
    type Err = TorrentCoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "checking-files" => Ok(Self::CheckingFiles),
            "downloading-metadata" => Ok(Self::DownloadingMetadata),
            "downloading" => Ok(Self::Downloading),
            "finished" => Ok(Self::Finished),
            "seeding" => Ok(Self::Seeding),
            "checking-resume-data" => Ok(Self::CheckingResumeData),
            "unknown" => Ok(Self::Unknown),
            other => Err(TorrentCoreError::UnknownState {
                value: other.to_string(),
            }),
        }
    }
}

/// Immutable record describing one torrent at snapshot time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TorrentSnapshot {
    /// Engine identifier.
    pub id: TorrentId,
    /// Hex-encoded info hash.
    #[serde(rename = "hashString")]
    pub hash: String,
    /// Display name.
    pub name: String,
    /// Lifecycle state.
    pub state: TorrentState,
    /// Fraction of wanted bytes present, in `0.0..=1.0`.
    #[serde(rename = "percentDone")]
    pub progress: f64,
    /// Bytes selected for download.
    pub total_wanted: i64,
    /// Bytes verified on disk.
    pub total_done: i64,
    /// Bytes in the whole torrent.
    pub total_size: i64,
    /// Payload bytes downloaded over the torrent's lifetime.
    #[serde(rename = "downloadedEver")]
    pub downloaded: i64,
    /// Payload bytes uploaded over the torrent's lifetime.
    #[serde(rename = "uploadedEver")]
    pub uploaded: i64,
    /// Current download rate in bytes per second.
    #[serde(rename = "rateDownload")]
    pub download_rate: u64,
    /// Current upload rate in bytes per second.
    #[serde(rename = "rateUpload")]
    pub upload_rate: u64,
    /// Transmission-compatible numeric status.
    pub status: i32,
    /// Position in the download queue.
    pub queue_position: i32,
    /// Connected peers.
    pub peers_connected: i32,
    /// Connected seeds.
    pub seeds_connected: i32,
    /// Peers we are downloading from.
    pub peers_sending_to_us: i32,
    /// Peers we are uploading to.
    pub peers_getting_from_us: i32,
    /// Estimated seconds remaining, `-1` when unknown.
    pub eta: i64,
    /// Wanted bytes already present.
    pub total_wanted_done: i64,
    /// Unix timestamp when the torrent was added.
    #[serde(rename = "addedDate")]
    pub added_time: i64,
    /// Upload/download ratio.
    #[serde(rename = "uploadRatio")]
    pub ratio: f64,
    /// Whether every wanted piece has been downloaded.
    pub is_finished: bool,
    /// Whether pieces are requested in order.
    pub sequential_download: bool,
    /// Whether super-seeding is enabled.
    pub super_seeding: bool,
    /// Directory holding the payload.
    pub download_dir: String,
    /// Transmission-compatible error code, `0` when healthy.
    pub error: i32,
    /// Human readable error message.
    pub error_string: String,
    /// Wanted bytes still missing.
    pub left_until_done: i64,
    /// Total wanted bytes once complete.
    pub size_when_done: i64,
    /// User-assigned labels.
    pub labels: Vec<String>,
    /// Bandwidth priority (`-1` low, `0` normal, `1` high).
    pub bandwidth_priority: i32,
    /// Engine-side revision counter, bumped on every change.
    pub revision: u64,
}

/// Session-wide aggregate counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    /// Aggregate download rate in bytes per second.
    #[serde(rename = "downloadSpeed")]
    pub download_rate: u64,
    /// Aggregate upload rate in bytes per second.
    #[serde(rename = "uploadSpeed")]
    pub upload_rate: u64,
    /// Number of torrents in the session.
    pub torrent_count: u64,
    /// Number of torrents currently transferring.
    pub active_torrent_count: u64,
    /// Number of paused torrents.
    pub paused_torrent_count: u64,
    /// Nodes in the DHT routing table.
    pub dht_nodes: u64,
}

/// Immutable snapshot of the whole session, shared behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Aggregate counters.
    pub session: SessionStats,
    /// Torrents in engine order.
    pub torrents: Vec<TorrentSnapshot>,
}

impl SessionSnapshot {
    /// Build a snapshot from aggregate counters and torrent records.
    #[must_use]
    pub const fn new(session: SessionStats, torrents: Vec<TorrentSnapshot>) -> Self {
        Self { session, torrents }
    }

    /// Look up a torrent by id.
    #[must_use]
    pub fn torrent(&self, id: TorrentId) -> Option<&TorrentSnapshot> {
        self.torrents.iter().find(|torrent| torrent.id == id)
    }
}
