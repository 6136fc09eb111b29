#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Engine-agnostic snapshot model and the collaborator traits consumed by the
//! RPC control plane.
//!
//! Layout: `model` (torrent/session snapshots), `service` (`SnapshotSource`,
//! `RpcDispatcher`, `SnapshotCell`), `error`.

pub mod error;
pub mod model;
pub mod service;

pub use error::{TorrentCoreError, TorrentCoreResult};
pub use model::{SessionSnapshot, SessionStats, TorrentId, TorrentSnapshot, TorrentState};
pub use service::{DispatchCompletion, RpcDispatcher, SnapshotCell, SnapshotSource};
