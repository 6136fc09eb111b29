#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! HTTP/WebSocket control plane for the TinyTorrent engine.
//!
//! Layout: `server.rs` (public lifecycle), `event_loop.rs` (single-owner
//! runtime thread), `dispatch.rs` (request bridge to the engine
//! dispatcher), `http/` (routing, access control, RPC and upgrade
//! handlers), `sync/` (push clients, diffing and wire encoding).

mod dispatch;
mod error;
mod event_loop;
mod http;
mod server;
mod state;
mod sync;

pub use error::{RpcServerError, RpcServerResult};
pub use server::{ConnectionInfo, RpcServer};
pub use tinytorrent_config::{RpcServerConfig, ServerOptions, SyncTiming};
pub use tinytorrent_telemetry::{Metrics, MetricsSnapshot};
pub use tinytorrent_torrent_core::{DispatchCompletion, RpcDispatcher, SnapshotSource};
