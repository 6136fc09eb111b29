#![forbid(unsafe_code)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Configuration for the TinyTorrent RPC control plane.
//!
//! Layout: `model.rs` (typed options and timing), `defaults.rs` (wire-visible
//! defaults), `validate.rs` (bind-URL parsing and validation), `loader.rs`
//! (environment loading).

pub mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use defaults::{LEGACY_TOKEN_HEADER, MAX_RPC_BODY_BYTES};
pub use error::{ConfigError, ConfigResult};
pub use model::{BasicCredentials, BindAddress, RpcServerConfig, ServerOptions, SyncTiming};
pub use validate::{is_header_token, parse_bind_url};
