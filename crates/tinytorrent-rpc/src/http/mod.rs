//! HTTP surface: routing, access control, the RPC endpoint, the push
//! channel upgrade and the static web UI.

pub(crate) mod constants;
pub(crate) mod errors;
pub(crate) mod gatekeeper;
pub(crate) mod router;
pub(crate) mod rpc;
pub(crate) mod session;
pub(crate) mod ui;
pub(crate) mod ws;
