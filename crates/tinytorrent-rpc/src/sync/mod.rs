//! WebSocket push channel: client registry, snapshot diffing and fan-out.

pub(crate) mod diff;
pub(crate) mod feed;
pub(crate) mod live;
pub(crate) mod registry;
pub(crate) mod wire;
