//! Error types for engine-facing data.

use thiserror::Error;

/// Errors raised while interpreting engine-reported values.
#[derive(Debug, Error)]
pub enum TorrentCoreError {
    /// The engine reported a state label that is not recognised.
    #[error("unknown torrent state")]
    UnknownState {
        /// Label supplied by the engine.
        value: String,
    },
}

/// Convenience alias for results carrying [`TorrentCoreError`].
pub type TorrentCoreResult<T> = Result<T, TorrentCoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_state_display_is_constant() {
        let err = TorrentCoreError::UnknownState {
            value: "bogus".into(),
        };
        assert_eq!(err.to_string(), "unknown torrent state");
    }
}
