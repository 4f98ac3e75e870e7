use thiserror::Error;

use crate::peer::PeerError;

/// Errors that can occur while downloading.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// The session failed underneath the download.
    #[error("peer error: {0}")]
    Peer(#[from] PeerError),

    /// The peer's bitfield does not cover the requested piece.
    #[error("piece {piece} unavailable from peer")]
    PieceUnavailable { piece: u32 },

    /// The block stream ended with a slot still empty.
    #[error("piece {piece} incomplete")]
    Incomplete { piece: u32 },

    /// The assembled piece does not match its expected digest.
    #[error("piece {piece} failed hash verification")]
    HashMismatch { piece: u32 },

    /// The per-attempt deadline expired.
    #[error("piece {piece} download timed out")]
    DownloadTimeout { piece: u32 },

    /// No session could be acquired before the deadline.
    #[error("peer pool exhausted")]
    PoolExhausted,

    /// Writing to the output sink failed.
    #[error("sink error: {0}")]
    Sink(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether the session that produced this error should be destroyed.
    ///
    /// Integrity and semantic failures leave the session usable; anything
    /// that came up from the wire does not.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, DownloadError::Peer(_))
    }
}
