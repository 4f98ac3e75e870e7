use thiserror::Error;

use super::session::SessionState;

/// Errors that can occur during peer communication.
#[derive(Debug, Error)]
pub enum PeerError {
    /// Network I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The handshake did not match: bad length byte, bad protocol literal,
    /// or a foreign info hash.
    #[error("handshake rejected")]
    HandshakeRejected,

    /// A frame declared a length beyond the safety cap.
    #[error("bad frame: declared length {0}")]
    BadFrame(usize),

    /// A frame's payload is shorter than its tag requires.
    #[error("truncated frame: {0}")]
    Truncated(&'static str),

    /// A non-zero tag outside the protocol's tag set.
    #[error("unknown message tag: {0}")]
    UnknownTag(u8),

    /// The connection was closed by the peer.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation timed out.
    #[error("timeout")]
    Timeout,

    /// A send or wait was attempted on a session that is no longer usable.
    #[error("session is {0:?}")]
    SessionInvalid(SessionState),
}
