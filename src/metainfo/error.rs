use thiserror::Error;

/// Errors that can occur while loading a metainfo file.
#[derive(Debug, Error)]
pub enum MetainfoError {
    /// The file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid bencode.
    #[error("bencode error: {0}")]
    Bencode(#[from] crate::bencode::BencodeError),

    /// A required field is absent.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but has the wrong type or shape.
    #[error("invalid field: {0}")]
    InvalidField(&'static str),

    /// The digest list does not cover the payload.
    #[error("piece count mismatch: {hashes} hashes for {expected} pieces")]
    PieceCountMismatch { hashes: usize, expected: usize },
}
