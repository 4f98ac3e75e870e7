use thiserror::Error;

/// Errors that can occur while decoding bencode.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BencodeError {
    /// Input ended before a complete value was parsed.
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// Integer is malformed: empty, `-0`, leading zeros, or out of the
    /// `i64` range.
    #[error("bad integer: {0}")]
    BadInteger(String),

    /// Any other grammar violation, with a short description of the rule
    /// that was broken.
    #[error("malformed bencode: {0}")]
    Malformed(&'static str),

    /// Extra bytes after the value in a whole-input decode.
    #[error("trailing data after value")]
    TrailingData,

    /// Recursion limit exceeded; guards against stack overflow from
    /// hostile input.
    #[error("nesting too deep")]
    NestingTooDeep,
}
