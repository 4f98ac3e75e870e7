use thiserror::Error;

/// Errors that can occur while talking to a tracker.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// The announce URL is not an HTTP(S) URL.
    #[error("invalid tracker url: {0}")]
    InvalidUrl(String),

    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body is not the expected bencode shape.
    #[error("invalid tracker response: {0}")]
    InvalidResponse(String),

    /// The tracker answered with a `failure reason`.
    #[error("tracker failure: {0}")]
    Failure(String),

    /// Every announce URL was tried and none produced peers.
    #[error("no tracker produced a peer list")]
    AllTrackersFailed,
}
