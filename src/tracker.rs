//! HTTP tracker client.
//!
//! Maps a torrent to a set of peer endpoints via the announce protocol:
//! a GET with the torrent identity and transfer counters, answered with a
//! bencoded dictionary carrying an interval and a compact peer list.

mod error;
mod http;
mod response;

pub use error::TrackerError;
pub use http::announce;
pub use response::PeerSpec;

#[cfg(test)]
mod tests;
