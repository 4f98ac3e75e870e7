//! Torrent metainfo parsing.
//!
//! Loads a `.torrent` file, derives the info hash from the raw bytes of the
//! `info` dictionary, and exposes the piece list and length arithmetic the
//! downloader plans against.

mod error;
mod info_hash;
mod torrent;

pub use error::MetainfoError;
pub use info_hash::InfoHash;
pub use torrent::{FileSpec, Torrent};

#[cfg(test)]
mod tests;
