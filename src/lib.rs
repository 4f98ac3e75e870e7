//! pincer - a BitTorrent leecher
//!
//! Given a metainfo file, pincer asks the tracker for peers, establishes
//! wire-protocol sessions with several of them concurrently, requests every
//! piece in 16 KiB blocks, verifies each piece against its SHA-1 digest,
//! and assembles the payload in index order.
//!
//! # Modules
//!
//! - [`bencode`] - the container format (BEP-3)
//! - [`metainfo`] - torrent descriptors and the info hash
//! - [`tracker`] - HTTP announce, compact peer lists
//! - [`peer`] - framing, handshake, and the per-connection session
//! - [`download`] - block planning, the peer pool, and the coordinator

pub mod bencode;
pub mod constants;
pub mod download;
pub mod metainfo;
pub mod peer;
pub mod tracker;

pub use bencode::{decode, encode, BencodeError, Value};
pub use download::{BlockPlan, DownloadError, Downloader, PeerPool, Piece};
pub use metainfo::{InfoHash, MetainfoError, Torrent};
pub use peer::{Bitfield, Handshake, Message, MessageId, PeerError, PeerId, Session, SessionState};
pub use tracker::{PeerSpec, TrackerError};
