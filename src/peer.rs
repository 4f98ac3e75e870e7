//! Peer wire protocol.
//!
//! Message framing, the 68-byte handshake, and the per-connection session:
//! a reader task and a writer task around a TCP stream, a choke-gated send
//! queue, and per-tag receive hooks that downloaders subscribe to.

mod bitfield;
mod error;
mod handshake;
mod message;
mod peer_id;
mod session;
mod transport;

pub use bitfield::Bitfield;
pub use error::PeerError;
pub use handshake::Handshake;
pub use message::{Message, MessageId};
pub use peer_id::PeerId;
pub use session::{Session, SessionState, TagSubscription};
pub use transport::{FrameReader, FrameWriter};
