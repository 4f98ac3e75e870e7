use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::metainfo::InfoHash;

use super::error::PeerError;
use super::peer_id::PeerId;

/// The BitTorrent protocol identifier.
pub const PROTOCOL: &[u8] = b"BitTorrent protocol";
/// Length of the handshake message in bytes.
pub const HANDSHAKE_LEN: usize = 68;

/// The 68-byte handshake that ties a connection to a torrent.
///
/// Layout: a length byte of 19, the protocol literal, 8 reserved bytes,
/// the 20-byte info hash, and the sender's 20-byte peer ID. We send zeroed
/// reserved bytes and never gate acceptance on the peer's.
#[derive(Debug, Clone)]
pub struct Handshake {
    /// The torrent's identity.
    pub info_hash: InfoHash,
    /// The sender's peer ID.
    pub peer_id: PeerId,
    /// Reserved bytes; extension flags we neither set nor honor.
    pub reserved: [u8; 8],
}

impl Handshake {
    /// Creates an outgoing handshake with zeroed reserved bytes.
    pub fn new(info_hash: InfoHash, peer_id: PeerId) -> Self {
        Self {
            info_hash,
            peer_id,
            reserved: [0u8; 8],
        }
    }

    /// Encodes the handshake for transmission.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HANDSHAKE_LEN);
        buf.put_u8(PROTOCOL.len() as u8);
        buf.put_slice(PROTOCOL);
        buf.put_slice(&self.reserved);
        buf.put_slice(self.info_hash.as_bytes());
        buf.put_slice(self.peer_id.as_bytes());
        buf.freeze()
    }

    /// Decodes a received handshake.
    ///
    /// Rejects a wrong length byte or protocol literal; the reserved bytes
    /// are carried through untouched.
    pub fn decode(data: &[u8]) -> Result<Self, PeerError> {
        if data.len() < HANDSHAKE_LEN {
            return Err(PeerError::HandshakeRejected);
        }
        if data[0] as usize != PROTOCOL.len() || &data[1..20] != PROTOCOL {
            return Err(PeerError::HandshakeRejected);
        }

        let mut reserved = [0u8; 8];
        reserved.copy_from_slice(&data[20..28]);

        let mut info_hash = [0u8; 20];
        info_hash.copy_from_slice(&data[28..48]);

        let mut peer_id = [0u8; 20];
        peer_id.copy_from_slice(&data[48..68]);

        Ok(Self {
            info_hash: InfoHash::from_bytes(info_hash),
            peer_id: PeerId::from_bytes(peer_id),
            reserved,
        })
    }

    /// Performs the handshake exchange on a fresh connection: send ours,
    /// read theirs, and reject the session if the info hashes differ.
    pub async fn exchange(
        stream: &mut TcpStream,
        info_hash: InfoHash,
        our_id: PeerId,
    ) -> Result<Handshake, PeerError> {
        let ours = Handshake::new(info_hash, our_id);
        stream.write_all(&ours.encode()).await?;

        let mut buf = [0u8; HANDSHAKE_LEN];
        stream.read_exact(&mut buf).await?;

        let theirs = Handshake::decode(&buf)?;
        if theirs.info_hash != info_hash {
            return Err(PeerError::HandshakeRejected);
        }

        Ok(theirs)
    }
}
