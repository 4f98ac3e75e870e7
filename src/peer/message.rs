use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::error::PeerError;

/// Message type identifiers in the peer wire protocol.
///
/// Each message except KeepAlive carries a one-byte tag after the length
/// prefix; KeepAlive is the empty frame and has no tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    /// Stop sending data to the peer.
    Choke = 0,
    /// Ready to send data to the peer.
    Unchoke = 1,
    /// Want data from the peer.
    Interested = 2,
    /// Don't want data from the peer.
    NotInterested = 3,
    /// Announce a newly-acquired piece.
    Have = 4,
    /// Announce all available pieces.
    Bitfield = 5,
    /// Request a data block.
    Request = 6,
    /// Send block data.
    Piece = 7,
    /// Cancel a pending request.
    Cancel = 8,
}

impl TryFrom<u8> for MessageId {
    type Error = PeerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageId::Choke),
            1 => Ok(MessageId::Unchoke),
            2 => Ok(MessageId::Interested),
            3 => Ok(MessageId::NotInterested),
            4 => Ok(MessageId::Have),
            5 => Ok(MessageId::Bitfield),
            6 => Ok(MessageId::Request),
            7 => Ok(MessageId::Piece),
            8 => Ok(MessageId::Cancel),
            _ => Err(PeerError::UnknownTag(value)),
        }
    }
}

/// A peer wire protocol message.
///
/// Frames are length-prefixed: a 4-byte big-endian length, then a 1-byte tag
/// and payload. A zero length is a KeepAlive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Empty frame keeping the connection alive.
    KeepAlive,
    /// The peer will not answer requests.
    Choke,
    /// The peer will answer requests.
    Unchoke,
    /// We want the peer's data.
    Interested,
    /// We no longer want the peer's data.
    NotInterested,
    /// The sender now has a piece.
    Have { piece: u32 },
    /// All pieces the sender has, bit-packed.
    Bitfield(Bytes),
    /// Ask for a block of a piece.
    Request { index: u32, begin: u32, length: u32 },
    /// A block of piece data.
    Piece { index: u32, begin: u32, data: Bytes },
    /// Withdraw a pending request.
    Cancel { index: u32, begin: u32, length: u32 },
}

impl Message {
    /// The wire tag of this message, or `None` for KeepAlive.
    pub fn id(&self) -> Option<MessageId> {
        match self {
            Message::KeepAlive => None,
            Message::Choke => Some(MessageId::Choke),
            Message::Unchoke => Some(MessageId::Unchoke),
            Message::Interested => Some(MessageId::Interested),
            Message::NotInterested => Some(MessageId::NotInterested),
            Message::Have { .. } => Some(MessageId::Have),
            Message::Bitfield(_) => Some(MessageId::Bitfield),
            Message::Request { .. } => Some(MessageId::Request),
            Message::Piece { .. } => Some(MessageId::Piece),
            Message::Cancel { .. } => Some(MessageId::Cancel),
        }
    }

    /// Encodes the message for transmission, length prefix included.
    pub fn encode(&self) -> Bytes {
        let Some(id) = self.id() else {
            return Bytes::from_static(&[0, 0, 0, 0]); // KeepAlive
        };

        let mut payload = BytesMut::new();
        match self {
            Message::Have { piece } => payload.put_u32(*piece),
            Message::Bitfield(bits) => payload.put_slice(bits),
            Message::Request {
                index,
                begin,
                length,
            }
            | Message::Cancel {
                index,
                begin,
                length,
            } => {
                payload.put_u32(*index);
                payload.put_u32(*begin);
                payload.put_u32(*length);
            }
            Message::Piece { index, begin, data } => {
                payload.put_u32(*index);
                payload.put_u32(*begin);
                payload.put_slice(data);
            }
            _ => {}
        }

        let mut frame = BytesMut::with_capacity(5 + payload.len());
        frame.put_u32(1 + payload.len() as u32);
        frame.put_u8(id as u8);
        frame.extend_from_slice(&payload);
        frame.freeze()
    }

    /// Decodes one complete frame, length prefix included.
    pub fn decode(mut data: Bytes) -> Result<Self, PeerError> {
        if data.len() < 4 {
            return Err(PeerError::Truncated("length prefix"));
        }

        let length = data.get_u32() as usize;
        if length == 0 {
            return Ok(Message::KeepAlive);
        }
        if data.remaining() < length {
            return Err(PeerError::Truncated("payload"));
        }

        let id = MessageId::try_from(data.get_u8())?;

        // Fixed payload floor per tag; Bitfield and Piece carry a variable
        // tail on top of theirs.
        let (floor, name) = match id {
            MessageId::Choke
            | MessageId::Unchoke
            | MessageId::Interested
            | MessageId::NotInterested
            | MessageId::Bitfield => (0, ""),
            MessageId::Have => (4, "have"),
            MessageId::Request => (12, "request"),
            MessageId::Piece => (8, "piece"),
            MessageId::Cancel => (12, "cancel"),
        };
        if data.remaining() < floor {
            return Err(PeerError::Truncated(name));
        }

        let message = match id {
            MessageId::Choke => Message::Choke,
            MessageId::Unchoke => Message::Unchoke,
            MessageId::Interested => Message::Interested,
            MessageId::NotInterested => Message::NotInterested,
            MessageId::Have => Message::Have {
                piece: data.get_u32(),
            },
            MessageId::Bitfield => Message::Bitfield(data.copy_to_bytes(length - 1)),
            MessageId::Request => Message::Request {
                index: data.get_u32(),
                begin: data.get_u32(),
                length: data.get_u32(),
            },
            MessageId::Piece => Message::Piece {
                index: data.get_u32(),
                begin: data.get_u32(),
                data: data.copy_to_bytes(length - 9),
            },
            MessageId::Cancel => Message::Cancel {
                index: data.get_u32(),
                begin: data.get_u32(),
                length: data.get_u32(),
            },
        };

        Ok(message)
    }
}
