use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::constants::MAX_FRAME_LEN;

use super::error::PeerError;
use super::message::Message;

/// The receive half of a framed peer connection.
///
/// Owns the read side of the socket so the session's reader task is the
/// only consumer of inbound bytes.
pub struct FrameReader {
    half: OwnedReadHalf,
    buf: BytesMut,
}

impl FrameReader {
    pub fn new(half: OwnedReadHalf) -> Self {
        Self {
            half,
            buf: BytesMut::with_capacity(32 * 1024),
        }
    }

    /// Reads exactly one frame and decodes it.
    ///
    /// Fails with [`PeerError::BadFrame`] if the declared length exceeds the
    /// safety cap, before any payload is buffered.
    pub async fn read_message(&mut self) -> Result<Message, PeerError> {
        self.fill_to(4).await?;

        let declared =
            u32::from_be_bytes([self.buf[0], self.buf[1], self.buf[2], self.buf[3]]) as usize;
        if declared > MAX_FRAME_LEN {
            return Err(PeerError::BadFrame(declared));
        }

        self.fill_to(4 + declared).await?;
        let frame = self.buf.split_to(4 + declared).freeze();
        Message::decode(frame)
    }

    async fn fill_to(&mut self, len: usize) -> Result<(), PeerError> {
        while self.buf.len() < len {
            let n = self.half.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(PeerError::ConnectionClosed);
            }
        }
        Ok(())
    }
}

/// The send half of a framed peer connection.
pub struct FrameWriter {
    half: OwnedWriteHalf,
}

impl FrameWriter {
    pub fn new(half: OwnedWriteHalf) -> Self {
        Self { half }
    }

    /// Writes one complete frame.
    pub async fn write_message(&mut self, message: &Message) -> Result<(), PeerError> {
        self.half.write_all(&message.encode()).await?;
        Ok(())
    }
}
