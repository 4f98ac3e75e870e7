use bytes::Bytes;
use sha1::{Digest, Sha1};
use tokio::time::timeout;
use tracing::{debug, trace};

use crate::constants::{BITFIELD_TIMEOUT, PIECE_TIMEOUT, UNCHOKE_TIMEOUT};
use crate::peer::{Message, MessageId, PeerError, Session, SessionState};

use super::error::DownloadError;
use super::plan::BlockPlan;

/// A downloaded and digest-verified piece.
#[derive(Debug, Clone)]
pub struct Piece {
    /// Piece index within the torrent.
    pub index: u32,
    /// The assembled payload bytes.
    pub data: Bytes,
    /// SHA-1 of `data`; equals the metainfo digest for this index.
    pub hash: [u8; 20],
}

/// Downloads one piece over an established session.
///
/// Drives the session through interested → unchoke → request → piece,
/// assembles the blocks in offset order, and verifies the digest. The whole
/// attempt runs under one absolute deadline; on expiry the session is left
/// in whatever state it reached so the caller can retry elsewhere.
pub async fn download_piece(session: &Session, plan: &BlockPlan) -> Result<Piece, DownloadError> {
    match timeout(PIECE_TIMEOUT, attempt(session, plan)).await {
        Ok(result) => result,
        Err(_) => Err(DownloadError::DownloadTimeout {
            piece: plan.piece_index,
        }),
    }
}

async fn attempt(session: &Session, plan: &BlockPlan) -> Result<Piece, DownloadError> {
    if !session.bitfield_received() {
        // Most peers lead with a bitfield; give a silent peer a moment
        // before trusting the empty default.
        let _ = session.wait_for(MessageId::Bitfield, BITFIELD_TIMEOUT).await;
    }
    if !session.has_piece(plan.piece_index as usize) {
        return Err(DownloadError::PieceUnavailable {
            piece: plan.piece_index,
        });
    }

    // Subscribe before requesting so no block can slip past the hook.
    let mut blocks = session.subscribe(MessageId::Piece, plan.num_blocks as usize);

    ensure_unchoked(session).await?;

    for i in 0..plan.num_blocks {
        session
            .send_request(plan.piece_index, plan.block_offset(i), plan.block_size_for(i))
            .await?;
    }
    trace!(
        piece = plan.piece_index,
        blocks = plan.num_blocks,
        "requests pipelined"
    );

    let mut slots: Vec<Option<Bytes>> = vec![None; plan.num_blocks as usize];
    let mut filled = 0usize;
    while filled < slots.len() {
        let Some(Message::Piece { index, begin, data }) = blocks.recv().await else {
            return Err(DownloadError::Incomplete {
                piece: plan.piece_index,
            });
        };
        if index != plan.piece_index || begin % plan.block_size != 0 {
            trace!(piece = plan.piece_index, index, begin, "stray block ignored");
            continue;
        }
        let slot = (begin / plan.block_size) as usize;
        if slot >= slots.len() {
            continue;
        }
        if slots[slot].replace(data).is_none() {
            filled += 1;
        }
    }

    let mut data = Vec::with_capacity(plan.piece_length as usize);
    for slot in &slots {
        match slot {
            Some(block) => data.extend_from_slice(block),
            None => {
                return Err(DownloadError::Incomplete {
                    piece: plan.piece_index,
                })
            }
        }
    }

    let mut hasher = Sha1::new();
    hasher.update(&data);
    let digest: [u8; 20] = hasher.finalize().into();
    if digest != plan.hash {
        return Err(DownloadError::HashMismatch {
            piece: plan.piece_index,
        });
    }

    // The piece is already verified; a failed Have is the peer's loss.
    if let Err(err) = session.send_have(plan.piece_index).await {
        debug!(piece = plan.piece_index, %err, "could not announce have");
    }
    session.set_piece(plan.piece_index as usize);

    Ok(Piece {
        index: plan.piece_index,
        data: data.into(),
        hash: digest,
    })
}

// Send Interested once and wait for Unchoke under a deadline, retrying the
// Interested a single time before giving up.
async fn ensure_unchoked(session: &Session) -> Result<(), DownloadError> {
    let mut unchoke = session.subscribe(MessageId::Unchoke, 1);
    session.send_interested().await?;

    for retry in [true, false] {
        if session.state() == SessionState::Unchoked {
            return Ok(());
        }
        match timeout(UNCHOKE_TIMEOUT, unchoke.recv()).await {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => return Err(PeerError::ConnectionClosed.into()),
            Err(_) if retry => session.send_interested().await?,
            Err(_) => break,
        }
    }

    Err(PeerError::Timeout.into())
}
