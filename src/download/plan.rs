use crate::constants::BLOCK_SIZE;
use crate::metainfo::Torrent;

/// How one piece splits into request-sized blocks.
///
/// Every block is `block_size` bytes except the last, which carries the
/// residue when the piece does not divide evenly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockPlan {
    /// Which piece this plan covers.
    pub piece_index: u32,
    /// Actual length of the piece (the terminal piece may be short).
    pub piece_length: u32,
    /// Number of blocks to request.
    pub num_blocks: u32,
    /// Nominal block size.
    pub block_size: u32,
    /// Index of the final block.
    pub last_block_index: u32,
    /// Size of the final block.
    pub last_block_size: u32,
    /// Expected SHA-1 of the assembled piece.
    pub hash: [u8; 20],
}

impl BlockPlan {
    /// Builds the plan for one piece of a torrent.
    pub fn for_piece(torrent: &Torrent, index: usize, block_size: u32) -> Self {
        let piece_length = torrent.piece_size(index) as u32;
        let num_blocks = piece_length.div_ceil(block_size);
        let last_block_index = num_blocks - 1;
        let last_block_size = piece_length - last_block_index * block_size;

        Self {
            piece_index: index as u32,
            piece_length,
            num_blocks,
            block_size,
            last_block_index,
            last_block_size,
            hash: torrent.piece_hashes[index],
        }
    }

    /// Plans for every piece, in index order, at the standard block size.
    pub fn all_for(torrent: &Torrent) -> Vec<Self> {
        (0..torrent.piece_count())
            .map(|i| Self::for_piece(torrent, i, BLOCK_SIZE))
            .collect()
    }

    /// Size of the block at `index`.
    pub fn block_size_for(&self, index: u32) -> u32 {
        if index == self.last_block_index {
            self.last_block_size
        } else {
            self.block_size
        }
    }

    /// Byte offset of the block at `index` within the piece.
    pub fn block_offset(&self, index: u32) -> u32 {
        index * self.block_size
    }
}
