use std::ops::Range;
use std::path::Path;

use crate::bencode::{decode, decode_prefix, Value};

use super::error::MetainfoError;
use super::info_hash::InfoHash;

/// A parsed torrent file.
#[derive(Debug, Clone)]
pub struct Torrent {
    /// Primary tracker URL.
    pub announce: String,
    /// Backup tracker tiers (BEP-12), tried in order after `announce`.
    pub announce_list: Vec<Vec<String>>,
    /// Suggested name for the file or directory.
    pub name: String,
    /// Number of bytes per piece (the last piece may be shorter).
    pub piece_length: u64,
    /// SHA-1 digest of each piece.
    pub piece_hashes: Vec<[u8; 20]>,
    /// Total payload size across all files.
    pub total_length: u64,
    /// Files in the torrent; a single entry for single-file torrents.
    pub files: Vec<FileSpec>,
    /// SHA-1 of the raw `info` dictionary bytes.
    pub info_hash: InfoHash,
}

/// A file within a torrent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Size of the file in bytes.
    pub length: u64,
    /// Path components relative to the torrent root.
    pub path: Vec<String>,
}

impl Torrent {
    /// Reads and parses a metainfo file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MetainfoError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Parses a metainfo file from raw bytes.
    ///
    /// The info hash is taken over the original byte span of the `info`
    /// value, not a re-encoding, so torrents produced with non-canonical
    /// bencode still hash to the identity their producer computed.
    pub fn from_bytes(data: &[u8]) -> Result<Self, MetainfoError> {
        let root = decode(data)?;
        let dict = root.as_dict().ok_or(MetainfoError::InvalidField("root"))?;

        let info_span = raw_info_span(data)?;
        let info_hash = InfoHash::from_info_bytes(&data[info_span]);

        let announce = dict
            .get(b"announce".as_slice())
            .and_then(|v| v.as_str())
            .ok_or(MetainfoError::MissingField("announce"))?
            .to_string();

        let announce_list = dict
            .get(b"announce-list".as_slice())
            .and_then(|v| v.as_list())
            .map(|tiers| {
                tiers
                    .iter()
                    .filter_map(|tier| {
                        tier.as_list().map(|urls| {
                            urls.iter()
                                .filter_map(|u| u.as_str().map(String::from))
                                .collect()
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let info = dict
            .get(b"info".as_slice())
            .ok_or(MetainfoError::MissingField("info"))?;

        let (name, piece_length, piece_hashes, files, total_length) = parse_info(info)?;

        let expected_pieces = total_length.div_ceil(piece_length) as usize;
        if piece_hashes.len() != expected_pieces {
            return Err(MetainfoError::PieceCountMismatch {
                hashes: piece_hashes.len(),
                expected: expected_pieces,
            });
        }

        Ok(Self {
            announce,
            announce_list,
            name,
            piece_length,
            piece_hashes,
            total_length,
            files,
            info_hash,
        })
    }

    /// Number of pieces in the payload.
    pub fn piece_count(&self) -> usize {
        self.piece_hashes.len()
    }

    /// Actual length of the piece at `index`.
    ///
    /// Every piece is `piece_length` bytes except possibly the last, which
    /// carries the residue of the total length. An evenly divided payload
    /// has no residue and the last piece is full-sized.
    pub fn piece_size(&self, index: usize) -> u64 {
        if index + 1 < self.piece_count() {
            return self.piece_length;
        }
        match self.total_length % self.piece_length {
            0 => self.piece_length,
            residue => residue,
        }
    }

    /// All tracker URLs in announce order: `announce` first, then each tier
    /// of `announce-list`, duplicates removed.
    pub fn trackers(&self) -> Vec<String> {
        let mut urls = vec![self.announce.clone()];
        for tier in &self.announce_list {
            for url in tier {
                if !urls.contains(url) {
                    urls.push(url.clone());
                }
            }
        }
        urls
    }
}

// Walks the top-level dictionary entry by entry, returning the byte range of
// the `info` value as it appears in the file.
fn raw_info_span(data: &[u8]) -> Result<Range<usize>, MetainfoError> {
    if data.first() != Some(&b'd') {
        return Err(MetainfoError::InvalidField("root"));
    }

    let mut pos = 1;
    while pos < data.len() && data[pos] != b'e' {
        let (key, consumed) = decode_prefix(&data[pos..])?;
        pos += consumed;

        let start = pos;
        let (_, consumed) = decode_prefix(&data[pos..])?;
        pos += consumed;

        if key.as_bytes().map(|b| b.as_ref()) == Some(b"info".as_slice()) {
            return Ok(start..pos);
        }
    }

    Err(MetainfoError::MissingField("info"))
}

type InfoFields = (String, u64, Vec<[u8; 20]>, Vec<FileSpec>, u64);

fn parse_info(info: &Value) -> Result<InfoFields, MetainfoError> {
    let dict = info.as_dict().ok_or(MetainfoError::InvalidField("info"))?;

    let name = dict
        .get(b"name".as_slice())
        .and_then(|v| v.as_str())
        .ok_or(MetainfoError::MissingField("name"))?
        .to_string();

    let piece_length = dict
        .get(b"piece length".as_slice())
        .and_then(|v| v.as_integer())
        .filter(|&len| len > 0)
        .ok_or(MetainfoError::InvalidField("piece length"))? as u64;

    let pieces_bytes = dict
        .get(b"pieces".as_slice())
        .and_then(|v| v.as_bytes())
        .ok_or(MetainfoError::MissingField("pieces"))?;

    if pieces_bytes.len() % 20 != 0 {
        return Err(MetainfoError::InvalidField("pieces"));
    }

    let piece_hashes = pieces_bytes
        .chunks_exact(20)
        .map(|chunk| {
            let mut digest = [0u8; 20];
            digest.copy_from_slice(chunk);
            digest
        })
        .collect();

    let (files, total_length) =
        if let Some(length) = dict.get(b"length".as_slice()).and_then(|v| v.as_integer()) {
            let length = length as u64;
            let file = FileSpec {
                length,
                path: vec![name.clone()],
            };
            (vec![file], length)
        } else if let Some(entries) = dict.get(b"files".as_slice()).and_then(|v| v.as_list()) {
            let mut files = Vec::with_capacity(entries.len());
            let mut total = 0u64;

            for entry in entries {
                let length = entry
                    .get(b"length")
                    .and_then(|v| v.as_integer())
                    .ok_or(MetainfoError::MissingField("file length"))? as u64;

                let path: Vec<String> = entry
                    .get(b"path")
                    .and_then(|v| v.as_list())
                    .ok_or(MetainfoError::MissingField("file path"))?
                    .iter()
                    .filter_map(|p| p.as_str().map(String::from))
                    .collect();

                total += length;
                files.push(FileSpec { length, path });
            }

            (files, total)
        } else {
            return Err(MetainfoError::MissingField("length or files"));
        };

    Ok((name, piece_length, piece_hashes, files, total_length))
}
