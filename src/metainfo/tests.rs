use std::collections::BTreeMap;

use bytes::Bytes;
use sha1::{Digest, Sha1};

use crate::bencode::{encode, Value};

use super::*;

fn sample_torrent_bytes(piece_length: i64, total: i64, piece_count: usize) -> Vec<u8> {
    let mut pieces = Vec::new();
    for i in 0..piece_count {
        pieces.extend_from_slice(&[i as u8; 20]);
    }

    let mut info = BTreeMap::new();
    info.insert(Bytes::from_static(b"name"), Value::string("sample.txt"));
    info.insert(Bytes::from_static(b"length"), Value::Integer(total));
    info.insert(
        Bytes::from_static(b"piece length"),
        Value::Integer(piece_length),
    );
    info.insert(Bytes::from_static(b"pieces"), Value::Bytes(pieces.into()));

    let mut root = BTreeMap::new();
    root.insert(
        Bytes::from_static(b"announce"),
        Value::string("http://tracker.example.com/announce"),
    );
    root.insert(Bytes::from_static(b"info"), Value::Dict(info));

    encode(&Value::Dict(root))
}

#[test]
fn test_parse_single_file() {
    let data = sample_torrent_bytes(262144, 92063, 1);
    let torrent = Torrent::from_bytes(&data).unwrap();

    assert_eq!(torrent.announce, "http://tracker.example.com/announce");
    assert_eq!(torrent.name, "sample.txt");
    assert_eq!(torrent.piece_length, 262144);
    assert_eq!(torrent.total_length, 92063);
    assert_eq!(torrent.piece_count(), 1);
    assert_eq!(torrent.files.len(), 1);
    assert_eq!(torrent.files[0].length, 92063);
}

#[test]
fn test_info_hash_matches_canonical_encoding() {
    let data = sample_torrent_bytes(16384, 16384, 1);
    let torrent = Torrent::from_bytes(&data).unwrap();

    // The sample is canonical, so hashing the span and hashing a re-encode
    // must agree.
    let root = crate::bencode::decode(&data).unwrap();
    let reencoded = encode(root.get(b"info").unwrap());
    let mut hasher = Sha1::new();
    hasher.update(&reencoded);
    let expected: [u8; 20] = hasher.finalize().into();

    assert_eq!(torrent.info_hash.as_bytes(), &expected);
}

#[test]
fn test_info_hash_uses_raw_span_for_non_canonical_input() {
    // The info dictionary below carries its keys out of sorted order, so a
    // canonical re-encode would produce different bytes. The hash must be
    // over the bytes as they appear in the file.
    let digest = [7u8; 20];
    let mut info = Vec::new();
    info.extend_from_slice(b"d6:pieces20:");
    info.extend_from_slice(&digest);
    info.extend_from_slice(b"4:name1:x12:piece lengthi16384e6:lengthi16384ee");

    let mut data = Vec::new();
    data.extend_from_slice(b"d8:announce10:http://t/a4:info");
    data.extend_from_slice(&info);
    data.push(b'e');

    let torrent = Torrent::from_bytes(&data).unwrap();

    let mut hasher = Sha1::new();
    hasher.update(&info);
    let expected: [u8; 20] = hasher.finalize().into();
    assert_eq!(torrent.info_hash.as_bytes(), &expected);
}

#[test]
fn test_piece_size_terminal_residue() {
    let data = sample_torrent_bytes(262144, 92063, 1);
    let torrent = Torrent::from_bytes(&data).unwrap();
    assert_eq!(torrent.piece_size(0), 92063);
}

#[test]
fn test_piece_size_even_division() {
    // 3 pieces of exactly 16 KiB: the last piece has no residue and is
    // full-sized.
    let data = sample_torrent_bytes(16384, 3 * 16384, 3);
    let torrent = Torrent::from_bytes(&data).unwrap();
    assert_eq!(torrent.piece_size(0), 16384);
    assert_eq!(torrent.piece_size(1), 16384);
    assert_eq!(torrent.piece_size(2), 16384);
}

#[test]
fn test_piece_count_mismatch_rejected() {
    // Two digests for a payload that needs one piece.
    let data = sample_torrent_bytes(262144, 92063, 2);
    assert!(matches!(
        Torrent::from_bytes(&data),
        Err(MetainfoError::PieceCountMismatch { .. })
    ));
}

#[test]
fn test_missing_announce_rejected() {
    let mut info = BTreeMap::new();
    info.insert(Bytes::from_static(b"name"), Value::string("x"));
    info.insert(Bytes::from_static(b"length"), Value::Integer(1));
    info.insert(Bytes::from_static(b"piece length"), Value::Integer(16384));
    info.insert(
        Bytes::from_static(b"pieces"),
        Value::Bytes(Bytes::from_static(&[0u8; 20])),
    );
    let mut root = BTreeMap::new();
    root.insert(Bytes::from_static(b"info"), Value::Dict(info));

    let data = encode(&Value::Dict(root));
    assert!(matches!(
        Torrent::from_bytes(&data),
        Err(MetainfoError::MissingField("announce"))
    ));
}

#[test]
fn test_trackers_order_and_dedup() {
    let mut torrent =
        Torrent::from_bytes(&sample_torrent_bytes(16384, 16384, 1)).unwrap();
    torrent.announce_list = vec![
        vec![
            "http://tracker.example.com/announce".into(),
            "http://backup.example.com/announce".into(),
        ],
        vec!["udp://third.example.com/announce".into()],
    ];

    assert_eq!(
        torrent.trackers(),
        vec![
            "http://tracker.example.com/announce".to_string(),
            "http://backup.example.com/announce".to_string(),
            "udp://third.example.com/announce".to_string(),
        ]
    );
}

#[test]
fn test_from_file() {
    use std::io::Write;

    let data = sample_torrent_bytes(16384, 16384, 1);
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&data).unwrap();

    let torrent = Torrent::from_file(file.path()).unwrap();
    assert_eq!(torrent.name, "sample.txt");
    assert_eq!(torrent.piece_count(), 1);
}

#[test]
fn test_parse_multi_file() {
    let mut info = BTreeMap::new();
    info.insert(Bytes::from_static(b"name"), Value::string("album"));
    info.insert(Bytes::from_static(b"piece length"), Value::Integer(16384));
    info.insert(
        Bytes::from_static(b"pieces"),
        Value::Bytes(Bytes::copy_from_slice(&[0u8; 20])),
    );

    let file_entry = |len: i64, name: &str| {
        let mut d = BTreeMap::new();
        d.insert(Bytes::from_static(b"length"), Value::Integer(len));
        d.insert(
            Bytes::from_static(b"path"),
            Value::List(vec![Value::string("cd1"), Value::string(name)]),
        );
        Value::Dict(d)
    };
    info.insert(
        Bytes::from_static(b"files"),
        Value::List(vec![file_entry(6000, "a.mp3"), file_entry(6000, "b.mp3")]),
    );

    let mut root = BTreeMap::new();
    root.insert(Bytes::from_static(b"announce"), Value::string("http://t/a"));
    root.insert(Bytes::from_static(b"info"), Value::Dict(info));

    let torrent = Torrent::from_bytes(&encode(&Value::Dict(root))).unwrap();
    assert_eq!(torrent.total_length, 12000);
    assert_eq!(torrent.files.len(), 2);
    assert_eq!(torrent.files[0].path, vec!["cd1", "a.mp3"]);
    assert_eq!(torrent.piece_count(), 1);
}

#[test]
fn test_ragged_pieces_rejected() {
    let mut data = sample_torrent_bytes(16384, 16384, 1);
    // Grow the pieces string by one byte: 20 -> 21, no longer a multiple
    // of 20.
    let needle = b"6:pieces20:";
    let at = data
        .windows(needle.len())
        .position(|w| w == needle)
        .unwrap();
    let _: Vec<u8> = data
        .splice(at..at + needle.len(), b"6:pieces21:".iter().copied())
        .collect();
    data.insert(at + b"6:pieces21:".len(), 0);

    assert!(matches!(
        Torrent::from_bytes(&data),
        Err(MetainfoError::InvalidField("pieces"))
    ));
}

#[test]
fn test_info_hash_hex_rendering() {
    let hash = InfoHash::from_bytes([0xab; 20]);
    assert_eq!(hash.to_hex(), "ab".repeat(20));
    assert_eq!(hash.url_encode(), "%ab".repeat(20));
}
