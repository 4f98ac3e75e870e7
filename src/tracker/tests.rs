use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use super::response::{dedup_peers, parse_compact_peers};

fn addr(a: u8, b: u8, c: u8, d: u8, port: u16) -> SocketAddr {
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(a, b, c, d)), port)
}

#[test]
fn test_parse_compact_peers() {
    let blob = [
        192, 168, 1, 1, 0x1A, 0xE1, // 192.168.1.1:6881
        10, 0, 0, 2, 0x1A, 0xE2, // 10.0.0.2:6882
    ];
    assert_eq!(
        parse_compact_peers(&blob),
        vec![addr(192, 168, 1, 1, 6881), addr(10, 0, 0, 2, 6882)]
    );
}

#[test]
fn test_parse_compact_peers_ignores_partial_tail() {
    let blob = [192, 168, 1, 1, 0x1A, 0xE1, 10, 0];
    assert_eq!(parse_compact_peers(&blob), vec![addr(192, 168, 1, 1, 6881)]);
}

#[test]
fn test_dedup_preserves_first_seen_order() {
    let peers = vec![
        addr(1, 1, 1, 1, 1),
        addr(2, 2, 2, 2, 2),
        addr(1, 1, 1, 1, 1),
        addr(3, 3, 3, 3, 3),
    ];
    assert_eq!(
        dedup_peers(peers),
        vec![addr(1, 1, 1, 1, 1), addr(2, 2, 2, 2, 2), addr(3, 3, 3, 3, 3)]
    );
}

#[test]
fn test_parse_announce_response() {
    let mut body = Vec::new();
    body.extend_from_slice(b"d8:intervali1800e5:peers6:");
    body.extend_from_slice(&[127, 0, 0, 1, 0x1A, 0xE1]);
    body.push(b'e');

    let spec = super::http::parse_announce_response(&body).unwrap();
    assert_eq!(spec.interval, 1800);
    assert_eq!(spec.peers, vec![addr(127, 0, 0, 1, 6881)]);
}

#[test]
fn test_parse_announce_failure_reason() {
    let body = b"d14:failure reason9:not founde";
    assert!(matches!(
        super::http::parse_announce_response(body),
        Err(super::TrackerError::Failure(_))
    ));
}
