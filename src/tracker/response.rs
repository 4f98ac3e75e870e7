use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// A tracker's answer: the peer endpoints and the re-announce interval.
#[derive(Debug, Clone)]
pub struct PeerSpec {
    /// Peer endpoints, first-seen order, duplicates removed.
    pub peers: Vec<SocketAddr>,
    /// Seconds the tracker asks us to wait before re-announcing.
    pub interval: u32,
}

/// Parses the compact peer encoding: 6 bytes per peer, 4 of IPv4 address
/// followed by a big-endian port. A trailing partial chunk is ignored.
pub fn parse_compact_peers(data: &[u8]) -> Vec<SocketAddr> {
    data.chunks_exact(6)
        .map(|chunk| {
            let ip = Ipv4Addr::new(chunk[0], chunk[1], chunk[2], chunk[3]);
            let port = u16::from_be_bytes([chunk[4], chunk[5]]);
            SocketAddr::new(IpAddr::V4(ip), port)
        })
        .collect()
}

/// Removes duplicate endpoints while preserving first-seen order.
pub fn dedup_peers(peers: Vec<SocketAddr>) -> Vec<SocketAddr> {
    let mut seen = std::collections::HashSet::new();
    peers.into_iter().filter(|p| seen.insert(*p)).collect()
}
