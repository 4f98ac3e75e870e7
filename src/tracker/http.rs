use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};

use crate::bencode::decode;
use crate::constants::ANNOUNCE_PORT;
use crate::metainfo::Torrent;
use crate::peer::PeerId;

use super::error::TrackerError;
use super::response::{dedup_peers, parse_compact_peers, PeerSpec};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Announces to the torrent's trackers and returns the peer set.
///
/// Tracker URLs are tried in linear order, `announce` first and then each
/// `announce-list` tier; the first successful response wins. Non-HTTP URLs
/// (e.g. `udp://`) are skipped.
pub async fn announce(torrent: &Torrent, peer_id: &PeerId) -> Result<PeerSpec, TrackerError> {
    let client = Client::builder().timeout(HTTP_TIMEOUT).build()?;

    let mut last_err = TrackerError::AllTrackersFailed;
    for url in torrent.trackers() {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            debug!(%url, "skipping non-http tracker");
            continue;
        }

        match announce_once(&client, &url, torrent, peer_id).await {
            Ok(spec) => {
                debug!(%url, peers = spec.peers.len(), "tracker announce ok");
                return Ok(spec);
            }
            Err(err) => {
                warn!(%url, %err, "tracker announce failed");
                last_err = err;
            }
        }
    }

    Err(last_err)
}

async fn announce_once(
    client: &Client,
    url: &str,
    torrent: &Torrent,
    peer_id: &PeerId,
) -> Result<PeerSpec, TrackerError> {
    let query = format!(
        "{}?info_hash={}&peer_id={}&port={}&uploaded=0&downloaded=0&left={}&compact=1",
        url,
        torrent.info_hash.url_encode(),
        percent_encode(peer_id.as_bytes()),
        ANNOUNCE_PORT,
        torrent.total_length,
    );

    let body = client.get(&query).send().await?.bytes().await?;
    parse_announce_response(&body)
}

pub(super) fn parse_announce_response(body: &[u8]) -> Result<PeerSpec, TrackerError> {
    let value = decode(body)
        .map_err(|e| TrackerError::InvalidResponse(format!("bad bencode: {e}")))?;
    let dict = value
        .as_dict()
        .ok_or_else(|| TrackerError::InvalidResponse("expected dictionary".into()))?;

    if let Some(reason) = dict
        .get(b"failure reason".as_slice())
        .and_then(|v| v.as_str())
    {
        return Err(TrackerError::Failure(reason.to_string()));
    }

    let interval = dict
        .get(b"interval".as_slice())
        .and_then(|v| v.as_integer())
        .ok_or_else(|| TrackerError::InvalidResponse("missing interval".into()))? as u32;

    let peers = dict
        .get(b"peers".as_slice())
        .and_then(|v| v.as_bytes())
        .map(|blob| parse_compact_peers(blob))
        .ok_or_else(|| TrackerError::InvalidResponse("missing peers".into()))?;

    Ok(PeerSpec {
        peers: dedup_peers(peers),
        interval,
    })
}

fn percent_encode(bytes: &[u8]) -> String {
    bytes.iter().fold(String::new(), |mut s, &b| {
        use std::fmt::Write;
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~') {
            s.push(b as char);
        } else {
            let _ = write!(s, "%{b:02x}");
        }
        s
    })
}
