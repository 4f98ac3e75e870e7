//! Protocol constants and tuning parameters.

use std::time::Duration;

/// Client ID prefix for peer ID generation (Azureus-style).
pub const CLIENT_PREFIX: &[u8] = b"-PN0001-";

/// Port reported to the tracker. We never listen; leech only.
pub const ANNOUNCE_PORT: u16 = 6881;

/// Block size used for piece requests (16 KiB, the de-facto standard).
pub const BLOCK_SIZE: u32 = 16 * 1024;

/// Upper bound on a single wire frame. The largest legitimate frame is a
/// block plus its nine-byte header; anything bigger is a protocol violation.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Deadline for establishing a TCP connection plus handshake.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(10);

/// Soft timeout for reading one frame off a peer socket.
pub const READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Soft timeout for writing one frame to a peer socket.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(15);

/// How long to wait for the peer's bitfield before deciding it has none.
pub const BITFIELD_TIMEOUT: Duration = Duration::from_secs(5);

/// How long to wait for an Unchoke after sending Interested.
pub const UNCHOKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Absolute deadline for one piece download attempt.
pub const PIECE_TIMEOUT: Duration = Duration::from_secs(45);

/// Deadline for acquiring a session from the peer pool.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause before re-dialing once a peer has failed.
pub const REDIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Number of concurrent download workers.
pub const DOWNLOAD_WORKERS: usize = 5;

/// Capacity of a session's outbound message channel.
pub const SEND_QUEUE_LEN: usize = 16;

/// Consecutive pool-acquire failures per worker before the download is
/// declared dead.
pub const MAX_ACQUIRE_STRIKES: u32 = 3;
