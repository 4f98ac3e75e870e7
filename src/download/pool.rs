use std::collections::VecDeque;
use std::net::SocketAddr;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::constants::REDIAL_BACKOFF;
use crate::metainfo::InfoHash;
use crate::peer::{PeerId, Session};

use super::error::DownloadError;

/// A bounded pool of handshaken peer sessions.
///
/// Sessions are constructed lazily: a peer address is popped from a strict
/// FIFO queue, dialed and handshaken under a deadline, and wrapped. A
/// destroyed session returns its address to the back of the queue so the
/// peer can be re-dialed later. Workers never touch raw sockets.
pub struct PeerPool {
    info_hash: InfoHash,
    our_id: PeerId,
    piece_count: usize,
    peers: Mutex<VecDeque<SocketAddr>>,
    idle: Mutex<Vec<Session>>,
    /// Signaled whenever a session or peer address becomes available.
    returned: Notify,
}

impl PeerPool {
    /// Creates a pool over a tracker peer set.
    pub fn new(
        peers: Vec<SocketAddr>,
        info_hash: InfoHash,
        our_id: PeerId,
        piece_count: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            info_hash,
            our_id,
            piece_count,
            peers: Mutex::new(peers.into()),
            idle: Mutex::new(Vec::new()),
            returned: Notify::new(),
        })
    }

    /// Acquires a session, waiting until the deadline for one to become
    /// available. Expiry while empty surfaces as
    /// [`DownloadError::PoolExhausted`].
    pub async fn acquire_within(
        self: &Arc<Self>,
        deadline: Duration,
    ) -> Result<SessionLease, DownloadError> {
        timeout(deadline, self.acquire())
            .await
            .map_err(|_| DownloadError::PoolExhausted)
    }

    /// Acquires a session, waiting indefinitely.
    pub async fn acquire(self: &Arc<Self>) -> SessionLease {
        loop {
            // Hand out an idle session first; stale ones retire their peer.
            loop {
                let Some(session) = self.idle.lock().pop() else {
                    break;
                };
                if session.is_valid() {
                    return self.lease(session);
                }
                self.retire(session);
            }

            let next_peer = self.peers.lock().pop_front();
            match next_peer {
                Some(addr) => {
                    match Session::connect(addr, self.info_hash, self.our_id, self.piece_count)
                        .await
                    {
                        Ok(session) => {
                            debug!(%addr, "session established");
                            return self.lease(session);
                        }
                        Err(err) => {
                            warn!(%addr, %err, "dial failed, requeueing peer");
                            self.peers.lock().push_back(addr);
                            sleep(REDIAL_BACKOFF).await;
                        }
                    }
                }
                None => self.returned.notified().await,
            }
        }
    }

    /// Number of peer addresses waiting to be dialed.
    pub fn queued_peers(&self) -> usize {
        self.peers.lock().len()
    }

    fn lease(self: &Arc<Self>, session: Session) -> SessionLease {
        SessionLease {
            session: Some(session),
            pool: self.clone(),
            discard: false,
        }
    }

    fn release(&self, session: Session, discard: bool) {
        if discard || !session.is_valid() {
            self.retire(session);
        } else {
            self.idle.lock().push(session);
            self.returned.notify_one();
        }
    }

    // Closes the session and requeues its peer for a later re-dial.
    fn retire(&self, session: Session) {
        let addr = session.addr();
        session.close();
        self.peers.lock().push_back(addr);
        self.returned.notify_one();
    }
}

/// A scoped claim on one pooled session.
///
/// Dropping the lease returns a still-valid session to the pool; an invalid
/// or [`discarded`](SessionLease::discard) one is destroyed and its peer
/// address requeued.
pub struct SessionLease {
    session: Option<Session>,
    pool: Arc<PeerPool>,
    discard: bool,
}

impl SessionLease {
    /// Destroys the session on release instead of returning it.
    pub fn discard(mut self) {
        self.discard = true;
    }
}

impl Deref for SessionLease {
    type Target = Session;

    fn deref(&self) -> &Session {
        self.session.as_ref().expect("lease holds a session until drop")
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.release(session, self.discard);
        }
    }
}
