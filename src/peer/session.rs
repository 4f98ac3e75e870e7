use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch, Notify};
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::constants::{DIAL_TIMEOUT, READ_TIMEOUT, SEND_QUEUE_LEN, WRITE_TIMEOUT};
use crate::metainfo::InfoHash;

use super::bitfield::Bitfield;
use super::error::PeerError;
use super::handshake::Handshake;
use super::message::{Message, MessageId};
use super::peer_id::PeerId;
use super::transport::{FrameReader, FrameWriter};

/// Lifecycle of a peer session.
///
/// Transitions are monotone toward `Closed`: a session starts `Unchoked`
/// (peers that want to choke us say so explicitly), toggles between
/// `Choked` and `Unchoked` while healthy, moves to `Errored` on the first
/// unrecoverable failure, and ends `Closed` once teardown finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The peer is choking us; the writer is parked.
    Choked,
    /// Requests will be answered.
    Unchoked,
    /// An I/O error, decode failure, or timeout killed the connection.
    Errored,
    /// Teardown complete.
    Closed,
}

/// One live peer connection and its state machine.
///
/// Created by a successful handshake; driven by a reader task and a writer
/// task that both stop on the first of close signal, I/O error, or timeout.
/// All mutable state lives behind the session's own locks, so observers see
/// a consistent snapshot per call.
pub struct Session {
    shared: Arc<Shared>,
    send_tx: mpsc::Sender<Message>,
    remote_id: PeerId,
}

struct Shared {
    addr: SocketAddr,
    state: Mutex<SessionState>,
    bitfield: Mutex<BitfieldState>,
    hooks: Mutex<HookMap>,
    /// Signaled when the choke gate opens (or the session dies); the writer
    /// parks on this while `Choked`.
    unchoke: Notify,
    shutdown: watch::Sender<bool>,
}

struct BitfieldState {
    field: Bitfield,
    received: bool,
}

#[derive(Default)]
struct HookMap {
    next_token: u64,
    entries: HashMap<MessageId, Hook>,
}

struct Hook {
    token: u64,
    tx: mpsc::Sender<Message>,
}

/// A claim on one message tag's receive hook.
///
/// Exactly one consumer sees each message of a subscribed tag. Dropping the
/// subscription releases the tag. Delivery is via a bounded channel filled
/// by the reader task, so a slow consumer never blocks the reader.
pub struct TagSubscription {
    tag: MessageId,
    token: u64,
    rx: mpsc::Receiver<Message>,
    shared: Arc<Shared>,
}

impl TagSubscription {
    /// Receives the next message of the subscribed tag, or `None` once the
    /// session is gone.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl Drop for TagSubscription {
    fn drop(&mut self) {
        let mut hooks = self.shared.hooks.lock();
        if hooks.entries.get(&self.tag).is_some_and(|h| h.token == self.token) {
            hooks.entries.remove(&self.tag);
        }
    }
}

impl Session {
    /// Dials a peer, performs the handshake, and starts the session tasks.
    ///
    /// The whole exchange is bounded by the dial deadline. A mismatched
    /// handshake closes the TCP connection before returning.
    pub async fn connect(
        addr: SocketAddr,
        info_hash: InfoHash,
        our_id: PeerId,
        piece_count: usize,
    ) -> Result<Self, PeerError> {
        let established = timeout(DIAL_TIMEOUT, async {
            let mut stream = TcpStream::connect(addr).await?;
            let theirs = Handshake::exchange(&mut stream, info_hash, our_id).await?;
            Ok::<_, PeerError>((stream, theirs))
        })
        .await
        .map_err(|_| PeerError::Timeout)??;

        let (stream, theirs) = established;
        debug!(%addr, peer = %theirs.peer_id.to_hex(), "handshake complete");
        Ok(Self::from_stream(stream, theirs.peer_id, piece_count))
    }

    /// Wraps an already-handshaken stream and spawns the reader and writer.
    pub fn from_stream(stream: TcpStream, remote_id: PeerId, piece_count: usize) -> Self {
        let addr = stream
            .peer_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
        let (read_half, write_half) = stream.into_split();

        let (shutdown, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            addr,
            state: Mutex::new(SessionState::Unchoked),
            bitfield: Mutex::new(BitfieldState {
                field: Bitfield::new(piece_count),
                received: false,
            }),
            hooks: Mutex::new(HookMap::default()),
            unchoke: Notify::new(),
            shutdown,
        });

        let (send_tx, send_rx) = mpsc::channel(SEND_QUEUE_LEN);

        tokio::spawn(run_reader(
            shared.clone(),
            FrameReader::new(read_half),
            shutdown_rx.clone(),
        ));
        tokio::spawn(run_writer(
            shared.clone(),
            FrameWriter::new(write_half),
            send_rx,
            shutdown_rx,
        ));

        Self {
            shared,
            send_tx,
            remote_id,
        }
    }

    /// The remote peer's address.
    pub fn addr(&self) -> SocketAddr {
        self.shared.addr
    }

    /// The remote peer's ID from the handshake.
    pub fn remote_peer_id(&self) -> PeerId {
        self.remote_id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.shared.state.lock()
    }

    /// True until the session errors or closes.
    pub fn is_valid(&self) -> bool {
        matches!(
            self.state(),
            SessionState::Choked | SessionState::Unchoked
        )
    }

    /// True once the peer's bitfield has arrived.
    pub fn bitfield_received(&self) -> bool {
        self.shared.bitfield.lock().received
    }

    /// Whether the peer advertises the given piece.
    pub fn has_piece(&self, index: usize) -> bool {
        self.shared.bitfield.lock().field.has_piece(index)
    }

    /// Marks a piece in the peer's bitfield (as a received Have would).
    pub fn set_piece(&self, index: usize) {
        self.shared.bitfield.lock().field.set_piece(index);
    }

    /// Enqueues an Interested message.
    pub async fn send_interested(&self) -> Result<(), PeerError> {
        self.send(Message::Interested).await
    }

    /// Enqueues an Unchoke message.
    pub async fn send_unchoke(&self) -> Result<(), PeerError> {
        self.send(Message::Unchoke).await
    }

    /// Enqueues a block request.
    pub async fn send_request(&self, index: u32, begin: u32, length: u32) -> Result<(), PeerError> {
        self.send(Message::Request {
            index,
            begin,
            length,
        })
        .await
    }

    /// Enqueues a Have announcement.
    pub async fn send_have(&self, piece: u32) -> Result<(), PeerError> {
        self.send(Message::Have { piece }).await
    }

    async fn send(&self, message: Message) -> Result<(), PeerError> {
        if !self.is_valid() {
            return Err(PeerError::SessionInvalid(self.state()));
        }
        self.send_tx
            .send(message)
            .await
            .map_err(|_| PeerError::ConnectionClosed)
    }

    /// Claims the receive hook for a tag.
    ///
    /// Subsequent frames with that tag are delivered on the returned
    /// subscription; `capacity` bounds how many can queue before the reader
    /// starts dropping them. Claiming a tag that is already claimed
    /// displaces the previous subscriber.
    pub fn subscribe(&self, tag: MessageId, capacity: usize) -> TagSubscription {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let mut hooks = self.shared.hooks.lock();
        let token = hooks.next_token;
        hooks.next_token += 1;
        // On a dead session the sender is dropped instead, so the
        // subscriber sees a closed channel rather than silence.
        if matches!(
            self.shared.state(),
            SessionState::Choked | SessionState::Unchoked
        ) {
            hooks.entries.insert(tag, Hook { token, tx });
        }
        drop(hooks);
        TagSubscription {
            tag,
            token,
            rx,
            shared: self.shared.clone(),
        }
    }

    /// Waits for the next frame of a tag under a deadline.
    pub async fn wait_for(&self, tag: MessageId, deadline: Duration) -> Result<Message, PeerError> {
        let mut sub = self.subscribe(tag, 1);
        match timeout(deadline, sub.recv()).await {
            Err(_) => Err(PeerError::Timeout),
            Ok(None) => Err(PeerError::ConnectionClosed),
            Ok(Some(message)) => Ok(message),
        }
    }

    /// Closes the session. Idempotent; wakes both tasks.
    pub fn close(&self) {
        self.shared.transition_closed();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shared.transition_closed();
    }
}

impl Shared {
    fn state(&self) -> SessionState {
        *self.state.lock()
    }

    fn set_choked(&self) {
        let mut state = self.state.lock();
        if matches!(*state, SessionState::Unchoked) {
            *state = SessionState::Choked;
        }
    }

    fn set_unchoked(&self) {
        {
            let mut state = self.state.lock();
            if matches!(*state, SessionState::Choked) {
                *state = SessionState::Unchoked;
            }
        }
        self.unchoke.notify_waiters();
    }

    // First unrecoverable failure: Errored, then teardown drives Closed.
    fn transition_errored(&self) {
        {
            let mut state = self.state.lock();
            if matches!(*state, SessionState::Choked | SessionState::Unchoked) {
                *state = SessionState::Errored;
            }
        }
        self.wake_all();
    }

    fn transition_closed(&self) {
        {
            let mut state = self.state.lock();
            if !matches!(*state, SessionState::Closed) {
                *state = SessionState::Closed;
            }
        }
        self.wake_all();
    }

    fn wake_all(&self) {
        // Dropping the hook senders unblocks any subscriber mid-recv.
        self.hooks.lock().entries.clear();
        let _ = self.shutdown.send(true);
        self.unchoke.notify_waiters();
    }

    fn on_message(&self, message: Message) {
        trace!(addr = %self.addr, ?message, "frame received");

        match &message {
            Message::Choke => self.set_choked(),
            Message::Unchoke => self.set_unchoked(),
            Message::Bitfield(bits) => {
                let mut bf = self.bitfield.lock();
                let piece_count = bf.field.piece_count();
                bf.field = Bitfield::from_bytes(bits.clone(), piece_count);
                bf.received = true;
            }
            Message::Have { piece } => {
                self.bitfield.lock().field.set_piece(*piece as usize);
            }
            _ => {}
        }

        let Some(tag) = message.id() else {
            return; // KeepAlive carries no payload and has no hook.
        };

        let mut hooks = self.hooks.lock();
        if let Some(hook) = hooks.entries.get(&tag) {
            match hook.tx.try_send(message) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    hooks.entries.remove(&tag);
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    trace!(addr = %self.addr, ?tag, "hook queue full, frame dropped");
                }
            }
        }
    }
}

async fn run_reader(
    shared: Arc<Shared>,
    mut frames: FrameReader,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = timeout(READ_TIMEOUT, frames.read_message()) => match result {
                Err(_) => {
                    warn!(addr = %shared.addr, "frame read timed out");
                    shared.transition_errored();
                    break;
                }
                Ok(Err(err)) => {
                    debug!(addr = %shared.addr, %err, "reader stopping");
                    shared.transition_errored();
                    break;
                }
                Ok(Ok(message)) => shared.on_message(message),
            },
        }
    }
    shared.transition_closed();
    trace!(addr = %shared.addr, "reader exited");
}

async fn run_writer(
    shared: Arc<Shared>,
    mut frames: FrameWriter,
    mut send_rx: mpsc::Receiver<Message>,
    mut shutdown: watch::Receiver<bool>,
) {
    'outer: loop {
        let message = tokio::select! {
            _ = shutdown.changed() => break,
            message = send_rx.recv() => match message {
                Some(m) => m,
                None => break,
            },
        };

        // Park while choked. The notified future is created before the state
        // check so a signal between the two cannot be missed, and the state
        // lock is never held across an await.
        loop {
            let opened = shared.unchoke.notified();
            match shared.state() {
                SessionState::Unchoked => break,
                SessionState::Choked => {}
                _ => break 'outer,
            }
            tokio::select! {
                _ = opened => {}
                _ = shutdown.changed() => break 'outer,
            }
        }

        match timeout(WRITE_TIMEOUT, frames.write_message(&message)).await {
            Err(_) => {
                warn!(addr = %shared.addr, "frame write timed out");
                shared.transition_errored();
                break;
            }
            Ok(Err(err)) => {
                debug!(addr = %shared.addr, %err, "writer stopping");
                shared.transition_errored();
                break;
            }
            Ok(Ok(())) => {
                trace!(addr = %shared.addr, ?message, "frame sent");
            }
        }
    }
    shared.transition_closed();
    trace!(addr = %shared.addr, "writer exited");
}
