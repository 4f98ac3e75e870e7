use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, warn};

use crate::constants::{ACQUIRE_TIMEOUT, MAX_ACQUIRE_STRIKES};
use crate::metainfo::Torrent;

use super::error::DownloadError;
use super::piece::{download_piece, Piece};
use super::plan::BlockPlan;
use super::pool::PeerPool;

/// Coordinates a full-torrent download.
///
/// Keeps a FIFO of un-downloaded block plans, fans them out to a bounded
/// set of workers that borrow sessions from the pool, requeues failed
/// plans, and emits the completed pieces to the sink strictly in index
/// order, exactly once each.
pub struct Downloader {
    torrent: Torrent,
    pool: Arc<PeerPool>,
    workers: usize,
}

struct WorkQueue {
    plans: Mutex<VecDeque<BlockPlan>>,
    ready: Notify,
}

impl WorkQueue {
    fn new(plans: Vec<BlockPlan>) -> Self {
        Self {
            plans: Mutex::new(plans.into()),
            ready: Notify::new(),
        }
    }

    fn pop(&self) -> Option<BlockPlan> {
        self.plans.lock().pop_front()
    }

    fn push(&self, plan: BlockPlan) {
        self.plans.lock().push_back(plan);
        self.ready.notify_one();
    }
}

impl Downloader {
    pub fn new(torrent: Torrent, pool: Arc<PeerPool>, workers: usize) -> Self {
        Self {
            torrent,
            pool,
            workers,
        }
    }

    /// Downloads every piece and writes the payload to the sink.
    ///
    /// Pieces may complete in any order; the sink sees them in ascending
    /// index order once all are present. Returns the first fatal error if
    /// the peer set cannot finish the torrent.
    pub async fn run<W: AsyncWrite + Unpin>(&self, sink: &mut W) -> Result<(), DownloadError> {
        let piece_count = self.torrent.piece_count();
        let queue = Arc::new(WorkQueue::new(BlockPlan::all_for(&self.torrent)));
        let (piece_tx, mut piece_rx) = mpsc::channel::<Piece>(piece_count.max(1));
        let (shutdown_tx, _) = watch::channel(false);
        let fatal: Arc<Mutex<Option<DownloadError>>> = Arc::new(Mutex::new(None));

        info!(
            pieces = piece_count,
            workers = self.workers,
            "starting download"
        );

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            handles.push(tokio::spawn(run_worker(
                worker_id,
                queue.clone(),
                self.pool.clone(),
                piece_tx.clone(),
                shutdown_tx.subscribe(),
                fatal.clone(),
            )));
        }
        drop(piece_tx);

        // Reap completions until every index is present. A late duplicate
        // (a piece that timed out locally but completed on the wire) is
        // dropped so the sink is written exactly once per piece.
        let mut pieces: Vec<Option<Piece>> = (0..piece_count).map(|_| None).collect();
        let mut have = 0usize;
        while have < piece_count {
            match piece_rx.recv().await {
                Some(piece) => {
                    let index = piece.index as usize;
                    if index < piece_count && pieces[index].is_none() {
                        pieces[index] = Some(piece);
                        have += 1;
                        debug!(piece = index, have, total = piece_count, "piece complete");
                    } else {
                        debug!(piece = index, "duplicate piece dropped");
                    }
                }
                None => break, // every worker has given up
            }
        }

        let _ = shutdown_tx.send(true);
        for handle in handles {
            let _ = handle.await;
        }

        if have < piece_count {
            return Err(fatal
                .lock()
                .take()
                .unwrap_or(DownloadError::PoolExhausted));
        }

        for piece in pieces.into_iter().flatten() {
            sink.write_all(&piece.data).await?;
        }
        sink.flush().await?;

        info!(pieces = piece_count, "download complete");
        Ok(())
    }
}

async fn run_worker(
    worker_id: usize,
    queue: Arc<WorkQueue>,
    pool: Arc<PeerPool>,
    piece_tx: mpsc::Sender<Piece>,
    mut shutdown: watch::Receiver<bool>,
    fatal: Arc<Mutex<Option<DownloadError>>>,
) {
    let mut strikes = 0u32;
    loop {
        if *shutdown.borrow() {
            break;
        }

        let Some(plan) = queue.pop() else {
            tokio::select! {
                _ = queue.ready.notified() => continue,
                _ = shutdown.changed() => break,
            }
        };

        let lease = match pool.acquire_within(ACQUIRE_TIMEOUT).await {
            Ok(lease) => {
                strikes = 0;
                lease
            }
            Err(err) => {
                strikes += 1;
                warn!(
                    worker = worker_id,
                    piece = plan.piece_index,
                    strikes,
                    "no session available"
                );
                queue.push(plan);
                if strikes >= MAX_ACQUIRE_STRIKES {
                    fatal.lock().get_or_insert(err);
                    break;
                }
                continue;
            }
        };

        match download_piece(&lease, &plan).await {
            Ok(piece) => {
                if piece_tx.send(piece).await.is_err() {
                    break; // reaper is gone; nothing left to do
                }
            }
            Err(err) => {
                debug!(
                    worker = worker_id,
                    piece = plan.piece_index,
                    %err,
                    session_fatal = err.is_session_fatal(),
                    "piece attempt failed, requeueing"
                );
                if err.is_session_fatal() {
                    lease.discard();
                }
                queue.push(plan);
            }
        }
    }
}
