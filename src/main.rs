use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use pincer::bencode::{self, Value};
use pincer::constants::{ACQUIRE_TIMEOUT, BLOCK_SIZE, DOWNLOAD_WORKERS};
use pincer::download::{download_piece, BlockPlan, Downloader, PeerPool};
use pincer::metainfo::Torrent;
use pincer::peer::{PeerId, Session};
use pincer::tracker;

#[derive(Parser, Debug)]
#[command(name = "pincer", version, about = "A BitTorrent leecher")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode a bencoded string and print it as JSON
    Decode {
        /// The bencoded value
        value: String,
    },
    /// Print a torrent's metadata
    Info {
        /// Path to the .torrent file
        torrent: PathBuf,
    },
    /// Print the torrent's peers, one ip:port per line
    Peers {
        /// Path to the .torrent file
        torrent: PathBuf,
    },
    /// Handshake with one peer and print its peer ID
    Handshake {
        /// Path to the .torrent file
        torrent: PathBuf,
        /// Peer endpoint as ip:port
        peer: String,
    },
    /// Download a single piece
    #[command(name = "download_piece")]
    DownloadPiece {
        /// Output file for the piece
        #[arg(short)]
        output: PathBuf,
        /// Path to the .torrent file
        torrent: PathBuf,
        /// Piece index
        piece: u32,
    },
    /// Download the whole payload
    Download {
        /// Output file for the payload
        #[arg(short)]
        output: PathBuf,
        /// Path to the .torrent file
        torrent: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Decode { value } => decode_value(&value),
        Command::Info { torrent } => print_info(&torrent),
        Command::Peers { torrent } => print_peers(&torrent).await,
        Command::Handshake { torrent, peer } => print_handshake(&torrent, &peer).await,
        Command::DownloadPiece {
            output,
            torrent,
            piece,
        } => download_one_piece(&output, &torrent, piece).await,
        Command::Download { output, torrent } => download_all(&output, &torrent).await,
    }
}

fn decode_value(input: &str) -> Result<()> {
    let value = bencode::decode(input.as_bytes()).context("failed to decode value")?;
    println!("{}", to_json(&value));
    Ok(())
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Integer(i) => (*i).into(),
        Value::Bytes(b) => String::from_utf8_lossy(b).into_owned().into(),
        Value::List(l) => serde_json::Value::Array(l.iter().map(to_json).collect()),
        Value::Dict(d) => serde_json::Value::Object(
            d.iter()
                .map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), to_json(v)))
                .collect(),
        ),
    }
}

fn load_torrent(path: &Path) -> Result<Torrent> {
    Torrent::from_file(path).with_context(|| format!("failed to load torrent {}", path.display()))
}

fn print_info(path: &Path) -> Result<()> {
    let torrent = load_torrent(path)?;

    println!("Tracker URL: {}", torrent.announce);
    println!("Length: {}", torrent.total_length);
    println!("Info Hash: {}", torrent.info_hash);
    println!("Piece Length: {}", torrent.piece_length);
    println!("Piece Hashes:");
    for hash in &torrent.piece_hashes {
        let hex: String = hash.iter().map(|b| format!("{b:02x}")).collect();
        println!("{hex}");
    }
    Ok(())
}

async fn print_peers(path: &Path) -> Result<()> {
    let torrent = load_torrent(path)?;
    let spec = tracker::announce(&torrent, &PeerId::generate())
        .await
        .context("tracker announce failed")?;

    for peer in &spec.peers {
        println!("{peer}");
    }
    Ok(())
}

async fn print_handshake(path: &Path, peer: &str) -> Result<()> {
    let torrent = load_torrent(path)?;
    let addr: SocketAddr = peer
        .parse()
        .with_context(|| format!("invalid peer endpoint {peer:?}"))?;

    let session = Session::connect(
        addr,
        torrent.info_hash,
        PeerId::generate(),
        torrent.piece_count(),
    )
    .await
    .context("handshake failed")?;

    println!("Peer ID: {}", session.remote_peer_id().to_hex());
    session.close();
    Ok(())
}

async fn download_one_piece(output: &Path, path: &Path, piece: u32) -> Result<()> {
    let torrent = load_torrent(path)?;
    if piece as usize >= torrent.piece_count() {
        return Err(anyhow!(
            "piece {piece} out of range (torrent has {} pieces)",
            torrent.piece_count()
        ));
    }

    let pool = announce_pool(&torrent).await?;
    let plan = BlockPlan::for_piece(&torrent, piece as usize, BLOCK_SIZE);

    // One retry per queued peer: a failed attempt releases or retires the
    // session, so the next acquire lands elsewhere.
    let attempts = pool.queued_peers().max(1);
    let mut last_err = None;
    for _ in 0..attempts {
        let lease = pool
            .acquire_within(ACQUIRE_TIMEOUT)
            .await
            .context("no peer session available")?;
        match download_piece(&lease, &plan).await {
            Ok(verified) => {
                tokio::fs::write(output, &verified.data)
                    .await
                    .with_context(|| format!("failed to write {}", output.display()))?;
                println!("Piece {piece} downloaded to {}.", output.display());
                return Ok(());
            }
            Err(err) => {
                if err.is_session_fatal() {
                    lease.discard();
                }
                last_err = Some(err);
            }
        }
    }

    Err(match last_err {
        Some(err) => anyhow!(err).context(format!("failed to download piece {piece}")),
        None => anyhow!("failed to download piece {piece}"),
    })
}

async fn download_all(output: &Path, path: &Path) -> Result<()> {
    let torrent = load_torrent(path)?;
    let pool = announce_pool(&torrent).await?;

    let mut sink = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("failed to create {}", output.display()))?;

    Downloader::new(torrent, pool, DOWNLOAD_WORKERS)
        .run(&mut sink)
        .await
        .context("download failed")?;
    sink.flush().await?;

    println!("Downloaded {} to {}.", path.display(), output.display());
    Ok(())
}

async fn announce_pool(torrent: &Torrent) -> Result<std::sync::Arc<PeerPool>> {
    let our_id = PeerId::generate();
    let spec = tracker::announce(torrent, &our_id)
        .await
        .context("tracker announce failed")?;
    if spec.peers.is_empty() {
        return Err(anyhow!("tracker returned no peers"));
    }

    Ok(PeerPool::new(
        spec.peers,
        torrent.info_hash,
        our_id,
        torrent.piece_count(),
    ))
}
