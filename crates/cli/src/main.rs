//! framecast command-line tool
//!
//! ```text
//! framecast server --port 8554 --media-root ./media
//! framecast client --server 127.0.0.1:8554 --media movie.Mjpeg
//! ```

mod consumer;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use framecast_infra_common::logging::{parse_log_level, setup_logging, LoggingConfig};
use framecast_session_core::{ClientConfig, DirectoryCatalog, Player, PlayerHandle, ServerConfig, StreamServer};

use consumer::{ConsumerSettings, FrameConsumer, PollEvent};

#[derive(Parser, Debug)]
#[command(name = "framecast", version)]
#[command(about = "Stream MJPEG frames over RTP with RTSP-style control")]
struct Cli {
    /// Log level, overridden by RUST_LOG
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Log as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve MJPEG files from a directory
    Server(ServerArgs),
    /// Play a stream without rendering it
    Client(ClientArgs),
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Control port
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to listen on
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Directory holding the media files
    #[arg(long)]
    media_root: Option<PathBuf>,

    /// Milliseconds between frames
    #[arg(long)]
    pacing_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct ClientArgs {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server control address
    #[arg(short, long)]
    server: Option<SocketAddr>,

    /// Local RTP port (0 for any)
    #[arg(short = 'r', long)]
    data_port: Option<u16>,

    /// Media to request
    #[arg(short, long, default_value = "movie.Mjpeg")]
    media: String,

    /// Frames to buffer before consuming
    #[arg(long, default_value_t = 60)]
    prebuffer: usize,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<u64>,

    /// Start the media over when it ends
    #[arg(long)]
    replay: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::new(parse_log_level(&cli.log_level)?, "framecast");
    if cli.log_json {
        logging = logging.with_json();
    }
    setup_logging(logging.clone())?;
    logging.log_welcome(env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Server(args) => run_server(args).await,
        Command::Client(args) => run_client(args).await,
    }
}

async fn run_server(args: ServerArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config.bind_address.set_port(port);
    }
    if let Some(ip) = args.bind {
        config.bind_address.set_ip(ip);
    }
    if let Some(root) = args.media_root {
        config.media_root = root;
    }
    if let Some(pacing) = args.pacing_ms {
        config.pacing_interval_ms = pacing;
    }

    info!("Serving media from {}", config.media_root.display());
    let catalog = Arc::new(DirectoryCatalog::new(config.media_root.clone()));
    let server = StreamServer::bind(config, catalog).await?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            shutdown.cancel();
        }
    });

    server.run().await?;
    Ok(())
}

async fn run_client(args: ClientArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(server) = args.server {
        config.server_address = server;
    }
    if let Some(port) = args.data_port {
        config.data_port = port;
    }

    let (player, task) = PlayerHandle::spawn(Player::new(config.clone(), args.media.clone()));
    player
        .connect()
        .await
        .with_context(|| format!("connecting to {}", config.server_address))?;
    player.setup().await.with_context(|| format!("setting up {}", args.media))?;
    player.play().await.context("starting playback")?;

    let settings = ConsumerSettings {
        prebuffer: args.prebuffer,
        ..ConsumerSettings::default()
    };
    let mut consumer = FrameConsumer::new(player.buffer(), settings);
    let mut ticker = tokio::time::interval(consumer.settings().poll_interval);
    let deadline = args.duration.map(|secs| Instant::now() + Duration::from_secs(secs));

    let mut window_start = Instant::now();
    let mut window_frames = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }

        match consumer.poll() {
            PollEvent::Frame(frame) => {
                window_frames += 1;
                tracing::trace!("Frame of {} bytes ({} fragments)", frame.data.len(), frame.fragments);
            }
            PollEvent::Buffering(buffered) => tracing::debug!("Buffering ({} frames)", buffered),
            PollEvent::Empty => {}
            PollEvent::EndOfStream if args.replay => {
                info!("End of stream, replaying");
                player.replay()?;
                consumer.reset();
            }
            PollEvent::EndOfStream => {
                info!("End of stream after {} frames", consumer.frames_taken());
                break;
            }
        }

        let elapsed = window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let stats = player.loss_stats();
            let buffered = player.buffer().stats();
            info!(
                "{:.1} fps, {} received, {} lost ({:.2}%), {} buffered, {} dropped",
                window_frames as f64 / elapsed.as_secs_f64(),
                stats.packets_received,
                stats.packets_lost,
                stats.loss_rate,
                buffered.queued,
                buffered.frames_dropped
            );
            window_start = Instant::now();
            window_frames = 0;
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
    }

    if let Err(e) = player.teardown().await {
        warn!("Teardown failed: {}", e);
    }
    drop(player);
    task.await.context("player task")?;
    Ok(())
}
