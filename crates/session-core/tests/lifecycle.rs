//! Replay and media switching
//!
//! These tests verify:
//! - Replay restarts the media from the first frame with fresh loss stats
//! - switch_media through the actor handle streams the new media
//! - A failed switch leaves the player in INIT and can be retried

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use framecast_rtp_core::DeliveryBuffer;
use framecast_session_core::prelude::*;
use framecast_session_core::PlayerStatus;

fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn frames(tag: &str, count: usize) -> Vec<Bytes> {
    (0..count).map(|i| Bytes::from(format!("{}-{}", tag, i))).collect()
}

async fn start_server() -> (SocketAddr, CancellationToken) {
    let catalog = InMemoryCatalog::new()
        .with_media("a.mjpeg", frames("a", 1000))
        .with_media("b.mjpeg", frames("b", 1000));
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        pacing_interval_ms: 5,
        ..ServerConfig::default()
    };
    let server = StreamServer::bind(config, Arc::new(catalog)).await.unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_token();
    tokio::spawn(server.run());
    (addr, shutdown)
}

fn client_config(server: SocketAddr) -> ClientConfig {
    ClientConfig {
        server_address: server,
        data_bind_address: "127.0.0.1".parse().unwrap(),
        recv_timeout_ms: 50,
        teardown_grace_ms: 20,
        ..ClientConfig::default()
    }
}

async fn next_frame(buffer: &DeliveryBuffer) -> DeliveredFrame {
    for _ in 0..300 {
        if let Some(frame) = buffer.get() {
            return frame;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no frame arrived");
}

async fn wait_for_status(handle: &PlayerHandle, done: impl Fn(&PlayerStatus) -> bool) -> PlayerStatus {
    for _ in 0..300 {
        let status = handle.status().await.unwrap();
        if done(&status) {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("player never reached the expected status");
}

#[tokio::test]
async fn test_replay_starts_over() {
    init_test_logging();
    let (addr, shutdown) = start_server().await;

    let mut player = Player::new(client_config(addr), "a.mjpeg");
    player.connect().await.unwrap();
    player.setup().await.unwrap();
    player.play().await.unwrap();

    let buffer = player.buffer();
    for _ in 0..10 {
        next_frame(&buffer).await;
    }
    assert!(player.loss_stats().packets_received >= 10);

    player.replay().await.unwrap();
    assert_eq!(player.state(), SessionState::Playing);
    assert_eq!(player.media(), "a.mjpeg");
    assert!(player.loss_stats().packets_received < 10);

    let first = next_frame(&buffer).await;
    assert_eq!(&first.data[..], b"a-0");

    player.teardown().await.unwrap();
    shutdown.cancel();
}

#[tokio::test]
async fn test_switch_media_through_handle() {
    init_test_logging();
    let (addr, shutdown) = start_server().await;

    let (handle, _task) = PlayerHandle::spawn(Player::new(client_config(addr), "a.mjpeg"));
    handle.connect().await.unwrap();
    handle.setup().await.unwrap();
    handle.play().await.unwrap();

    let buffer = handle.buffer();
    assert!(next_frame(&buffer).await.data.starts_with(b"a-"));

    handle.switch_media("b.mjpeg").unwrap();
    let status = wait_for_status(&handle, |s| s.media == "b.mjpeg" && s.state == SessionState::Playing).await;
    assert!(status.connected);
    assert_ne!(status.session_id, 0);

    let frame = next_frame(&buffer).await;
    assert_eq!(&frame.data[..], b"b-0");

    handle.teardown().await.unwrap();
    shutdown.cancel();
}

#[tokio::test]
async fn test_failed_switch_is_retryable() {
    init_test_logging();
    let (addr, shutdown) = start_server().await;

    let mut player = Player::new(client_config(addr), "a.mjpeg");
    player.connect().await.unwrap();
    player.setup().await.unwrap();
    player.play().await.unwrap();

    assert!(matches!(player.switch_media("missing.mjpeg").await, Err(Error::MediaNotFound(_))));
    assert_eq!(player.state(), SessionState::Init);
    assert!(!player.is_connected());
    assert!(player.buffer().is_empty());

    player.switch_media("b.mjpeg").await.unwrap();
    assert_eq!(player.state(), SessionState::Playing);
    assert_eq!(&next_frame(&player.buffer()).await.data[..], b"b-0");

    player.teardown().await.unwrap();
    shutdown.cancel();
}
