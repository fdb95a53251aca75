//! Actor front end for [`Player`]
//!
//! The player runs on its own task and is driven through a command
//! channel, so a UI thread never waits on the network. SETUP, PLAY, PAUSE
//! and TEARDOWN can be awaited for their result; `switch_media` and
//! `replay` are queued and return at once.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use framecast_rtp_core::{DeliveryBuffer, LossStats};

use super::player::Player;
use crate::errors::{Error, Result};
use crate::state::SessionState;

/// Snapshot of the player as seen by the actor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerStatus {
    pub state: SessionState,
    pub session_id: u32,
    pub media: String,
    pub connected: bool,
}

type Reply = oneshot::Sender<Result<()>>;

enum PlayerCommand {
    Connect(Reply),
    Setup(Reply),
    Play(Reply),
    Pause(Reply),
    Teardown(Reply),
    SwitchMedia(String),
    Replay,
    Status(oneshot::Sender<PlayerStatus>),
}

/// Cloneable handle to a player task
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<PlayerCommand>,
    buffer: Arc<DeliveryBuffer>,
    stats: watch::Receiver<LossStats>,
}

impl PlayerHandle {
    /// Move `player` onto a new task. The task ends, tearing the session
    /// down, once every handle is dropped.
    pub fn spawn(player: Player) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            commands,
            buffer: player.buffer(),
            stats: player.subscribe_stats(),
        };
        let task = tokio::spawn(run_player(player, receiver));
        (handle, task)
    }

    pub fn buffer(&self) -> Arc<DeliveryBuffer> {
        self.buffer.clone()
    }

    pub fn loss_stats(&self) -> LossStats {
        self.stats.borrow().clone()
    }

    pub async fn connect(&self) -> Result<()> {
        self.request(PlayerCommand::Connect).await
    }

    pub async fn setup(&self) -> Result<()> {
        self.request(PlayerCommand::Setup).await
    }

    pub async fn play(&self) -> Result<()> {
        self.request(PlayerCommand::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(PlayerCommand::Pause).await
    }

    pub async fn teardown(&self) -> Result<()> {
        self.request(PlayerCommand::Teardown).await
    }

    /// Queue a switch to `media`; failures are logged and leave the player in INIT
    pub fn switch_media(&self, media: impl Into<String>) -> Result<()> {
        self.enqueue(PlayerCommand::SwitchMedia(media.into()))
    }

    /// Queue a restart of the current media
    pub fn replay(&self) -> Result<()> {
        self.enqueue(PlayerCommand::Replay)
    }

    /// Status once every earlier command has been processed
    pub async fn status(&self) -> Result<PlayerStatus> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(PlayerCommand::Status(tx))?;
        rx.await.map_err(|_| stopped())
    }

    fn enqueue(&self, command: PlayerCommand) -> Result<()> {
        self.commands.send(command).map_err(|_| stopped())
    }

    async fn request(&self, command: impl FnOnce(Reply) -> PlayerCommand) -> Result<()> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(command(tx))?;
        rx.await.map_err(|_| stopped())?
    }
}

fn stopped() -> Error {
    Error::Transport("Player task has stopped".to_string())
}

async fn run_player(mut player: Player, mut commands: mpsc::UnboundedReceiver<PlayerCommand>) {
    while let Some(command) = commands.recv().await {
        match command {
            PlayerCommand::Connect(reply) => {
                let _ = reply.send(player.connect().await);
            }
            PlayerCommand::Setup(reply) => {
                let _ = reply.send(player.setup().await);
            }
            PlayerCommand::Play(reply) => {
                let _ = reply.send(player.play().await);
            }
            PlayerCommand::Pause(reply) => {
                let _ = reply.send(player.pause().await);
            }
            PlayerCommand::Teardown(reply) => {
                let _ = reply.send(player.teardown().await);
            }
            PlayerCommand::SwitchMedia(media) => {
                if let Err(e) = player.switch_media(media).await {
                    warn!("Switching media failed: {}", e);
                }
            }
            PlayerCommand::Replay => {
                if let Err(e) = player.replay().await {
                    warn!("Replay failed: {}", e);
                }
            }
            PlayerCommand::Status(reply) => {
                let _ = reply.send(PlayerStatus {
                    state: player.state(),
                    session_id: player.session_id(),
                    media: player.media().to_string(),
                    connected: player.is_connected(),
                });
            }
        }
    }

    debug!("All player handles dropped, shutting down");
    if player.is_connected() {
        let _ = player.teardown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;

    #[tokio::test]
    async fn test_commands_are_serialized() {
        let (handle, task) = PlayerHandle::spawn(Player::new(ClientConfig::default(), "a.mjpeg"));

        assert!(matches!(handle.setup().await, Err(Error::NotConnected)));
        let status = handle.status().await.unwrap();
        assert_eq!(status.state, SessionState::Init);
        assert_eq!(status.media, "a.mjpeg");
        assert!(!status.connected);

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_switch_returns_immediately_and_fails_to_init() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config = ClientConfig {
            server_address: addr,
            ..ClientConfig::default()
        };
        let (handle, _task) = PlayerHandle::spawn(Player::new(config, "a.mjpeg"));

        handle.switch_media("b.mjpeg").unwrap();
        let status = handle.status().await.unwrap();
        assert_eq!(status.media, "b.mjpeg");
        assert_eq!(status.state, SessionState::Init);
        assert!(!status.connected);
    }
}
