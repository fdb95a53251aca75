//! Session Core library for the framecast project
//!
//! This crate implements the control plane and both ends of a framecast
//! stream: a server that answers RTSP-style SETUP/PLAY/PAUSE/TEARDOWN
//! requests and paces MJPEG frames out over RTP, and a client that drives
//! those requests and rebuilds frames into a delivery buffer.
//!
//! The library is organized into several modules:
//!
//! - `protocol`: Control messages and their framing over TCP
//! - `state`: Session states shared by server and client
//! - `media`: Frame sources and media catalogs
//! - `server`: Listener, per-connection session and paced scheduler
//! - `client`: Control connection, receive loop, player and its actor handle
//! - `config`: Server and client configuration

pub mod client;
pub mod config;
pub mod errors;
pub mod media;
pub mod protocol;
pub mod server;
pub mod state;

pub use errors::{Error, Result};

pub use client::{Player, PlayerHandle, PlayerStatus};
pub use config::{ClientConfig, ServerConfig};
pub use media::{DirectoryCatalog, FrameSource, InMemoryCatalog, MediaCatalog, MjpegFileSource};
pub use protocol::{Method, Request, Response, StatusCode};
pub use server::{SchedulerReport, StreamServer};
pub use state::SessionState;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        ClientConfig, DirectoryCatalog, Error, FrameSource, InMemoryCatalog, MediaCatalog, Player,
        PlayerHandle, Result, ServerConfig, SessionState, StreamServer,
    };
    pub use framecast_rtp_core::{DeliveredFrame, DeliveryBuffer, LossStats};
}
