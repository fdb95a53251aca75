//! Streaming server
//!
//! - `listener`: accept loop, one task per control connection
//! - `connection`: reads framed requests and writes replies
//! - `session`: the per-connection state machine
//! - `scheduler`: the paced RTP sender started by PLAY

pub mod connection;
pub mod listener;
pub mod scheduler;
pub mod session;

pub use listener::StreamServer;
pub use scheduler::{SchedulerExit, SchedulerReport, StreamScheduler};
pub use session::ServerSession;
