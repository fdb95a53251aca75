//! Streaming client
//!
//! - `session`: client mirror of the session state machine
//! - `control`: control connection with CSeq-correlated round trips
//! - `receiver`: RTP receive loop feeding the delivery buffer
//! - `player`: lifecycle (setup/play/pause/teardown, replay, switch)
//! - `handle`: actor wrapper so callers never block on the network

pub mod control;
pub mod handle;
pub mod player;
pub mod receiver;
pub mod session;

pub use control::ControlConnection;
pub use handle::{PlayerHandle, PlayerStatus};
pub use player::Player;
pub use receiver::{ReceiveLoop, ReceiverState};
pub use session::{ClientSession, ReplyOutcome};
