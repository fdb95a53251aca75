//! Session state shared by the server and client state machines

use std::fmt;

/// Control session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// No session, or the session was torn down
    #[default]
    Init,

    /// Session set up, media not flowing
    Ready,

    /// Media is flowing
    Playing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Init => "INIT",
            SessionState::Ready => "READY",
            SessionState::Playing => "PLAYING",
        };
        f.write_str(name)
    }
}
