//! Error Types for Session Core

use std::io;
use thiserror::Error;

/// Main result type for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for session operations
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// The requested media could not be opened
    #[error("Media not found: {0}")]
    MediaNotFound(String),

    /// A control request could not be parsed
    #[error("Malformed request: {0}")]
    MalformedRequest(String),

    /// A control reply could not be parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Command received or issued in a state that does not allow it
    #[error("{method} not allowed in state {state}")]
    ProtocolSequenceViolation {
        method: String,
        state: String,
    },

    /// Session id on a request or reply does not match the active session
    #[error("Session mismatch: expected {expected}, got {actual}")]
    SessionMismatch {
        expected: u32,
        actual: u32,
    },

    /// A successful reply that should name a session does not
    #[error("{method} reply carries no session id")]
    MissingSession { method: String },

    /// The peer answered with a non-success status
    #[error("Request failed with status {code} {reason}")]
    RequestFailed {
        code: u16,
        reason: String,
    },

    /// Network/transport error on the control or data channel
    #[error("Transport error: {0}")]
    Transport(String),

    /// No reply within the configured timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Operation requires an open control connection
    #[error("Not connected to a server")]
    NotConnected,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error from the RTP layer
    #[error(transparent)]
    Rtp(#[from] framecast_rtp_core::Error),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Transport(err.to_string())
    }
}

impl Error {
    pub fn sequence_violation(method: impl ToString, state: impl ToString) -> Self {
        Error::ProtocolSequenceViolation {
            method: method.to_string(),
            state: state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::sequence_violation("PLAY", "INIT").to_string(),
            "PLAY not allowed in state INIT"
        );
        assert_eq!(
            Error::SessionMismatch { expected: 1, actual: 2 }.to_string(),
            "Session mismatch: expected 1, got 2"
        );
        assert_eq!(
            Error::MissingSession { method: "PLAY".to_string() }.to_string(),
            "PLAY reply carries no session id"
        );

        let rtp: Error = framecast_rtp_core::Error::MalformedPacket { required: 12, available: 0 }.into();
        assert!(rtp.to_string().contains("Malformed RTP packet"));
    }
}
