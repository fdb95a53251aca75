use thiserror::Error;
use std::io;

/// Error type for RTP operations
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Input too short to hold an RTP header
    #[error("Malformed RTP packet: need {required} bytes but have {available}")]
    MalformedPacket {
        required: usize,
        available: usize,
    },

    /// IO error when sending/receiving RTP packets
    #[error("IO error: {0}")]
    IoError(String),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err.to_string())
    }
}
