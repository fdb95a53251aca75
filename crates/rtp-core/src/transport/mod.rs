//! Network transport for the RTP data plane

pub mod udp;

pub use udp::{RecvOutcome, UdpRtpTransport};
