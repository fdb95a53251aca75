//! RTP Core library for the framecast project
//!
//! This crate provides the data plane shared by the framecast server and
//! client: RTP packet encoding/decoding, splitting frames into MTU-sized
//! packets and putting them back together, packet loss accounting and the
//! bounded buffer that hands completed frames to a consumer.
//!
//! The library is organized into several modules:
//!
//! - `packet`: RTP packet definitions and the 12-byte header codec
//! - `fragment`: Frame fragmentation (sender) and reassembly (receiver)
//! - `stats`: Packet loss statistics
//! - `buffer`: Drop-oldest delivery buffer between network and consumer
//! - `transport`: UDP transport for RTP packets

mod error;

pub mod buffer;
pub mod fragment;
pub mod packet;
pub mod stats;
pub mod transport;

pub use error::Error;

pub use buffer::{DeliveredFrame, DeliveryBuffer, DEFAULT_DELIVERY_BUFFER_CAPACITY};
pub use fragment::{AssembledFrame, Fragmenter, Reassembler};
pub use packet::{RtpHeader, RtpPacket};
pub use stats::{LossStats, PacketLossResult, PacketLossTracker};
pub use transport::UdpRtpTransport;

/// Maximum number of payload bytes carried by one RTP packet
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 1400;

/// Receive buffer size for incoming datagrams
pub const DEFAULT_MAX_PACKET_SIZE: usize = 20480;

/// Payload type for JPEG (RFC 3551)
pub const PAYLOAD_TYPE_JPEG: u8 = 26;

/// Typedef for RTP timestamp values
pub type RtpTimestamp = u32;

/// Typedef for RTP sequence numbers
pub type RtpSequenceNumber = u16;

/// Typedef for RTP synchronization source identifier
pub type RtpSsrc = u32;

/// Result type for RTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Prelude module with commonly used types
pub mod prelude {
    pub use crate::{
        AssembledFrame, DeliveredFrame, DeliveryBuffer, Error, Fragmenter, LossStats,
        PacketLossTracker, Reassembler, Result, RtpHeader, RtpPacket, RtpSequenceNumber,
        RtpSsrc, RtpTimestamp, UdpRtpTransport,
    };
}
