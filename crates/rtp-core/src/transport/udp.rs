//! UDP transport for RTP
//!
//! This module provides a thin UDP-based transport for the data plane. It
//! does not run its own receiver task: the owner polls [`recv_packet`]
//! with a timeout so it can observe cancellation between datagrams.
//!
//! [`recv_packet`]: UdpRtpTransport::recv_packet

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, trace};

use crate::error::Error;
use crate::packet::{hex_dump, RtpPacket, RTP_HEADER_SIZE};
use crate::{Result, DEFAULT_MAX_PACKET_SIZE};

/// Outcome of one receive attempt
#[derive(Debug)]
pub enum RecvOutcome {
    /// A datagram was received and decoded
    Packet(RtpPacket, SocketAddr),

    /// A datagram was received but is too short to be RTP
    Malformed { size: usize, source: SocketAddr },

    /// Nothing arrived before the timeout
    TimedOut,
}

/// UDP socket carrying RTP packets
pub struct UdpRtpTransport {
    socket: UdpSocket,
    /// Receive scratch space, reused across calls
    recv_buffer: Mutex<Vec<u8>>,
}

impl fmt::Debug for UdpRtpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UdpRtpTransport").field("socket", &self.socket).finish_non_exhaustive()
    }
}

impl UdpRtpTransport {
    /// Bind a new UDP transport
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await
            .map_err(|e| Error::Transport(format!("Failed to bind RTP socket {}: {}", addr, e)))?;

        debug!("Bound RTP socket on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            recv_buffer: Mutex::new(vec![0u8; DEFAULT_MAX_PACKET_SIZE]),
        })
    }

    /// Get the local address
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(|e| Error::IoError(e.to_string()))
    }

    /// Serialize and send one packet to `dest`
    pub async fn send_packet(&self, packet: &RtpPacket, dest: SocketAddr) -> Result<usize> {
        let data = packet.serialize();
        trace!("Sending RTP packet seq={} to {}: [{}]",
               packet.header.sequence_number, dest, hex_dump(&data[..RTP_HEADER_SIZE]));

        self.socket.send_to(&data, dest).await
            .map_err(|e| Error::Transport(format!("Failed to send RTP packet to {}: {}", dest, e)))
    }

    /// Wait up to `timeout` for one datagram. Concurrent callers take
    /// turns on the shared receive buffer.
    pub async fn recv_packet(&self, timeout: Duration) -> Result<RecvOutcome> {
        let mut buffer = self.recv_buffer.lock().await;

        let (size, source) = match tokio::time::timeout(timeout, self.socket.recv_from(&mut buffer[..])).await {
            Ok(result) => result
                .map_err(|e| Error::Transport(format!("Failed to receive RTP packet: {}", e)))?,
            Err(_) => return Ok(RecvOutcome::TimedOut),
        };

        match RtpPacket::parse(&buffer[..size]) {
            Ok(packet) => {
                trace!("Received RTP packet seq={} ({} bytes) from {}",
                       packet.header.sequence_number, size, source);
                Ok(RecvOutcome::Packet(packet, source))
            }
            Err(Error::MalformedPacket { .. }) => Ok(RecvOutcome::Malformed { size, source }),
            Err(e) => Err(e),
        }
    }
}
