//! Frame fragmentation and reassembly
//!
//! A frame larger than the maximum payload size is split into consecutive
//! packets. Only the last packet of a frame carries the marker bit. The
//! receiver concatenates payloads in arrival order until it sees a marker;
//! packets are not reordered, so out-of-order arrival corrupts that frame.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::packet::{RtpHeader, RtpPacket};
use crate::{RtpSequenceNumber, RtpSsrc, RtpTimestamp, DEFAULT_MAX_PAYLOAD_SIZE, PAYLOAD_TYPE_JPEG};

/// Splits frames into RTP packets with a sequence counter that runs across frames
#[derive(Debug, Clone)]
pub struct Fragmenter {
    max_payload_size: usize,
    payload_type: u8,
    ssrc: RtpSsrc,
    next_seq: RtpSequenceNumber,
}

impl Default for Fragmenter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PAYLOAD_SIZE, PAYLOAD_TYPE_JPEG, 0)
    }
}

impl Fragmenter {
    /// Create a fragmenter starting at sequence number 0
    pub fn new(max_payload_size: usize, payload_type: u8, ssrc: RtpSsrc) -> Self {
        Self::with_initial_sequence(max_payload_size, payload_type, ssrc, 0)
    }

    /// Create a fragmenter starting at an arbitrary sequence number
    pub fn with_initial_sequence(
        max_payload_size: usize,
        payload_type: u8,
        ssrc: RtpSsrc,
        initial_seq: RtpSequenceNumber,
    ) -> Self {
        Self {
            max_payload_size: max_payload_size.max(1),
            payload_type,
            ssrc,
            next_seq: initial_seq,
        }
    }

    /// Sequence number the next packet will carry
    pub fn next_sequence(&self) -> RtpSequenceNumber {
        self.next_seq
    }

    /// Split one frame into packets. All fragments share `timestamp` and
    /// borrow their payloads from `frame`; an empty frame yields no packets.
    pub fn fragment(&mut self, frame: Bytes, timestamp: RtpTimestamp) -> Vec<RtpPacket> {
        let count = frame.len().div_ceil(self.max_payload_size);
        let mut packets = Vec::with_capacity(count);

        let mut offset = 0;
        while offset < frame.len() {
            let end = (offset + self.max_payload_size).min(frame.len());

            let mut header = RtpHeader::new(self.payload_type, self.next_seq, timestamp, self.ssrc);
            header.marker = end == frame.len();
            packets.push(RtpPacket::new(header, frame.slice(offset..end)));

            self.next_seq = self.next_seq.wrapping_add(1);
            offset = end;
        }

        trace!("Fragmented {} byte frame into {} packets", frame.len(), packets.len());
        packets
    }
}

/// A frame rebuilt from one or more packets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledFrame {
    /// Frame bytes
    pub data: Bytes,

    /// Number of packets that contributed to the frame
    pub fragments: usize,
}

/// Receive-side scratch buffer that rebuilds frames from in-order packets
#[derive(Debug, Default)]
pub struct Reassembler {
    scratch: BytesMut,
    fragments: usize,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet. Returns the completed frame when the packet carries
    /// the marker bit and the scratch buffer is not empty.
    pub fn push(&mut self, packet: &RtpPacket) -> Option<AssembledFrame> {
        self.scratch.extend_from_slice(&packet.payload);
        self.fragments += 1;

        if !packet.header.marker {
            return None;
        }

        let fragments = std::mem::take(&mut self.fragments);
        if self.scratch.is_empty() {
            return None;
        }

        let data = self.scratch.split().freeze();
        Some(AssembledFrame { data, fragments })
    }

    /// Number of bytes waiting for a marker packet
    pub fn pending_bytes(&self) -> usize {
        self.scratch.len()
    }

    /// Drop any partially assembled frame
    pub fn reset(&mut self) {
        self.scratch.clear();
        self.fragments = 0;
    }
}
