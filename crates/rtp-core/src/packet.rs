//! RTP packet codec
//!
//! Only the fixed 12-byte header is produced and consumed. The CSRC count,
//! padding and extension fields are carried verbatim and never interpreted:
//! everything after the first 12 bytes is payload.

use bitvec::prelude::*;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::Error;
use crate::{Result, RtpSequenceNumber, RtpSsrc, RtpTimestamp};

/// RTP protocol version
pub const RTP_VERSION: u8 = 2;

/// Padding flag position in the first byte (MSB first)
pub const RTP_PADDING_FLAG: usize = 2;

/// Extension flag position in the first byte (MSB first)
pub const RTP_EXTENSION_FLAG: usize = 3;

/// Marker bit position in the second byte (MSB first)
pub const RTP_MARKER_FLAG: usize = 0;

/// Size of the fixed RTP header
pub const RTP_HEADER_SIZE: usize = 12;

/// RTP header (fixed part only, RFC 3550 section 5.1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpHeader {
    /// RTP version (2 bits on the wire)
    pub version: u8,

    /// Padding flag
    pub padding: bool,

    /// Extension flag
    pub extension: bool,

    /// CSRC count (4 bits on the wire)
    pub cc: u8,

    /// Marker bit, set on the last fragment of a frame
    pub marker: bool,

    /// Payload type (7 bits on the wire)
    pub payload_type: u8,

    /// Sequence number
    pub sequence_number: RtpSequenceNumber,

    /// Timestamp
    pub timestamp: RtpTimestamp,

    /// Synchronization source identifier
    pub ssrc: RtpSsrc,
}

impl Default for RtpHeader {
    fn default() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

impl RtpHeader {
    /// Create a new RTP header with default flags
    pub fn new(payload_type: u8, sequence_number: RtpSequenceNumber,
               timestamp: RtpTimestamp, ssrc: RtpSsrc) -> Self {
        Self {
            version: RTP_VERSION,
            padding: false,
            extension: false,
            cc: 0,
            marker: false,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
        }
    }

    /// Wall-clock timestamp in whole seconds, truncated to 32 bits
    pub fn now_timestamp() -> RtpTimestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as RtpTimestamp)
            .unwrap_or(0)
    }

    /// Parse the fixed header from the start of `data`
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < RTP_HEADER_SIZE {
            return Err(Error::MalformedPacket {
                required: RTP_HEADER_SIZE,
                available: data.len(),
            });
        }

        // First byte: version (2 bits), padding (1 bit), extension (1 bit), CSRC count (4 bits)
        let first_byte = data[0];
        let bits = first_byte.view_bits::<Msb0>();
        let version = first_byte >> 6;
        let padding = bits[RTP_PADDING_FLAG];
        let extension = bits[RTP_EXTENSION_FLAG];
        let cc = first_byte & 0x0F;

        // Second byte: marker (1 bit), payload type (7 bits)
        let second_byte = data[1];
        let marker = second_byte.view_bits::<Msb0>()[RTP_MARKER_FLAG];
        let payload_type = second_byte & 0x7F;

        let sequence_number = u16::from_be_bytes([data[2], data[3]]);
        let timestamp = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let ssrc = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);

        Ok(Self {
            version,
            padding,
            extension,
            cc,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
        })
    }

    /// Serialize the header, masking every field to its wire width
    pub fn serialize(&self, buf: &mut BytesMut) {
        buf.reserve(RTP_HEADER_SIZE);

        let mut first_byte = 0u8;
        first_byte |= (self.version & 0x03) << 6;
        if self.padding {
            first_byte |= 1 << 5;
        }
        if self.extension {
            first_byte |= 1 << 4;
        }
        first_byte |= self.cc & 0x0F;
        buf.put_u8(first_byte);

        let mut second_byte = self.payload_type & 0x7F;
        if self.marker {
            second_byte |= 1 << 7;
        }
        buf.put_u8(second_byte);

        buf.put_u16(self.sequence_number);
        buf.put_u32(self.timestamp);
        buf.put_u32(self.ssrc);
    }
}

/// RTP packet: fixed header plus opaque payload
#[derive(Clone, PartialEq, Eq)]
pub struct RtpPacket {
    /// RTP header
    pub header: RtpHeader,

    /// Payload data
    pub payload: Bytes,
}

impl RtpPacket {
    /// Create a new RTP packet
    pub fn new(header: RtpHeader, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Create a new RTP packet with basic parameters
    pub fn new_with_payload(
        payload_type: u8,
        sequence_number: RtpSequenceNumber,
        timestamp: RtpTimestamp,
        ssrc: RtpSsrc,
        payload: Bytes,
    ) -> Self {
        let header = RtpHeader::new(payload_type, sequence_number, timestamp, ssrc);
        Self { header, payload }
    }

    /// Get the total size of the packet in bytes
    pub fn size(&self) -> usize {
        RTP_HEADER_SIZE + self.payload.len()
    }

    /// Parse an RTP packet from a received datagram
    pub fn parse(data: &[u8]) -> Result<Self> {
        let header = RtpHeader::parse(data)?;
        let payload = Bytes::copy_from_slice(&data[RTP_HEADER_SIZE..]);
        Ok(Self { header, payload })
    }

    /// Serialize the packet to bytes
    pub fn serialize(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.size());
        self.header.serialize(&mut buf);
        buf.put_slice(&self.payload);
        buf.freeze()
    }
}

impl fmt::Debug for RtpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtpPacket")
            .field("header", &self.header)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// Encode a single packet. Integer fields wrap to their wire width; a
/// missing timestamp is taken from the wall clock.
pub fn encode(
    sequence_number: u32,
    marker: bool,
    payload_type: u8,
    ssrc: RtpSsrc,
    payload: &[u8],
    timestamp: Option<u64>,
) -> Bytes {
    let timestamp = timestamp
        .map(|ts| ts as RtpTimestamp)
        .unwrap_or_else(RtpHeader::now_timestamp);
    let mut header = RtpHeader::new(payload_type, sequence_number as RtpSequenceNumber, timestamp, ssrc);
    header.marker = marker;
    RtpPacket::new(header, Bytes::copy_from_slice(payload)).serialize()
}

/// Decode a received datagram
pub fn decode(data: &[u8]) -> Result<RtpPacket> {
    RtpPacket::parse(data)
}

/// Hex dump of raw bytes for trace logging
pub fn hex_dump(data: &[u8]) -> String {
    let mut output = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            output.push(' ');
        }
        output.push_str(&format!("{:02x}", byte));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let mut header = RtpHeader::new(26, 0x1234, 0xdeadbeef, 0x01020304);
        header.marker = true;

        let mut buf = BytesMut::new();
        header.serialize(&mut buf);

        assert_eq!(buf.len(), RTP_HEADER_SIZE);
        assert_eq!(
            &buf[..],
            &[0x80, 0x80 | 26, 0x12, 0x34, 0xde, 0xad, 0xbe, 0xef, 0x01, 0x02, 0x03, 0x04]
        );
    }

    #[test]
    fn test_parse_real_world_packet() {
        // 0x80 = version 2, no padding, no extension, 0 CSRCs
        // 0x9a = marker set, PT 26
        let packet_data = [
            0x80, 0x9a, 0xfd, 0x70, 0x00, 0x00, 0x00, 0x07,
            0x00, 0x00, 0x00, 0x00, 0xff, 0xd8, 0xff, 0xd9,
        ];

        let parsed = RtpPacket::parse(&packet_data).unwrap();
        assert_eq!(parsed.header.version, 2);
        assert!(parsed.header.marker);
        assert_eq!(parsed.header.payload_type, 26);
        assert_eq!(parsed.header.sequence_number, 0xfd70);
        assert_eq!(parsed.header.timestamp, 7);
        assert_eq!(parsed.header.ssrc, 0);
        assert_eq!(parsed.payload.as_ref(), &[0xff, 0xd8, 0xff, 0xd9]);
    }

    #[test]
    fn test_flags_are_reported_not_interpreted() {
        // Padding, extension and CC=3 set, yet the payload is everything after byte 12
        let mut data = vec![0xb3, 0x1a, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0];
        data.extend_from_slice(b"abc");

        let parsed = decode(&data).unwrap();
        assert!(parsed.header.padding);
        assert!(parsed.header.extension);
        assert_eq!(parsed.header.cc, 3);
        assert_eq!(parsed.payload.as_ref(), b"abc");
    }

    #[test]
    fn test_decode_short_input() {
        let err = decode(&[0x80, 0x1a, 0x00]).unwrap_err();
        match err {
            Error::MalformedPacket { required, available } => {
                assert_eq!(required, 12);
                assert_eq!(available, 3);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_header_only_packet() {
        let wire = encode(5, false, 26, 9, &[], Some(100));
        assert_eq!(wire.len(), RTP_HEADER_SIZE);

        let parsed = decode(&wire).unwrap();
        assert!(parsed.payload.is_empty());
        assert_eq!(parsed.header.sequence_number, 5);
    }

    #[test]
    fn test_encode_masks_field_widths() {
        let wire = encode(0x1_0005, true, 0xff, 1, b"x", Some(0x1_0000_0002));
        let parsed = decode(&wire).unwrap();

        assert_eq!(parsed.header.sequence_number, 5);
        assert_eq!(parsed.header.timestamp, 2);
        assert_eq!(parsed.header.payload_type, 0x7f);
        assert!(parsed.header.marker);
    }

    #[test]
    fn test_encode_defaults_timestamp_to_now() {
        let before = RtpHeader::now_timestamp();
        let parsed = decode(&encode(1, false, 26, 0, b"frame", None)).unwrap();
        let after = RtpHeader::now_timestamp();

        assert!(parsed.header.timestamp >= before && parsed.header.timestamp <= after);
    }

    #[test]
    fn test_hex_dump() {
        assert_eq!(hex_dump(&[0x80, 0x1a, 0x00]), "80 1a 00");
        assert_eq!(hex_dump(&[]), "");
    }
}
