use crate::RtpSequenceNumber;

/// Packet loss tracker for one received RTP stream
///
/// The gap to the previous sequence number is taken modulo 2^16, so the
/// 65535 -> 0 wrap is not counted as loss. A packet that arrives late
/// (sequence number below the previous one) shows up as a gap of almost
/// 2^16 packets; the tracker does not try to recognize reordering.
#[derive(Debug, Clone, Default)]
pub struct PacketLossTracker {
    /// Previous sequence number
    last_seq: Option<RtpSequenceNumber>,

    /// Number of packets actually received
    received: u64,

    /// Number of packets inferred lost from sequence gaps
    lost: u64,

    /// Loss rate in percent, as of the last completed frame
    loss_rate: f64,
}

impl PacketLossTracker {
    /// Create a new packet loss tracker
    pub fn new() -> Self {
        Self::default()
    }

    /// Process a packet with the given sequence number
    pub fn process(&mut self, seq: RtpSequenceNumber) -> PacketLossResult {
        self.received += 1;

        let Some(last) = self.last_seq.replace(seq) else {
            return PacketLossResult::FirstPacket { seq };
        };

        match gap_length(last, seq) {
            0 if seq == last => PacketLossResult::Duplicate { seq },
            0 => PacketLossResult::Sequential { seq },
            lost => {
                self.lost += lost as u64;
                PacketLossResult::Gap {
                    seq,
                    expected: last.wrapping_add(1),
                    lost,
                }
            }
        }
    }

    /// Recompute the loss rate; called once per completed frame
    pub fn refresh_loss_rate(&mut self) -> f64 {
        let total = self.received + self.lost;
        self.loss_rate = if total == 0 {
            0.0
        } else {
            self.lost as f64 / total as f64 * 100.0
        };
        self.loss_rate
    }

    /// Loss rate in percent as of the last refresh
    pub fn loss_rate(&self) -> f64 {
        self.loss_rate
    }

    /// Get packet loss statistics
    pub fn get_stats(&self) -> LossStats {
        LossStats {
            last_seq: self.last_seq,
            packets_received: self.received,
            packets_lost: self.lost,
            loss_rate: self.loss_rate,
        }
    }

    /// Reset the tracker
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Number of packets missing between `last` and `current`
pub fn gap_length(last: RtpSequenceNumber, current: RtpSequenceNumber) -> u16 {
    current.wrapping_sub(last).saturating_sub(1)
}

/// Result of processing a packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketLossResult {
    /// First packet in the stream
    FirstPacket { seq: RtpSequenceNumber },

    /// Packet arrived in sequence
    Sequential { seq: RtpSequenceNumber },

    /// Gap in sequence numbers (packet loss)
    Gap {
        seq: RtpSequenceNumber,
        expected: RtpSequenceNumber,
        lost: u16,
    },

    /// Same sequence number as the previous packet
    Duplicate { seq: RtpSequenceNumber },
}

/// Snapshot of the loss statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LossStats {
    /// Last sequence number seen
    pub last_seq: Option<RtpSequenceNumber>,

    /// Number of packets received
    pub packets_received: u64,

    /// Number of packets lost
    pub packets_lost: u64,

    /// Loss rate in percent
    pub loss_rate: f64,
}
