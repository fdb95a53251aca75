//! RTP Statistics Module
//!
//! Receive-side packet loss accounting based on RTP sequence numbers.

pub mod loss;

pub use loss::{gap_length, LossStats, PacketLossResult, PacketLossTracker};
