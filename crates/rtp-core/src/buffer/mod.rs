//! Frame buffering between the network receive task and the consumer
//!
//! Completed frames are queued in a bounded [`DeliveryBuffer`]. When the
//! consumer falls behind, the oldest frame is dropped so latency stays
//! bounded instead of the receive task stalling.

pub mod delivery;

pub use delivery::{DeliveredFrame, DeliveryBuffer, DeliveryBufferStats, DEFAULT_DELIVERY_BUFFER_CAPACITY};
