use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

/// Default number of frames held by the delivery buffer
pub const DEFAULT_DELIVERY_BUFFER_CAPACITY: usize = 300;

/// A completed frame waiting for the consumer
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveredFrame {
    /// Frame bytes (an undecoded image)
    pub data: Bytes,

    /// Number of RTP packets the frame was assembled from
    pub fragments: usize,

    /// Stream loss rate in percent when the frame completed
    pub loss_rate: f64,
}

impl DeliveredFrame {
    pub fn new(data: Bytes, fragments: usize, loss_rate: f64) -> Self {
        Self { data, fragments, loss_rate }
    }
}

/// Counters for the delivery buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryBufferStats {
    /// Frames accepted by `put`
    pub frames_put: u64,

    /// Frames evicted to make room for newer ones
    pub frames_dropped: u64,

    /// Frames currently queued
    pub queued: usize,
}

/// Bounded drop-oldest FIFO shared by one producer and one consumer
///
/// Neither side ever waits on the other: `put` evicts the oldest entry when
/// full and `get` returns `None` when empty. All operations take the
/// internal lock briefly, so `clear` is atomic with respect to both sides.
#[derive(Debug)]
pub struct DeliveryBuffer {
    frames: Mutex<VecDeque<DeliveredFrame>>,
    capacity: usize,
    frames_put: AtomicU64,
    frames_dropped: AtomicU64,
}

impl Default for DeliveryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_DELIVERY_BUFFER_CAPACITY)
    }
}

impl DeliveryBuffer {
    /// Create a buffer holding at most `capacity` frames (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            frames_put: AtomicU64::new(0),
            frames_dropped: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame, evicting the oldest one if the buffer is full
    pub fn put(&self, frame: DeliveredFrame) {
        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            frames.pop_front();
            self.frames_dropped.fetch_add(1, Ordering::Relaxed);
            trace!("Delivery buffer full, dropped oldest frame");
        }
        frames.push_back(frame);
        self.frames_put.fetch_add(1, Ordering::Relaxed);
    }

    /// Dequeue the oldest frame without waiting
    pub fn get(&self) -> Option<DeliveredFrame> {
        self.frames.lock().pop_front()
    }

    /// Discard every queued frame
    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Number of queued frames
    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    /// Alias of [`len`](Self::len)
    pub fn qsize(&self) -> usize {
        self.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of frames evicted so far
    pub fn dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> DeliveryBufferStats {
        DeliveryBufferStats {
            frames_put: self.frames_put.load(Ordering::Relaxed),
            frames_dropped: self.dropped(),
            queued: self.len(),
        }
    }
}
