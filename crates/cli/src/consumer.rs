//! Headless frame consumer
//!
//! Stands in for a display: drains the delivery buffer at a fixed rate,
//! holds off until enough frames are buffered, and reports end of stream
//! after a run of empty polls.

use std::sync::Arc;
use std::time::Duration;

use framecast_rtp_core::{DeliveredFrame, DeliveryBuffer};

#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    pub poll_interval: Duration,
    /// Frames to accumulate before the first frame is taken
    pub prebuffer: usize,
    /// Consecutive polls with an unchanged, non-empty buffer after which a
    /// short clip is played without reaching `prebuffer`
    pub stall_polls: u32,
    /// Consecutive empty polls after which the stream counts as ended
    pub max_empty_polls: u32,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(40),
            prebuffer: 60,
            stall_polls: 10,
            max_empty_polls: 50,
        }
    }
}

#[derive(Debug)]
pub enum PollEvent {
    Frame(DeliveredFrame),
    Buffering(usize),
    Empty,
    EndOfStream,
}

pub struct FrameConsumer {
    buffer: Arc<DeliveryBuffer>,
    settings: ConsumerSettings,
    buffering: bool,
    last_len: usize,
    unchanged_polls: u32,
    empty_polls: u32,
    frames_taken: u64,
}

impl FrameConsumer {
    pub fn new(buffer: Arc<DeliveryBuffer>, settings: ConsumerSettings) -> Self {
        Self {
            buffer,
            settings,
            buffering: true,
            last_len: 0,
            unchanged_polls: 0,
            empty_polls: 0,
            frames_taken: 0,
        }
    }

    pub fn settings(&self) -> &ConsumerSettings {
        &self.settings
    }

    pub fn frames_taken(&self) -> u64 {
        self.frames_taken
    }

    /// Start over, e.g. after a replay
    pub fn reset(&mut self) {
        self.buffering = true;
        self.last_len = 0;
        self.unchanged_polls = 0;
        self.empty_polls = 0;
    }

    pub fn poll(&mut self) -> PollEvent {
        if self.buffering {
            let len = self.buffer.len();
            if len > 0 && len == self.last_len {
                self.unchanged_polls += 1;
            } else {
                self.unchanged_polls = 0;
            }
            self.last_len = len;

            // A short clip may never reach the threshold
            let stalled = self.unchanged_polls >= self.settings.stall_polls;
            if len < self.settings.prebuffer && !stalled {
                return self.idle(len);
            }
            self.buffering = false;
        }

        match self.buffer.get() {
            Some(frame) => {
                self.empty_polls = 0;
                self.frames_taken += 1;
                PollEvent::Frame(frame)
            }
            None => self.idle(0),
        }
    }

    fn idle(&mut self, buffered: usize) -> PollEvent {
        if buffered == 0 {
            self.empty_polls += 1;
            if self.empty_polls > self.settings.max_empty_polls {
                return PollEvent::EndOfStream;
            }
        } else {
            self.empty_polls = 0;
        }

        if self.buffering {
            PollEvent::Buffering(buffered)
        } else {
            PollEvent::Empty
        }
    }
}
