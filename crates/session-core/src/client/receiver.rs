//! RTP receive loop
//!
//! While PLAYING one task reads datagrams, feeds them to the loss tracker
//! and the reassembler, and puts every completed frame into the delivery
//! buffer. Reassembly and loss state live in [`ReceiverState`], which the
//! task owns while it runs and returns when it stops; a later PLAY picks
//! up where the previous run left off.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use framecast_rtp_core::transport::RecvOutcome;
use framecast_rtp_core::{
    DeliveredFrame, DeliveryBuffer, LossStats, PacketLossResult, PacketLossTracker, Reassembler,
    UdpRtpTransport,
};

/// Reassembly and loss accounting carried between receive loop runs
#[derive(Debug, Default)]
pub struct ReceiverState {
    pub reassembler: Reassembler,
    pub tracker: PacketLossTracker,
}

impl ReceiverState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop any partial frame and zero the loss counters
    pub fn reset(&mut self) {
        self.reassembler.reset();
        self.tracker.reset();
    }
}

pub struct ReceiveLoop {
    transport: Arc<UdpRtpTransport>,
    buffer: Arc<DeliveryBuffer>,
    state: ReceiverState,
    recv_timeout: Duration,
    stats: Option<watch::Sender<LossStats>>,
}

impl ReceiveLoop {
    pub fn new(transport: Arc<UdpRtpTransport>, buffer: Arc<DeliveryBuffer>, state: ReceiverState) -> Self {
        Self {
            transport,
            buffer,
            state,
            recv_timeout: Duration::from_millis(500),
            stats: None,
        }
    }

    pub fn with_recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = timeout;
        self
    }

    /// Publish loss statistics after every completed frame
    pub fn with_stats(mut self, stats: watch::Sender<LossStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    pub fn spawn(self, token: CancellationToken) -> ReceiverHandle {
        let handle = tokio::spawn(self.run(token.clone()));
        ReceiverHandle { token, handle }
    }

    pub async fn run(mut self, token: CancellationToken) -> ReceiverState {
        debug!("Receive loop started");

        loop {
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                outcome = self.transport.recv_packet(self.recv_timeout) => outcome,
            };

            match outcome {
                Ok(RecvOutcome::Packet(packet, _)) => self.on_packet(&packet),
                Ok(RecvOutcome::Malformed { size, source }) => {
                    debug!("Dropped {} byte datagram from {}", size, source);
                }
                Ok(RecvOutcome::TimedOut) => {}
                Err(e) => {
                    error!("Receive loop stopped: {}", e);
                    break;
                }
            }
        }

        debug!("Receive loop stopped, stats {:?}", self.state.tracker.get_stats());
        self.state
    }

    fn on_packet(&mut self, packet: &framecast_rtp_core::RtpPacket) {
        match self.state.tracker.process(packet.header.sequence_number) {
            PacketLossResult::Gap { expected, lost, .. } => {
                debug!("Sequence gap: expected {}, got {} ({} lost)", expected, packet.header.sequence_number, lost);
            }
            result => trace!("{:?}", result),
        }

        if let Some(frame) = self.state.reassembler.push(packet) {
            let loss_rate = self.state.tracker.refresh_loss_rate();
            trace!("Frame of {} bytes from {} fragments", frame.data.len(), frame.fragments);
            self.buffer.put(DeliveredFrame::new(frame.data, frame.fragments, loss_rate));

            if let Some(stats) = &self.stats {
                stats.send_replace(self.state.tracker.get_stats());
            }
        }
    }
}

/// A running receive loop
pub struct ReceiverHandle {
    token: CancellationToken,
    handle: JoinHandle<ReceiverState>,
}

impl ReceiverHandle {
    /// Cancel and wait; a panicked task yields fresh state
    pub async fn stop(self) -> ReceiverState {
        self.token.cancel();
        match self.handle.await {
            Ok(state) => state,
            Err(e) => {
                error!("Receive task failed: {}", e);
                ReceiverState::new()
            }
        }
    }
}
