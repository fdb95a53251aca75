//! Paced frame sender
//!
//! One scheduler task runs per PLAYING session. It owns the frame source
//! and the fragmenter while it runs and hands both back when it exits, so
//! the session never shares them with a running task. The fragmenter
//! carries the RTP sequence counter, which therefore continues across
//! PAUSE/PLAY.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use framecast_rtp_core::{Fragmenter, RtpHeader, UdpRtpTransport};

use crate::media::FrameSource;

/// Why a scheduler stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    /// Cancelled by PAUSE, TEARDOWN or shutdown
    Cancelled,

    /// The frame source ran out of frames
    EndOfMedia,
}

/// Counters for one scheduler run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerReport {
    pub frames_sent: u64,
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub exit: SchedulerExit,
}

/// What the scheduler hands back on exit
pub struct SchedulerOutput {
    pub source: Box<dyn FrameSource>,
    pub fragmenter: Fragmenter,
    pub report: SchedulerReport,
}

/// Sends one frame per pacing interval to a single destination
pub struct StreamScheduler {
    session_id: u32,
    source: Box<dyn FrameSource>,
    fragmenter: Fragmenter,
    transport: Arc<UdpRtpTransport>,
    destination: SocketAddr,
    pacing_interval: Duration,
    progress_log_interval: u64,
}

impl StreamScheduler {
    pub fn new(
        session_id: u32,
        source: Box<dyn FrameSource>,
        fragmenter: Fragmenter,
        transport: Arc<UdpRtpTransport>,
        destination: SocketAddr,
    ) -> Self {
        Self {
            session_id,
            source,
            fragmenter,
            transport,
            destination,
            pacing_interval: Duration::from_millis(33),
            progress_log_interval: 100,
        }
    }

    pub fn with_pacing_interval(mut self, interval: Duration) -> Self {
        self.pacing_interval = interval;
        self
    }

    pub fn with_progress_log_interval(mut self, frames: u64) -> Self {
        self.progress_log_interval = frames;
        self
    }

    /// Run on a new task until `token` is cancelled or the media ends
    pub fn spawn(self, token: CancellationToken) -> SchedulerHandle {
        let handle = tokio::spawn(self.run(token.clone()));
        SchedulerHandle { token, handle }
    }

    pub async fn run(mut self, token: CancellationToken) -> SchedulerOutput {
        info!(
            "Session {} streaming to {} every {:?}",
            self.session_id, self.destination, self.pacing_interval
        );

        let mut report = SchedulerReport {
            frames_sent: 0,
            packets_sent: 0,
            bytes_sent: 0,
            send_errors: 0,
            exit: SchedulerExit::Cancelled,
        };

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("Session {} scheduler cancelled", self.session_id);
                    report.exit = SchedulerExit::Cancelled;
                    break;
                }
                _ = tokio::time::sleep(self.pacing_interval) => {}
            }

            let Some(frame) = self.source.next_frame() else {
                info!(
                    "Session {} reached end of media after {} frames",
                    self.session_id,
                    self.source.frame_number()
                );
                report.exit = SchedulerExit::EndOfMedia;
                break;
            };

            let timestamp = RtpHeader::now_timestamp();
            let frame_len = frame.len();
            let packets = self.fragmenter.fragment(frame, timestamp);
            trace!(
                "Frame {} ({} bytes) split into {} packets",
                self.source.frame_number(),
                frame_len,
                packets.len()
            );

            for packet in &packets {
                match self.transport.send_packet(packet, self.destination).await {
                    Ok(sent) => {
                        report.packets_sent += 1;
                        report.bytes_sent += sent as u64;
                    }
                    Err(e) => {
                        report.send_errors += 1;
                        warn!(
                            "Session {} failed to send packet seq={}: {}",
                            self.session_id, packet.header.sequence_number, e
                        );
                    }
                }
            }

            report.frames_sent += 1;
            if self.progress_log_interval > 0 && report.frames_sent % self.progress_log_interval == 0 {
                info!(
                    "Session {} sent {} frames ({} packets, next seq {})",
                    self.session_id,
                    report.frames_sent,
                    report.packets_sent,
                    self.fragmenter.next_sequence()
                );
            }
        }

        SchedulerOutput {
            source: self.source,
            fragmenter: self.fragmenter,
            report,
        }
    }
}

/// A running scheduler task
pub struct SchedulerHandle {
    token: CancellationToken,
    handle: JoinHandle<SchedulerOutput>,
}

impl SchedulerHandle {
    /// Cancel the task and wait for it to hand back its state
    pub async fn stop(self) -> Option<SchedulerOutput> {
        self.token.cancel();
        match self.handle.await {
            Ok(output) => Some(output),
            Err(e) => {
                error!("Scheduler task failed: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::VecFrameSource;
    use bytes::Bytes;
    use framecast_rtp_core::transport::RecvOutcome;

    fn init_test_logging() {
        let _ = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    }

    async fn transports() -> (Arc<UdpRtpTransport>, UdpRtpTransport) {
        let sender = UdpRtpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let receiver = UdpRtpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        (Arc::new(sender), receiver)
    }

    #[tokio::test]
    async fn test_streams_until_end_of_media() {
        init_test_logging();
        let (sender, receiver) = transports().await;
        let frames = vec![Bytes::from(vec![1u8; 3000]), Bytes::from_static(b"small")];

        let scheduler = StreamScheduler::new(
            123456,
            Box::new(VecFrameSource::new(frames)),
            Fragmenter::default(),
            sender,
            receiver.local_addr().unwrap(),
        )
        .with_pacing_interval(Duration::from_millis(1));

        let output = scheduler.run(CancellationToken::new()).await;
        assert_eq!(output.report.exit, SchedulerExit::EndOfMedia);
        assert_eq!(output.report.frames_sent, 2);
        assert_eq!(output.report.packets_sent, 4);
        assert_eq!(output.report.send_errors, 0);
        assert_eq!(output.fragmenter.next_sequence(), 4);

        let mut markers = Vec::new();
        for _ in 0..4 {
            match receiver.recv_packet(Duration::from_secs(2)).await.unwrap() {
                RecvOutcome::Packet(packet, _) => markers.push(packet.header.marker),
                other => panic!("expected packet, got {:?}", other),
            }
        }
        assert_eq!(markers, vec![false, false, true, true]);
    }

    #[tokio::test]
    async fn test_cancel_returns_state() {
        init_test_logging();
        let (sender, receiver) = transports().await;
        let frames = (0..1000).map(|_| Bytes::from_static(b"frame")).collect();

        let handle = StreamScheduler::new(
            1,
            Box::new(VecFrameSource::new(frames)),
            Fragmenter::with_initial_sequence(1400, 26, 0, 65530),
            sender,
            receiver.local_addr().unwrap(),
        )
        .with_pacing_interval(Duration::from_millis(5))
        .spawn(CancellationToken::new());

        tokio::time::sleep(Duration::from_millis(60)).await;
        let output = handle.stop().await.unwrap();

        assert_eq!(output.report.exit, SchedulerExit::Cancelled);
        assert!(output.report.frames_sent > 0);
        assert_eq!(output.source.frame_number(), output.report.frames_sent);
        assert_eq!(
            output.fragmenter.next_sequence(),
            65530u16.wrapping_add(output.report.frames_sent as u16)
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_first_frame() {
        let (sender, receiver) = transports().await;
        let token = CancellationToken::new();
        token.cancel();

        let output = StreamScheduler::new(
            1,
            Box::new(VecFrameSource::new(vec![Bytes::from_static(b"x")])),
            Fragmenter::default(),
            sender,
            receiver.local_addr().unwrap(),
        )
        .run(token)
        .await;

        assert_eq!(output.report.frames_sent, 0);
        assert_eq!(output.report.exit, SchedulerExit::Cancelled);
    }
}
