//! Client session lifecycle
//!
//! [`Player`] drives one control connection and its RTP receive path. It
//! owns the session state, the sockets and the receive task; the delivery
//! buffer is the only thing it shares with the consumer.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use framecast_rtp_core::{DeliveryBuffer, LossStats, UdpRtpTransport};

use super::control::ControlConnection;
use super::receiver::{ReceiveLoop, ReceiverHandle, ReceiverState};
use super::session::{ClientSession, ReplyOutcome};
use crate::config::ClientConfig;
use crate::errors::{Error, Result};
use crate::protocol::Method;
use crate::state::SessionState;

pub struct Player {
    config: ClientConfig,
    media: String,
    session: ClientSession,
    control: Option<ControlConnection>,
    data: Option<Arc<UdpRtpTransport>>,
    receiver: Option<ReceiverHandle>,
    receiver_state: Option<ReceiverState>,
    buffer: Arc<DeliveryBuffer>,
    stats: watch::Sender<LossStats>,
}

impl Player {
    pub fn new(config: ClientConfig, media: impl Into<String>) -> Self {
        let buffer = Arc::new(DeliveryBuffer::new(config.buffer_capacity));
        let (stats, _) = watch::channel(LossStats::default());
        Self {
            config,
            media: media.into(),
            session: ClientSession::new(),
            control: None,
            data: None,
            receiver: None,
            receiver_state: Some(ReceiverState::new()),
            buffer,
            stats,
        }
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session_id(&self) -> u32 {
        self.session.session_id()
    }

    pub fn media(&self) -> &str {
        &self.media
    }

    pub fn is_connected(&self) -> bool {
        self.control.is_some()
    }

    /// Buffer the consumer drains
    pub fn buffer(&self) -> Arc<DeliveryBuffer> {
        self.buffer.clone()
    }

    /// Loss statistics as of the last completed frame
    pub fn loss_stats(&self) -> LossStats {
        self.stats.borrow().clone()
    }

    pub fn subscribe_stats(&self) -> watch::Receiver<LossStats> {
        self.stats.subscribe()
    }

    /// Local address of the RTP socket, once SETUP has bound it
    pub fn data_local_addr(&self) -> Option<SocketAddr> {
        self.data.as_ref().and_then(|d| d.local_addr().ok())
    }

    /// Open the control connection if it is not open yet
    pub async fn connect(&mut self) -> Result<()> {
        if self.control.is_none() {
            let control = ControlConnection::connect(self.config.server_address, self.config.reply_timeout()).await?;
            info!("Connected to {}", control.peer());
            self.control = Some(control);
        }
        Ok(())
    }

    /// Send one request and apply the matching reply
    async fn round_trip(&mut self, method: Method, client_port: Option<u16>) -> Result<()> {
        let request = self.session.prepare(method, &self.media, client_port)?;
        let control = self.control.as_mut().ok_or(Error::NotConnected)?;

        let response = control.round_trip(&request).await?;
        match self.session.accept_reply(&response)? {
            ReplyOutcome::Accepted(_) => Ok(()),
            ReplyOutcome::Stale => Err(Error::MalformedResponse(format!(
                "Reply CSeq {} does not match request",
                response.cseq
            ))),
        }
    }

    /// SETUP: bind the RTP socket, then ask the server for a session
    pub async fn setup(&mut self) -> Result<()> {
        if !self.session.allows(Method::Setup) {
            return Err(Error::sequence_violation(Method::Setup, self.state()));
        }
        if self.control.is_none() {
            return Err(Error::NotConnected);
        }

        // Bound before the request so the real port goes into client_port
        let data = match &self.data {
            Some(data) => data.clone(),
            None => Arc::new(UdpRtpTransport::bind(self.config.data_address()).await?),
        };
        let port = data.local_addr()?.port();

        self.round_trip(Method::Setup, Some(port)).await?;
        self.data = Some(data);
        info!("Session {} ready, receiving RTP on port {}", self.session_id(), port);
        Ok(())
    }

    /// PLAY: start the receive loop once the server agrees
    pub async fn play(&mut self) -> Result<()> {
        self.round_trip(Method::Play, None).await?;

        let data = self.data.clone().ok_or(Error::NotConnected)?;
        let state = self.receiver_state.take().unwrap_or_default();
        let receiver = ReceiveLoop::new(data, self.buffer.clone(), state)
            .with_recv_timeout(self.config.recv_timeout())
            .with_stats(self.stats.clone())
            .spawn(CancellationToken::new());
        self.receiver = Some(receiver);

        info!("Session {} playing", self.session_id());
        Ok(())
    }

    /// PAUSE: stop the receive loop once the server agrees
    pub async fn pause(&mut self) -> Result<()> {
        self.round_trip(Method::Pause, None).await?;
        self.stop_receiver().await;
        info!("Session {} paused", self.session_id());
        Ok(())
    }

    /// TEARDOWN: whatever the server answers, the client ends up in INIT
    /// with both connections closed
    pub async fn teardown(&mut self) -> Result<()> {
        self.stop_receiver().await;

        let result = if self.control.is_some() {
            self.round_trip(Method::Teardown, None).await
        } else {
            Ok(())
        };
        if let Err(e) = &result {
            warn!("TEARDOWN failed: {}", e);
        }

        self.close();
        info!("Session torn down");
        result
    }

    /// Tear down and start streaming `media` on a fresh session
    pub async fn switch_media(&mut self, media: impl Into<String>) -> Result<()> {
        self.restart(Some(media.into())).await
    }

    /// Tear down and stream the current media again from the start
    pub async fn replay(&mut self) -> Result<()> {
        self.restart(None).await
    }

    async fn restart(&mut self, media: Option<String>) -> Result<()> {
        self.stop_receiver().await;

        if self.control.is_some() && self.session.session_id() != 0 {
            if let Err(e) = self.round_trip(Method::Teardown, None).await {
                debug!("TEARDOWN before restart failed: {}", e);
            }
            tokio::time::sleep(self.config.teardown_grace()).await;
        }

        self.close();
        self.buffer.clear();
        self.receiver_state.get_or_insert_with(ReceiverState::new).reset();
        self.stats.send_replace(LossStats::default());
        if let Some(media) = media {
            self.media = media;
        }
        info!("Restarting with {:?}", self.media);

        let result: Result<()> = async {
            self.connect().await?;
            self.setup().await?;
            self.play().await
        }
        .await;

        if let Err(e) = &result {
            warn!("Restart with {:?} failed: {}", self.media, e);
            self.stop_receiver().await;
            self.close();
        }
        result
    }

    async fn stop_receiver(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            self.receiver_state = Some(receiver.stop().await);
        }
    }

    /// Drop both transports and forget the session
    fn close(&mut self) {
        self.control = None;
        self.data = None;
        self.session.reset();
    }
}
