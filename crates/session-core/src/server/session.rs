//! Server-side session state machine
//!
//! A [`ServerSession`] is owned by the task serving one control
//! connection. Requests are applied one at a time; each returns the reply
//! to send, or `None` when the request is ignored.
//!
//! ```text
//! INIT --SETUP--> READY --PLAY--> PLAYING --PAUSE--> READY
//!   ^                                                  |
//!   +------------------- TEARDOWN (any state) ---------+
//! ```

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use framecast_rtp_core::{Fragmenter, UdpRtpTransport};

use super::scheduler::{SchedulerHandle, SchedulerOutput, SchedulerReport, StreamScheduler};
use crate::config::ServerConfig;
use crate::errors::{Error, Result};
use crate::media::{FrameSource, MediaCatalog};
use crate::protocol::{Method, Request, Response, StatusCode};
use crate::state::SessionState;

/// Range session ids are drawn from
pub const SESSION_ID_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

/// Session for one control connection
pub struct ServerSession {
    peer_ip: IpAddr,
    catalog: Arc<dyn MediaCatalog>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,

    state: SessionState,
    session_id: u32,
    media: Option<String>,
    client_endpoint: Option<SocketAddr>,
    source: Option<Box<dyn FrameSource>>,
    fragmenter: Option<Fragmenter>,
    transport: Option<Arc<UdpRtpTransport>>,
    scheduler: Option<SchedulerHandle>,
    last_report: Option<SchedulerReport>,
    closed: bool,
}

impl ServerSession {
    /// `shutdown` is the server-wide token; schedulers run on child tokens of it
    pub fn new(
        peer_ip: IpAddr,
        catalog: Arc<dyn MediaCatalog>,
        config: Arc<ServerConfig>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            peer_ip,
            catalog,
            config,
            shutdown,
            state: SessionState::Init,
            session_id: 0,
            media: None,
            client_endpoint: None,
            source: None,
            fragmenter: None,
            transport: None,
            scheduler: None,
            last_report: None,
            closed: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Current session id, 0 when no session exists
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    pub fn media(&self) -> Option<&str> {
        self.media.as_deref()
    }

    pub fn client_endpoint(&self) -> Option<SocketAddr> {
        self.client_endpoint
    }

    /// Report of the most recently stopped scheduler
    pub fn last_report(&self) -> Option<SchedulerReport> {
        self.last_report
    }

    /// True once TEARDOWN has been handled; the connection stops reading
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Local address of the RTP socket, once PLAY has opened it
    pub fn data_local_addr(&self) -> Option<SocketAddr> {
        self.transport.as_ref().and_then(|t| t.local_addr().ok())
    }

    /// Apply one request and return the reply to send, if any
    pub async fn handle_request(&mut self, request: &Request) -> Option<Response> {
        if let Err(e) = self.check_session(request) {
            debug!("Ignoring {} (CSeq {}): {}", request.method, request.cseq, e);
            return None;
        }

        let result = match (request.method, self.state) {
            (Method::Setup, SessionState::Init) => self.setup(request).await,
            (Method::Play, SessionState::Ready) => self.play(request).await,
            (Method::Pause, SessionState::Playing) => self.pause(request).await,
            (Method::Teardown, _) => Ok(self.teardown(request).await),
            (method, state) => Err(Error::sequence_violation(method, state)),
        };

        match result {
            Ok(response) => Some(response),
            Err(Error::MediaNotFound(media)) => {
                info!("Media {:?} not found for {}", media, self.peer_ip);
                Some(Response::not_found(request.cseq))
            }
            Err(e @ Error::ProtocolSequenceViolation { .. }) => {
                debug!("Ignoring request with CSeq {}: {}", request.cseq, e);
                None
            }
            Err(e) => {
                warn!("Dropping {} request with CSeq {}: {}", request.method, request.cseq, e);
                None
            }
        }
    }

    fn check_session(&self, request: &Request) -> Result<()> {
        match request.session {
            Some(actual) if self.session_id != 0 && actual != self.session_id => Err(Error::SessionMismatch {
                expected: self.session_id,
                actual,
            }),
            _ => Ok(()),
        }
    }

    async fn setup(&mut self, request: &Request) -> Result<Response> {
        let client_port = request.client_port.ok_or_else(|| {
            Error::MalformedRequest("SETUP without Transport client_port".to_string())
        })?;

        let source = self.catalog.open(&request.media).await?;

        self.session_id = rand::thread_rng().gen_range(SESSION_ID_RANGE);
        self.media = Some(request.media.clone());
        self.client_endpoint = Some(SocketAddr::new(self.peer_ip, client_port));
        self.source = Some(source);
        self.fragmenter.get_or_insert_with(|| {
            Fragmenter::new(self.config.max_payload_size, self.config.payload_type, self.config.ssrc)
        });
        self.state = SessionState::Ready;

        info!(
            "Session {} set up for {:?}, client endpoint {}",
            self.session_id, request.media, SocketAddr::new(self.peer_ip, client_port)
        );
        Ok(Response::ok(request.cseq, self.session_id))
    }

    async fn play(&mut self, request: &Request) -> Result<Response> {
        let destination = self
            .client_endpoint
            .ok_or_else(|| Error::sequence_violation(request.method, self.state))?;

        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => {
                let bind_ip = match self.peer_ip {
                    IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                };
                let transport = Arc::new(UdpRtpTransport::bind(SocketAddr::new(bind_ip, 0)).await?);
                self.transport = Some(transport.clone());
                transport
            }
        };

        let (Some(source), Some(fragmenter)) = (self.source.take(), self.fragmenter.take()) else {
            return Err(Error::Config(format!("Session {} has no frame source", self.session_id)));
        };

        let handle = StreamScheduler::new(self.session_id, source, fragmenter, transport, destination)
            .with_pacing_interval(self.config.pacing_interval())
            .with_progress_log_interval(self.config.progress_log_interval)
            .spawn(self.shutdown.child_token());

        self.scheduler = Some(handle);
        self.state = SessionState::Playing;
        debug!("Session {} READY -> PLAYING", self.session_id);
        Ok(Response::ok(request.cseq, self.session_id))
    }

    async fn pause(&mut self, request: &Request) -> Result<Response> {
        self.stop_scheduler().await;
        self.state = SessionState::Ready;
        debug!("Session {} PLAYING -> READY", self.session_id);
        Ok(Response::ok(request.cseq, self.session_id))
    }

    async fn teardown(&mut self, request: &Request) -> Response {
        let session = (self.session_id != 0).then_some(self.session_id);
        self.release().await;
        self.closed = true;
        info!("Session {:?} torn down", session);
        Response::new(StatusCode::OK, request.cseq, session)
    }

    async fn stop_scheduler(&mut self) {
        let Some(handle) = self.scheduler.take() else {
            return;
        };

        if let Some(SchedulerOutput { source, fragmenter, report }) = handle.stop().await {
            debug!("Session {} scheduler stopped: {:?}", self.session_id, report);
            self.source = Some(source);
            self.fragmenter = Some(fragmenter);
            self.last_report = Some(report);
        } else {
            error!("Session {} lost its frame source", self.session_id);
        }
    }

    /// Stop streaming and drop everything the session holds
    pub async fn release(&mut self) {
        self.stop_scheduler().await;
        if let Some(mut source) = self.source.take() {
            source.close();
        }
        self.transport = None;
        self.fragmenter = None;
        self.client_endpoint = None;
        self.media = None;
        self.session_id = 0;
        self.state = SessionState::Init;
    }
}
