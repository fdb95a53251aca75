//! Client-side mirror of the session state machine
//!
//! The client only issues a request when its local state allows it, and
//! only changes state when a matching successful reply arrives.

use tracing::debug;

use crate::errors::{Error, Result};
use crate::protocol::{Method, Request, Response, StatusCode};
use crate::state::SessionState;

/// What became of a reply handed to [`ClientSession::accept_reply`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// Reply matched the outstanding request and was applied
    Accepted(Method),

    /// Reply to an older request; keep waiting
    Stale,
}

#[derive(Debug, Clone, Default)]
pub struct ClientSession {
    state: SessionState,
    cseq: u32,
    session_id: u32,
    pending: Option<(Method, u32)>,
}

impl ClientSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Session id assigned by the server, 0 before the first SETUP reply
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// CSeq of the last request built
    pub fn cseq(&self) -> u32 {
        self.cseq
    }

    pub fn allows(&self, method: Method) -> bool {
        matches!(
            (method, self.state),
            (Method::Setup, SessionState::Init)
                | (Method::Play, SessionState::Ready)
                | (Method::Pause, SessionState::Playing)
                | (Method::Teardown, _)
        )
    }

    /// Build the next request for `method`, bumping CSeq
    pub fn prepare(&mut self, method: Method, media: &str, client_port: Option<u16>) -> Result<Request> {
        if !self.allows(method) {
            return Err(Error::sequence_violation(method, self.state));
        }

        self.cseq = self.cseq.wrapping_add(1);
        let mut request = Request::new(method, media, self.cseq);
        if method == Method::Setup {
            let port = client_port
                .ok_or_else(|| Error::MalformedRequest("SETUP needs a client port".to_string()))?;
            request = request.with_client_port(port);
        }
        if self.session_id != 0 {
            request = request.with_session(self.session_id);
        }

        self.pending = Some((method, self.cseq));
        Ok(request)
    }

    /// Apply a reply to the outstanding request
    pub fn accept_reply(&mut self, response: &Response) -> Result<ReplyOutcome> {
        let Some((method, cseq)) = self.pending else {
            return Ok(ReplyOutcome::Stale);
        };
        if response.cseq != cseq {
            debug!("Ignoring reply with CSeq {} (waiting for {})", response.cseq, cseq);
            return Ok(ReplyOutcome::Stale);
        }
        self.pending = None;

        if !response.status.is_success() {
            return Err(match response.status {
                StatusCode::NOT_FOUND => Error::MediaNotFound(format!("{} rejected with 404", method)),
                status => Error::RequestFailed {
                    code: status.as_u16(),
                    reason: response.reason.clone(),
                },
            });
        }

        match (self.session_id, response.session) {
            (0, Some(id)) => self.session_id = id,
            (expected, Some(actual)) if expected != actual => {
                return Err(Error::SessionMismatch { expected, actual });
            }
            // TEARDOWN before any SETUP is answered without a session
            (0, None) if method == Method::Teardown => {}
            (_, None) => {
                return Err(Error::MissingSession {
                    method: method.to_string(),
                });
            }
            _ => {}
        }

        let next = match method {
            Method::Setup | Method::Pause => SessionState::Ready,
            Method::Play => SessionState::Playing,
            Method::Teardown => SessionState::Init,
        };
        debug!("{} accepted: {} -> {}", method, self.state, next);
        self.state = next;
        Ok(ReplyOutcome::Accepted(method))
    }

    /// Forget the session: state INIT, CSeq and session id back to 0
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_follow_local_state() {
        let mut session = ClientSession::new();
        assert!(matches!(
            session.prepare(Method::Play, "m", None),
            Err(Error::ProtocolSequenceViolation { .. })
        ));
        assert_eq!(session.cseq(), 0);

        let setup = session.prepare(Method::Setup, "m", Some(25000)).unwrap();
        assert_eq!(setup.cseq, 1);
        assert_eq!(setup.client_port, Some(25000));
        assert_eq!(setup.session, None);

        session.accept_reply(&Response::ok(1, 424242)).unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.session_id(), 424242);

        let play = session.prepare(Method::Play, "m", None).unwrap();
        assert_eq!(play.cseq, 2);
        assert_eq!(play.session, Some(424242));
        assert_eq!(session.accept_reply(&Response::ok(2, 424242)).unwrap(), ReplyOutcome::Accepted(Method::Play));
        assert_eq!(session.state(), SessionState::Playing);

        session.prepare(Method::Pause, "m", None).unwrap();
        session.accept_reply(&Response::ok(3, 424242)).unwrap();
        assert_eq!(session.state(), SessionState::Ready);

        session.prepare(Method::Teardown, "m", None).unwrap();
        session.accept_reply(&Response::ok(4, 424242)).unwrap();
        assert_eq!(session.state(), SessionState::Init);
    }

    #[test]
    fn test_stale_reply_is_ignored() {
        let mut session = ClientSession::new();
        session.prepare(Method::Setup, "m", Some(1)).unwrap();
        assert_eq!(session.accept_reply(&Response::ok(7, 111111)).unwrap(), ReplyOutcome::Stale);
        assert_eq!(session.state(), SessionState::Init);
        assert_eq!(session.session_id(), 0);
    }

    #[test]
    fn test_not_found_leaves_state() {
        let mut session = ClientSession::new();
        session.prepare(Method::Setup, "m", Some(1)).unwrap();
        assert!(matches!(session.accept_reply(&Response::not_found(1)), Err(Error::MediaNotFound(_))));
        assert_eq!(session.state(), SessionState::Init);

        session.prepare(Method::Setup, "m", Some(1)).unwrap();
        let failed = Response::new(StatusCode::INTERNAL_SERVER_ERROR, 2, None);
        assert!(matches!(
            session.accept_reply(&failed),
            Err(Error::RequestFailed { code: 500, .. })
        ));
    }

    #[test]
    fn test_session_mismatch() {
        let mut session = ClientSession::new();
        session.prepare(Method::Setup, "m", Some(1)).unwrap();
        session.accept_reply(&Response::ok(1, 123456)).unwrap();

        session.prepare(Method::Play, "m", None).unwrap();
        assert!(matches!(
            session.accept_reply(&Response::ok(2, 654321)),
            Err(Error::SessionMismatch { expected: 123456, actual: 654321 })
        ));
        assert_eq!(session.state(), SessionState::Ready);
    }

    #[test]
    fn test_reply_without_session_is_rejected() {
        let mut session = ClientSession::new();
        session.prepare(Method::Setup, "m", Some(1)).unwrap();
        assert!(matches!(
            session.accept_reply(&Response::new(StatusCode::OK, 1, None)),
            Err(Error::MissingSession { .. })
        ));
        assert_eq!(session.state(), SessionState::Init);
        assert_eq!(session.session_id(), 0);

        session.prepare(Method::Setup, "m", Some(1)).unwrap();
        session.accept_reply(&Response::ok(2, 123456)).unwrap();

        session.prepare(Method::Play, "m", None).unwrap();
        assert!(matches!(
            session.accept_reply(&Response::new(StatusCode::OK, 3, None)),
            Err(Error::MissingSession { .. })
        ));
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.session_id(), 123456);
    }

    #[test]
    fn test_teardown_before_setup_needs_no_session() {
        let mut session = ClientSession::new();
        session.prepare(Method::Teardown, "m", None).unwrap();
        assert_eq!(
            session.accept_reply(&Response::new(StatusCode::OK, 1, None)).unwrap(),
            ReplyOutcome::Accepted(Method::Teardown)
        );
        assert_eq!(session.state(), SessionState::Init);
    }

    #[test]
    fn test_reset() {
        let mut session = ClientSession::new();
        session.prepare(Method::Setup, "m", Some(1)).unwrap();
        session.accept_reply(&Response::ok(1, 123456)).unwrap();
        session.reset();
        assert_eq!(session.state(), SessionState::Init);
        assert_eq!(session.cseq(), 0);
        assert_eq!(session.session_id(), 0);
    }
}
