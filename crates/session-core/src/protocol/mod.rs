//! RTSP-style control protocol
//!
//! Requests and replies are small text messages terminated by an empty
//! line. Only the subset needed to drive one media session is understood:
//! SETUP, PLAY, PAUSE and TEARDOWN with the `CSeq`, `Session` and
//! `Transport` headers.

pub mod codec;
pub mod message;

pub use codec::{ControlCodec, MAX_CONTROL_MESSAGE_SIZE};
pub use message::{parse_client_port, Method, Request, Response, StatusCode, RTSP_VERSION};
