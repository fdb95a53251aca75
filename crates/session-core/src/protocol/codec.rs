//! Blank-line framing for control messages over a byte stream
//!
//! A TCP read may carry half a message or several messages at once. The
//! codec buffers bytes until it sees an empty line and yields the text of
//! each complete message. Parsing is left to [`Request::parse`] and
//! [`Response::parse`] so that a message that fails to parse does not
//! tear down the stream. For the same reason an oversized message is
//! discarded up to its terminator rather than reported as a stream error.
//!
//! [`Request::parse`]: super::Request::parse
//! [`Response::parse`]: super::Response::parse

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::errors::Error;

/// Largest control message accepted
pub const MAX_CONTROL_MESSAGE_SIZE: usize = 8192;

#[derive(Debug, Clone)]
pub struct ControlCodec {
    max_length: usize,
    discarding: bool,
    discarded: usize,
}

impl Default for ControlCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlCodec {
    pub fn new() -> Self {
        Self::with_max_length(MAX_CONTROL_MESSAGE_SIZE)
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            max_length,
            discarding: false,
            discarded: 0,
        }
    }

    /// Bytes thrown away from oversized messages so far
    pub fn discarded(&self) -> usize {
        self.discarded
    }
}

/// Position and length of the first blank-line terminator
fn find_terminator(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    while i < buf.len() {
        if buf[i] == b'\n' {
            if buf[i + 1..].starts_with(b"\r\n") {
                return Some((i, 3));
            }
            if buf[i + 1..].starts_with(b"\n") {
                return Some((i, 2));
            }
        }
        i += 1;
    }
    None
}

impl Decoder for ControlCodec {
    type Item = String;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, Error> {
        loop {
            if self.discarding {
                match find_terminator(src) {
                    Some((pos, len)) => {
                        self.discarded += pos + len;
                        src.advance(pos + len);
                        self.discarding = false;
                    }
                    None => {
                        // A terminator may straddle two reads
                        let keep = src.len().min(2);
                        self.discarded += src.len() - keep;
                        src.advance(src.len() - keep);
                        return Ok(None);
                    }
                }
            }

            // Stray line breaks between messages
            let leading = src.iter().take_while(|b| **b == b'\r' || **b == b'\n').count();
            src.advance(leading);

            match find_terminator(src) {
                Some((pos, len)) if pos + len <= self.max_length => {
                    let message = src.split_to(pos + len);
                    return Ok(Some(String::from_utf8_lossy(&message).into_owned()));
                }
                None if src.len() <= self.max_length => return Ok(None),
                _ => {
                    warn!("Discarding control message larger than {} bytes", self.max_length);
                    self.discarding = true;
                }
            }
        }
    }
}

impl<T: ToString> Encoder<T> for ControlCodec {
    type Error = Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Error> {
        let text = item.to_string();
        dst.reserve(text.len());
        dst.put_slice(text.as_bytes());
        Ok(())
    }
}
