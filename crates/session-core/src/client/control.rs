//! Client end of the control connection

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, trace, warn};

use crate::errors::{Error, Result};
use crate::protocol::{ControlCodec, Request, Response};

pub struct ControlConnection {
    peer: SocketAddr,
    reader: FramedRead<OwnedReadHalf, ControlCodec>,
    writer: FramedWrite<OwnedWriteHalf, ControlCodec>,
    reply_timeout: Duration,
}

impl ControlConnection {
    /// Connect to a server; `reply_timeout` also bounds the connect
    pub async fn connect(addr: SocketAddr, reply_timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(reply_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::Timeout(format!("Connecting to {}", addr)))?
            .map_err(|e| Error::Transport(format!("Failed to connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        debug!("Control connection to {} established", addr);
        let (read_half, write_half) = stream.into_split();
        Ok(Self {
            peer: addr,
            reader: FramedRead::new(read_half, ControlCodec::new()),
            writer: FramedWrite::new(write_half, ControlCodec::new()),
            reply_timeout,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub async fn send(&mut self, request: &Request) -> Result<()> {
        trace!("Sending to {}:\n{}", self.peer, request);
        self.writer.send(request).await
    }

    /// Send `request` and wait for the reply carrying its CSeq. Replies to
    /// other requests and unparsable messages are skipped.
    pub async fn round_trip(&mut self, request: &Request) -> Result<Response> {
        self.send(request).await?;

        let deadline = tokio::time::Instant::now() + self.reply_timeout;
        loop {
            let text = tokio::time::timeout_at(deadline, self.reader.next())
                .await
                .map_err(|_| Error::Timeout(format!("No reply to {} (CSeq {})", request.method, request.cseq)))?
                .ok_or_else(|| Error::Transport(format!("Connection to {} closed", self.peer)))??;

            trace!("Received from {}:\n{}", self.peer, text);
            match Response::parse(&text) {
                Ok(response) if response.cseq == request.cseq => return Ok(response),
                Ok(response) => debug!("Skipping reply with CSeq {}", response.cseq),
                Err(e) => warn!("Dropping reply from {}: {}", self.peer, e),
            }
        }
    }
}
