//! Control connection task

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::session::ServerSession;
use crate::config::ServerConfig;
use crate::media::MediaCatalog;
use crate::protocol::{ControlCodec, Request};

/// Serve one client until it tears down, disconnects, or the server shuts down
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    catalog: Arc<dyn MediaCatalog>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
) {
    info!("Control connection from {}", peer);

    let read_timeout = config.control_read_timeout();
    let (read_half, write_half) = stream.into_split();
    let mut reader = FramedRead::new(read_half, ControlCodec::new());
    let mut writer = FramedWrite::new(write_half, ControlCodec::new());
    let mut session = ServerSession::new(peer.ip(), catalog, config, shutdown.clone());

    loop {
        // The read timeout bounds how long a shutdown can go unnoticed
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Server shutting down, closing connection from {}", peer);
                break;
            }
            next = tokio::time::timeout(read_timeout, reader.next()) => next,
        };

        let text = match next {
            Err(_) => continue,
            Ok(None) => {
                debug!("Connection from {} closed by peer", peer);
                break;
            }
            Ok(Some(Err(e))) => {
                warn!("Control connection from {} failed: {}", peer, e);
                break;
            }
            Ok(Some(Ok(text))) => text,
        };

        trace!("Received from {}:\n{}", peer, text);
        let request = match Request::parse(&text) {
            Ok(request) => request,
            Err(e) => {
                warn!("Dropping message from {}: {}", peer, e);
                continue;
            }
        };

        if let Some(response) = session.handle_request(&request).await {
            trace!("Replying to {}:\n{}", peer, response);
            if let Err(e) = writer.send(response).await {
                warn!("Failed to reply to {}: {}", peer, e);
                break;
            }
        }

        if session.is_closed() {
            break;
        }
    }

    session.release().await;
    info!("Control connection from {} finished", peer);
}
