//! Control listener

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use super::connection::serve_connection;
use crate::config::ServerConfig;
use crate::errors::{Error, Result};
use crate::media::MediaCatalog;

/// Accepts control connections and serves each on its own task
pub struct StreamServer {
    listener: TcpListener,
    catalog: Arc<dyn MediaCatalog>,
    config: Arc<ServerConfig>,
    shutdown: CancellationToken,
    connections: TaskTracker,
}

impl StreamServer {
    pub async fn bind(config: ServerConfig, catalog: Arc<dyn MediaCatalog>) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(config.bind_address).await.map_err(|e| {
            Error::Transport(format!("Failed to bind control listener on {}: {}", config.bind_address, e))
        })?;

        info!("Listening for control connections on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            catalog,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
            connections: TaskTracker::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Token that stops the accept loop and every connection when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accept connections until shutdown, then wait for open connections to finish
    pub async fn run(self) -> Result<()> {
        loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break,
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((stream, peer)) => {
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                    }
                    self.connections.spawn(serve_connection(
                        stream,
                        peer,
                        self.catalog.clone(),
                        self.config.clone(),
                        self.shutdown.child_token(),
                    ));
                }
                Err(e) => {
                    // Usually a per-connection failure (e.g. EMFILE); keep accepting
                    error!("Failed to accept control connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }

        info!("Stopping, waiting for {} connections", self.connections.len());
        self.connections.close();
        self.connections.wait().await;
        Ok(())
    }
}
