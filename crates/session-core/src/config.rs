//! Server and client configuration
//!
//! Both structs deserialize from TOML; every field has a default so a file
//! only needs the values it changes. Durations are given in milliseconds.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framecast_rtp_core::{DEFAULT_DELIVERY_BUFFER_CAPACITY, DEFAULT_MAX_PAYLOAD_SIZE, PAYLOAD_TYPE_JPEG};

use crate::errors::{Error, Result};

/// Default control port
pub const DEFAULT_CONTROL_PORT: u16 = 8554;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Control listener address
    pub bind_address: SocketAddr,

    /// Directory media identifiers are resolved against
    pub media_root: PathBuf,

    /// Delay between two frames
    pub pacing_interval_ms: u64,

    /// Largest RTP payload per packet
    pub max_payload_size: usize,

    pub payload_type: u8,

    pub ssrc: u32,

    /// Log progress every this many frames
    pub progress_log_interval: u64,

    /// Read timeout on the control connection, used to observe shutdown
    pub control_read_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_CONTROL_PORT),
            media_root: PathBuf::from("."),
            pacing_interval_ms: 33,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            payload_type: PAYLOAD_TYPE_JPEG,
            ssrc: 0,
            progress_log_interval: 100,
            control_read_timeout_ms: 500,
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&read_config(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_payload_size == 0 {
            return Err(Error::Config("max_payload_size must be positive".to_string()));
        }
        if self.payload_type > 0x7f {
            return Err(Error::Config(format!("payload_type {} does not fit in 7 bits", self.payload_type)));
        }
        if self.control_read_timeout_ms == 0 {
            return Err(Error::Config("control_read_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }

    pub fn control_read_timeout(&self) -> Duration {
        Duration::from_millis(self.control_read_timeout_ms)
    }
}

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server control address
    pub server_address: SocketAddr,

    /// Local address for the RTP socket
    pub data_bind_address: IpAddr,

    /// Local RTP port, 0 picks an ephemeral port
    pub data_port: u16,

    /// How long to wait for a control reply
    pub reply_timeout_ms: u64,

    /// Receive timeout of the RTP loop, bounds how quickly it sees cancellation
    pub recv_timeout_ms: u64,

    /// Pause after TEARDOWN before reconnecting
    pub teardown_grace_ms: u64,

    /// Delivery buffer capacity in frames
    pub buffer_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_address: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_CONTROL_PORT),
            data_bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            data_port: 0,
            reply_timeout_ms: 5000,
            recv_timeout_ms: 500,
            teardown_grace_ms: 100,
            buffer_capacity: DEFAULT_DELIVERY_BUFFER_CAPACITY,
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_toml_str(&read_config(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(Error::Config("buffer_capacity must be positive".to_string()));
        }
        if self.reply_timeout_ms == 0 || self.recv_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be positive".to_string()));
        }
        Ok(())
    }

    /// Local RTP endpoint
    pub fn data_address(&self) -> SocketAddr {
        SocketAddr::new(self.data_bind_address, self.data_port)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn teardown_grace(&self) -> Duration {
        Duration::from_millis(self.teardown_grace_ms)
    }
}

fn read_config(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read {}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let server = ServerConfig::default();
        assert_eq!(server.pacing_interval(), Duration::from_millis(33));
        assert_eq!(server.max_payload_size, 1400);
        assert_eq!(server.payload_type, 26);

        let client = ClientConfig::default();
        assert_eq!(client.reply_timeout(), Duration::from_secs(5));
        assert_eq!(client.recv_timeout(), Duration::from_millis(500));
        assert_eq!(client.buffer_capacity, 300);
    }

    #[test]
    fn test_partial_toml() {
        let server = ServerConfig::from_toml_str(
            r#"
            bind_address = "127.0.0.1:9000"
            pacing_interval_ms = 40
            media_root = "/srv/media"
            "#,
        )
        .unwrap();
        assert_eq!(server.bind_address.port(), 9000);
        assert_eq!(server.pacing_interval(), Duration::from_millis(40));
        assert_eq!(server.media_root, PathBuf::from("/srv/media"));
        assert_eq!(server.max_payload_size, 1400);

        let client = ClientConfig::from_toml_str("data_port = 25000\nteardown_grace_ms = 0").unwrap();
        assert_eq!(client.data_address().port(), 25000);
        assert_eq!(client.teardown_grace(), Duration::ZERO);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(ServerConfig::from_toml_str("max_payload_size = 0"), Err(Error::Config(_))));
        assert!(matches!(ServerConfig::from_toml_str("payload_type = 200"), Err(Error::Config(_))));
        assert!(matches!(ClientConfig::from_toml_str("buffer_capacity = 0"), Err(Error::Config(_))));
        assert!(matches!(ClientConfig::from_toml_str("data_port = \"x\""), Err(Error::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "server_address = \"10.0.0.2:554\"\n").unwrap();

        let client = ClientConfig::load(&path).unwrap();
        assert_eq!(client.server_address, "10.0.0.2:554".parse().unwrap());
        assert!(matches!(ClientConfig::load(dir.path().join("missing.toml")), Err(Error::Config(_))));
    }
}
