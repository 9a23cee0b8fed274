use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// gRPC listener parameters.
///
/// Keepalive defaults keep long-lived discovery streams open through idle
/// periods and detect dead peers within a few seconds.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// HTTP2 keepalive ping interval in seconds
    #[serde(default = "default_h2_keepalive_interval")]
    pub http2_keep_alive_interval_in_secs: u64,

    /// HTTP2 keepalive timeout in seconds
    #[serde(default = "default_h2_keepalive_timeout")]
    pub http2_keep_alive_timeout_in_secs: u64,

    /// TCP keepalive in seconds
    #[serde(default = "default_tcp_keepalive")]
    pub tcp_keepalive_in_secs: u64,

    /// HTTP2 SETTINGS_MAX_CONCURRENT_STREAMS
    #[serde(default = "default_max_streams")]
    pub max_concurrent_streams: u32,

    #[serde(default = "default_tcp_nodelay")]
    pub tcp_nodelay: bool,

    /// Directory holding `control-plane.log`
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            http2_keep_alive_interval_in_secs: default_h2_keepalive_interval(),
            http2_keep_alive_timeout_in_secs: default_h2_keepalive_timeout(),
            tcp_keepalive_in_secs: default_tcp_keepalive(),
            max_concurrent_streams: default_max_streams(),
            tcp_nodelay: default_tcp_nodelay(),
            log_dir: default_log_dir(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_address
            .parse()
            .map_err(|e| Error::InvalidConfig(format!("listen_address {:?}: {}", self.listen_address, e)))
    }

    /// # Errors
    /// Returns `Error::InvalidConfig` when:
    /// - the listen address does not parse
    /// - a keepalive interval is zero
    /// - the keepalive timeout is not shorter than the interval
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if self.http2_keep_alive_interval_in_secs == 0 || self.tcp_keepalive_in_secs == 0 {
            return Err(Error::InvalidConfig("keepalive intervals must be positive".into()));
        }
        if self.http2_keep_alive_timeout_in_secs >= self.http2_keep_alive_interval_in_secs {
            return Err(Error::InvalidConfig(format!(
                "http2 keepalive timeout ({}s) must be shorter than the interval ({}s)",
                self.http2_keep_alive_timeout_in_secs, self.http2_keep_alive_interval_in_secs
            )));
        }
        if self.max_concurrent_streams == 0 {
            return Err(Error::InvalidConfig("max_concurrent_streams must be positive".into()));
        }
        Ok(())
    }
}

fn default_listen_address() -> String {
    "0.0.0.0:18000".to_string()
}
fn default_h2_keepalive_interval() -> u64 {
    30
}
fn default_h2_keepalive_timeout() -> u64 {
    5
}
fn default_tcp_keepalive() -> u64 {
    30
}
fn default_max_streams() -> u32 {
    1_000_000
}
fn default_tcp_nodelay() -> bool {
    true
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
