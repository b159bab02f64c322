//! Transport layer for ofchannel.
//!
//! The connection adapter only requires a readable/writable byte stream
//! with close notification; TCP with tuned socket options is provided
//! here, and a TLS wrapper is an external collaborator that still
//! satisfies [`DuplexStream`].

mod tcp;

pub use tcp::{accept, bind_listener, connect};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

/// The abstract duplex byte stream the adapter is generic over.
pub trait DuplexStream: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> DuplexStream for T {}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Send buffer size in bytes (0 = system default).
    #[serde(default)]
    pub send_buffer_size: usize,

    /// Receive buffer size in bytes (0 = system default).
    #[serde(default)]
    pub recv_buffer_size: usize,

    /// Connection timeout for outgoing connects.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Enable TCP_NODELAY; control messages are small and latency-bound.
    #[serde(default = "default_nodelay")]
    pub tcp_nodelay: bool,

    /// Enable SO_REUSEADDR.
    #[serde(default = "default_reuse_addr")]
    pub reuse_addr: bool,

    /// Enable SO_REUSEPORT (where available).
    #[serde(default)]
    pub reuse_port: bool,

    /// Accept backlog.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}
fn default_nodelay() -> bool {
    true
}
fn default_reuse_addr() -> bool {
    true
}
fn default_backlog() -> u32 {
    1024
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            send_buffer_size: 0,
            recv_buffer_size: 0,
            connect_timeout: default_connect_timeout(),
            tcp_nodelay: default_nodelay(),
            reuse_addr: default_reuse_addr(),
            reuse_port: false,
            backlog: default_backlog(),
        }
    }
}
