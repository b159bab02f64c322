//! TCP listener and stream setup with tuned socket options.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use super::TransportConfig;
use crate::error::{Result, TransportError};

/// Bind a listener for switch connections.
pub fn bind_listener(addr: SocketAddr, config: &TransportConfig) -> Result<TcpListener> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(|e| {
        TransportError::BindFailed {
            addr,
            reason: e.to_string(),
        }
    })?;

    let bind_err = |e: std::io::Error| TransportError::BindFailed {
        addr,
        reason: e.to_string(),
    };

    socket.set_reuse_address(config.reuse_addr).map_err(bind_err)?;
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "freebsd"))]
    if config.reuse_port {
        socket.set_reuse_port(true).map_err(bind_err)?;
    }
    if config.send_buffer_size > 0 {
        socket
            .set_send_buffer_size(config.send_buffer_size)
            .map_err(bind_err)?;
    }
    if config.recv_buffer_size > 0 {
        socket
            .set_recv_buffer_size(config.recv_buffer_size)
            .map_err(bind_err)?;
    }

    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(config.backlog as i32).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener).map_err(|e| bind_err(e).into())
}

/// Accept one connection and apply per-stream options.
pub async fn accept(
    listener: &TcpListener,
    config: &TransportConfig,
) -> Result<(TcpStream, SocketAddr)> {
    let (stream, addr) = listener
        .accept()
        .await
        .map_err(|e| TransportError::AcceptFailed(e.to_string()))?;

    if config.tcp_nodelay {
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::SocketError(e.to_string()))?;
    }

    Ok((stream, addr))
}

/// Connect to a peer; used by auxiliary tooling and tests.
pub async fn connect(addr: SocketAddr, config: &TransportConfig) -> Result<TcpStream> {
    let stream = timeout(config.connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::SocketError(format!("connect to {addr} timed out")))?
        .map_err(|e| TransportError::SocketError(e.to_string()))?;

    if config.tcp_nodelay {
        stream
            .set_nodelay(true)
            .map_err(|e| TransportError::SocketError(e.to_string()))?;
    }

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_accept_connect() {
        let config = TransportConfig::default();
        let listener = bind_listener("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn({
            let config = config.clone();
            async move { connect(addr, &config).await }
        });

        let (stream, peer) = accept(&listener, &config).await.unwrap();
        assert_eq!(peer.ip(), addr.ip());
        drop(stream);

        client.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn bind_rejects_busy_port_without_reuse() {
        let config = TransportConfig {
            reuse_addr: false,
            ..TransportConfig::default()
        };
        let first = bind_listener("127.0.0.1:0".parse().unwrap(), &config).unwrap();
        let addr = first.local_addr().unwrap();
        assert!(bind_listener(addr, &config).is_err());
    }
}
