//! Controller-side accept loop and connection tracking.
//!
//! Binds listeners, applies the accept policy before a connection adapter
//! is instantiated, spawns one task per switch, and keeps the live
//! connection table. The codec registry is the only state shared across
//! connections, and it is read-only by the time the first accept happens.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::{Connection, ConnectionHandle};
use crate::error::Result;
use crate::registry::CodecRegistry;
use crate::transport;
use crate::types::{ConnectionId, DisconnectReason};

/// Decides whether a new transport connection is accepted at all.
#[async_trait]
pub trait AcceptPolicy: Send + Sync {
    async fn permit(&self, addr: SocketAddr) -> bool;
}

/// The default policy: accept everything.
pub struct AllowAll;

#[async_trait]
impl AcceptPolicy for AllowAll {
    async fn permit(&self, _addr: SocketAddr) -> bool {
        true
    }
}

/// Controller-level event.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// A switch connection was accepted and its adapter spawned.
    Accepted { id: ConnectionId, addr: SocketAddr },
    /// The accept policy or the connection limit refused a peer.
    Rejected { addr: SocketAddr },
    /// A connection finished.
    Disconnected {
        id: ConnectionId,
        reason: DisconnectReason,
    },
}

struct ConnectionEntry {
    addr: SocketAddr,
    abort: AbortHandle,
}

/// Accept loop plus live connection table.
pub struct Controller {
    config: Config,
    registry: Arc<CodecRegistry>,
    policy: Box<dyn AcceptPolicy>,
    connections: Arc<DashMap<ConnectionId, ConnectionEntry>>,
    handle_tx: mpsc::Sender<ConnectionHandle>,
    event_tx: broadcast::Sender<ControllerEvent>,
    total_accepted: AtomicU64,
}

impl Controller {
    /// Create a controller. The returned receiver yields one
    /// [`ConnectionHandle`] per accepted switch; it is the listener
    /// boundary for applications.
    pub fn new(
        config: Config,
        registry: Arc<CodecRegistry>,
        policy: Box<dyn AcceptPolicy>,
    ) -> (Self, mpsc::Receiver<ConnectionHandle>) {
        let (handle_tx, handle_rx) = mpsc::channel(64);
        let (event_tx, _) = broadcast::channel(256);

        let controller = Self {
            config,
            registry,
            policy,
            connections: Arc::new(DashMap::new()),
            handle_tx,
            event_tx,
            total_accepted: AtomicU64::new(0),
        };
        (controller, handle_rx)
    }

    /// Subscribe to controller events.
    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.event_tx.subscribe()
    }

    /// Number of live connections.
    pub fn active_count(&self) -> usize {
        self.connections.len()
    }

    /// Total connections accepted since start.
    pub fn total_accepted(&self) -> u64 {
        self.total_accepted.load(Ordering::Relaxed)
    }

    /// Bind every configured listen address and serve until the task is
    /// dropped or the listener socket dies.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        let mut listeners = Vec::new();
        for addr in &self.config.controller.listen_addrs {
            let listener = transport::bind_listener(*addr, &self.config.transport)?;
            info!(%addr, "listening for switch connections");
            listeners.push(listener);
        }

        let mut tasks = Vec::new();
        for listener in listeners {
            let controller = Arc::clone(&self);
            tasks.push(tokio::spawn(async move {
                controller.accept_loop(listener).await;
            }));
        }
        for task in tasks {
            let _ = task.await;
        }
        Ok(())
    }

    async fn accept_loop(self: &Arc<Self>, listener: tokio::net::TcpListener) {
        loop {
            let (stream, addr) = match transport::accept(&listener, &self.config.transport).await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!(%err, "accept failed");
                    continue;
                }
            };
            self.admit(stream, addr).await;
        }
    }

    /// Policy-check and spawn one accepted stream.
    pub async fn admit(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        if self.connections.len() >= self.config.controller.max_connections {
            warn!(%addr, "connection limit reached, rejecting");
            let _ = self.event_tx.send(ControllerEvent::Rejected { addr });
            return;
        }
        if !self.policy.permit(addr).await {
            debug!(%addr, "accept policy rejected peer");
            let _ = self.event_tx.send(ControllerEvent::Rejected { addr });
            return;
        }

        let (connection, handle) = Connection::new(
            stream,
            Arc::clone(&self.registry),
            self.config.connection.clone(),
        );
        let id = handle.id();

        let task = tokio::spawn(connection.run());
        self.connections.insert(
            id,
            ConnectionEntry {
                addr,
                abort: task.abort_handle(),
            },
        );
        self.total_accepted.fetch_add(1, Ordering::Relaxed);
        let _ = self.event_tx.send(ControllerEvent::Accepted { id, addr });
        info!(connection = %id, %addr, "switch connection accepted");

        // Reap the entry when the adapter finishes
        let connections = Arc::clone(&self.connections);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let reason = task.await.unwrap_or(DisconnectReason::ProtocolFatal);
            connections.remove(&id);
            let _ = event_tx.send(ControllerEvent::Disconnected { id, reason });
        });

        if self.handle_tx.send(handle).await.is_err() {
            warn!(connection = %id, "no consumer for connection handles");
        }
    }

    /// Abort every live connection task.
    pub fn shutdown(&self) {
        for entry in self.connections.iter() {
            entry.value().abort.abort();
        }
        self.connections.clear();
        info!("controller shut down");
    }

    /// Addresses of live connections, for diagnostics.
    pub fn peers(&self) -> Vec<(ConnectionId, SocketAddr)> {
        self.connections
            .iter()
            .map(|e| (*e.key(), e.value().addr))
            .collect()
    }
}
