//! Per-connection adapter: one duplex byte stream in, typed events out.
//!
//! Each connection runs as a single task owning all of its state: the
//! framed stream, the handshake machine, the keepalive monitor, and the
//! outbound queue. Timers fire inside the same `select!` loop as inbound
//! frames, so a timeout can never interleave with an in-flight decode.
//!
//! Ordering guarantees: outbound frames are written in submission order
//! with Hello first; inbound messages reach the listener in arrival order.
//! The outbound queue carries byte watermarks: crossing the high mark
//! suspends inbound reads for this connection until the queue drains below
//! the low mark.

mod handshake;
mod keepalive;

pub use handshake::{Handshake, HandshakeState};
pub use keepalive::{EchoVerdict, KeepaliveAction, KeepaliveMonitor};

use std::collections::VecDeque;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::codec::Framed;
use tracing::{debug, error, trace, warn};

use crate::codec::{self, OfpFrameCodec, RawFrame, TYPE_ECHO_REPLY, TYPE_ERROR, TYPE_HELLO};
use crate::config::ConnectionConfig;
use crate::error::{ConnectionError, Error};
use crate::message::{ErrorMessage, HelloMessage, Message};
use crate::registry::CodecRegistry;
use crate::types::{ConnectionId, DisconnectReason, ProtocolVersion, Xid};

/// Typed event delivered to the listener, in arrival order.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Version negotiation settled; the connection is usable.
    HandshakeComplete { version: ProtocolVersion },
    /// A decoded inbound message.
    Message { xid: Xid, message: Message },
    /// A message-local failure: decode error, registry miss, or a rejected
    /// outbound submission. The connection stays up.
    ProtocolError { xid: Option<Xid>, error: Error },
    /// The single teardown notification for this connection.
    Disconnected { reason: DisconnectReason },
}

/// An outbound submission: a typed message plus its transaction id.
#[derive(Debug)]
pub struct OutboundRequest {
    pub xid: Xid,
    pub message: Message,
}

/// Listener-side handle to one connection.
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound_tx: mpsc::Sender<OutboundRequest>,
    events: mpsc::Receiver<ConnectionEvent>,
    negotiated: Arc<OnceLock<ProtocolVersion>>,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Negotiated protocol version, immutable once set.
    pub fn negotiated_version(&self) -> Option<ProtocolVersion> {
        self.negotiated.get().copied()
    }

    /// Submit a message for encoding and sending. Write order equals
    /// submission order.
    pub async fn send(&self, xid: Xid, message: Message) -> Result<(), Error> {
        self.outbound_tx
            .send(OutboundRequest { xid, message })
            .await
            .map_err(|_| ConnectionError::Closed.into())
    }

    /// Receive the next event; `None` once the connection task is gone.
    pub async fn recv(&mut self) -> Option<ConnectionEvent> {
        self.events.recv().await
    }

    /// A cloneable submission handle for additional producers. All
    /// producers feed the same per-connection queue; each producer's own
    /// submission order is preserved on the wire.
    pub fn sender(&self) -> ConnectionSender {
        ConnectionSender {
            outbound_tx: self.outbound_tx.clone(),
        }
    }
}

/// Cloneable outbound-only handle to a connection.
#[derive(Clone)]
pub struct ConnectionSender {
    outbound_tx: mpsc::Sender<OutboundRequest>,
}

impl ConnectionSender {
    pub async fn send(&self, xid: Xid, message: Message) -> Result<(), Error> {
        self.outbound_tx
            .send(OutboundRequest { xid, message })
            .await
            .map_err(|_| ConnectionError::Closed.into())
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("negotiated", &self.negotiated.get())
            .finish()
    }
}

/// Byte-accounted outbound frame queue with suspend/resume watermarks.
struct OutboundQueue {
    frames: VecDeque<Bytes>,
    queued_bytes: usize,
    high_watermark: usize,
    low_watermark: usize,
    suspended: bool,
}

impl OutboundQueue {
    fn new(high_watermark: usize, low_watermark: usize) -> Self {
        Self {
            frames: VecDeque::new(),
            queued_bytes: 0,
            high_watermark,
            low_watermark,
            suspended: false,
        }
    }

    fn push(&mut self, frame: Bytes) {
        self.queued_bytes += frame.len();
        self.frames.push_back(frame);
        if self.queued_bytes > self.high_watermark {
            self.suspended = true;
        }
    }

    fn front(&self) -> Option<&Bytes> {
        self.frames.front()
    }

    fn pop_front(&mut self) {
        if let Some(frame) = self.frames.pop_front() {
            self.queued_bytes -= frame.len();
        }
        if self.suspended && self.queued_bytes < self.low_watermark {
            self.suspended = false;
        }
    }

    fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether inbound reads are currently suspended by backpressure.
    fn reads_suspended(&self) -> bool {
        self.suspended
    }
}

/// Connection adapter for one accepted switch.
pub struct Connection<T> {
    stream: T,
    registry: Arc<CodecRegistry>,
    config: ConnectionConfig,
    id: ConnectionId,
    outbound_rx: mpsc::Receiver<OutboundRequest>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    negotiated: Arc<OnceLock<ProtocolVersion>>,
}

impl<T> Connection<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap a duplex stream. The returned handle is the listener boundary.
    pub fn new(
        stream: T,
        registry: Arc<CodecRegistry>,
        config: ConnectionConfig,
    ) -> (Self, ConnectionHandle) {
        let id = ConnectionId::new();
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue_depth);
        let (event_tx, events) = mpsc::channel(config.event_queue_depth);
        let negotiated = Arc::new(OnceLock::new());

        let connection = Self {
            stream,
            registry,
            config,
            id,
            outbound_rx,
            event_tx,
            negotiated: Arc::clone(&negotiated),
        };
        let handle = ConnectionHandle {
            id,
            outbound_tx,
            events,
            negotiated,
        };
        (connection, handle)
    }

    /// Drive the connection to completion.
    ///
    /// Emits exactly one `Disconnected` event and returns its reason.
    pub async fn run(self) -> DisconnectReason {
        let id = self.id;
        let framed = Framed::new(self.stream, OfpFrameCodec::new());
        let (sink, stream) = framed.split();

        let supported = self.config.supported_versions();
        let queue = OutboundQueue::new(
            self.config.outbound_high_watermark,
            self.config.outbound_low_watermark,
        );
        let mut driver = Driver {
            sink,
            stream,
            registry: self.registry,
            config: self.config,
            id,
            outbound_rx: self.outbound_rx,
            event_tx: self.event_tx,
            negotiated_cell: self.negotiated,
            negotiated: None,
            handshake: Handshake::new(supported),
            keepalive: None,
            queue,
            hello_version: ProtocolVersion::V1_0,
        };

        let reason = driver.run().await;
        debug!(connection = %id, %reason, "connection closed");
        let _ = driver
            .event_tx
            .send(ConnectionEvent::Disconnected { reason })
            .await;
        reason
    }
}

/// What a loop iteration observed.
enum Step {
    Outbound(Option<OutboundRequest>),
    Pumped(Result<(), Error>),
    Inbound(Option<Result<RawFrame, Error>>),
    HandshakeTimeout,
    KeepaliveDeadline,
}

struct Driver<T> {
    sink: SplitSink<Framed<T, OfpFrameCodec>, Bytes>,
    stream: SplitStream<Framed<T, OfpFrameCodec>>,
    registry: Arc<CodecRegistry>,
    config: ConnectionConfig,
    id: ConnectionId,
    outbound_rx: mpsc::Receiver<OutboundRequest>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    negotiated_cell: Arc<OnceLock<ProtocolVersion>>,
    negotiated: Option<ProtocolVersion>,
    handshake: Handshake,
    keepalive: Option<KeepaliveMonitor>,
    queue: OutboundQueue,
    /// Version the local Hello header carried; used for pre-negotiation
    /// error replies.
    hello_version: ProtocolVersion,
}

impl<T> Driver<T>
where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn run(&mut self) -> DisconnectReason {
        // Hello precedes every other outbound message on this connection
        self.hello_version = self.handshake.local_hello_version();
        let hello = Message::Hello(self.handshake.local_hello());
        match codec::encode_message(&self.registry, self.hello_version, Xid::random(), &hello) {
            Ok(frame) => self.queue.push(frame),
            Err(err) => {
                error!(connection = %self.id, %err, "failed to encode local hello");
                return DisconnectReason::ProtocolFatal;
            }
        }
        self.handshake.on_hello_sent();
        let handshake_deadline = Instant::now() + self.config.handshake_timeout;

        loop {
            let keepalive_deadline = self
                .keepalive
                .as_ref()
                .map_or_else(Instant::now, KeepaliveMonitor::deadline);
            let keepalive_armed = self.keepalive.is_some();
            let awaiting_peer_hello = self.handshake.is_waiting();
            let write_pending = !self.queue.is_empty();
            let reads_allowed = !self.queue.reads_suspended();

            let step = tokio::select! {
                biased;

                req = self.outbound_rx.recv() => Step::Outbound(req),

                res = Self::pump(&mut self.sink, &mut self.queue), if write_pending => {
                    Step::Pumped(res)
                }

                frame = self.stream.next(), if reads_allowed => {
                    Step::Inbound(frame)
                }

                _ = tokio::time::sleep_until(handshake_deadline), if awaiting_peer_hello => {
                    Step::HandshakeTimeout
                }

                _ = tokio::time::sleep_until(keepalive_deadline), if keepalive_armed => {
                    Step::KeepaliveDeadline
                }
            };

            let flow = match step {
                Step::Outbound(Some(req)) => self.on_outbound(req).await,
                // Every handle is gone; nobody is left to talk for us
                Step::Outbound(None) => Err(DisconnectReason::Requested),
                Step::Pumped(Ok(())) => Ok(()),
                Step::Pumped(Err(err)) => {
                    warn!(connection = %self.id, %err, "write failed");
                    Err(DisconnectReason::PeerClosed)
                }
                Step::Inbound(Some(Ok(frame))) => self.on_frame(frame).await,
                Step::Inbound(Some(Err(err))) => {
                    warn!(connection = %self.id, %err, "framing failed");
                    Err(err.disconnect_reason())
                }
                Step::Inbound(None) => Err(DisconnectReason::PeerClosed),
                Step::HandshakeTimeout => {
                    let err = self.handshake.on_timeout();
                    warn!(connection = %self.id, %err, "handshake timed out");
                    Err(DisconnectReason::HandshakeFailed)
                }
                Step::KeepaliveDeadline => self.on_keepalive_deadline().await,
            };

            if let Err(reason) = flow {
                // Teardown has begun: nothing is read or written past this
                // point, timers die with the task.
                return reason;
            }
        }
    }

    /// Hand queued frames to the sink and flush. Frames are popped only
    /// after the sink accepts them, so cancellation never drops or
    /// duplicates a frame.
    async fn pump(
        sink: &mut SplitSink<Framed<T, OfpFrameCodec>, Bytes>,
        queue: &mut OutboundQueue,
    ) -> Result<(), Error> {
        while let Some(frame) = queue.front() {
            sink.feed(frame.clone()).await?;
            queue.pop_front();
        }
        sink.flush().await?;
        Ok(())
    }

    async fn on_outbound(&mut self, req: OutboundRequest) -> Result<(), DisconnectReason> {
        let Some(version) = self.negotiated else {
            self.emit(ConnectionEvent::ProtocolError {
                xid: Some(req.xid),
                error: ConnectionError::NotNegotiated.into(),
            })
            .await?;
            return Ok(());
        };

        match codec::encode_message(&self.registry, version, req.xid, &req.message) {
            Ok(frame) => {
                trace!(connection = %self.id, xid = %req.xid, queued = self.queue.queued_bytes,
                       "queued outbound message");
                self.queue.push(frame);
                Ok(())
            }
            Err(error) => {
                self.emit(ConnectionEvent::ProtocolError {
                    xid: Some(req.xid),
                    error,
                })
                .await
            }
        }
    }

    async fn on_frame(&mut self, frame: RawFrame) -> Result<(), DisconnectReason> {
        let Some(version) = self.negotiated else {
            return self.on_prenegotiation_frame(frame).await;
        };

        if let Some(keepalive) = &mut self.keepalive {
            // Echo replies prove liveness only when they match the probe
            if frame.msg_type != TYPE_ECHO_REPLY {
                keepalive.on_traffic(Instant::now());
            }
        }

        if frame.version != version.wire_id() {
            self.emit(ConnectionEvent::ProtocolError {
                xid: Some(frame.xid),
                error: crate::error::CodecError::UnknownVersion(frame.version).into(),
            })
            .await?;
            return Ok(());
        }

        let decoded = codec::decode_body(
            &self.registry,
            version,
            frame.msg_type,
            frame.experimenter,
            frame.body,
        );
        let message = match decoded {
            Ok(message) => message,
            Err(error) => {
                return self
                    .emit(ConnectionEvent::ProtocolError {
                        xid: Some(frame.xid),
                        error,
                    })
                    .await;
            }
        };

        match message {
            // Answered below the listener, like the original stack does
            Message::EchoRequest(echo) => {
                let reply = Message::EchoReply(echo);
                match codec::encode_message(&self.registry, version, frame.xid, &reply) {
                    Ok(out) => self.queue.push(out),
                    Err(err) => {
                        error!(connection = %self.id, %err, "failed to encode echo reply");
                    }
                }
                Ok(())
            }
            Message::EchoReply(echo) => {
                let verdict = self
                    .keepalive
                    .as_mut()
                    .map_or(EchoVerdict::Ignored, |ka| {
                        ka.on_echo_reply(frame.xid, Instant::now())
                    });
                match verdict {
                    EchoVerdict::Matched => Ok(()),
                    EchoVerdict::Ignored => {
                        self.emit(ConnectionEvent::Message {
                            xid: frame.xid,
                            message: Message::EchoReply(echo),
                        })
                        .await
                    }
                }
            }
            message => {
                self.emit(ConnectionEvent::Message {
                    xid: frame.xid,
                    message,
                })
                .await
            }
        }
    }

    async fn on_prenegotiation_frame(&mut self, frame: RawFrame) -> Result<(), DisconnectReason> {
        match frame.msg_type {
            TYPE_HELLO => {
                let mut body = frame.body;
                let elements = match codec::decode_hello_elements(&mut body) {
                    Ok(elements) => elements,
                    Err(err) => {
                        warn!(connection = %self.id, %err, "malformed peer hello");
                        return Err(DisconnectReason::HandshakeFailed);
                    }
                };
                let hello = HelloMessage { elements };

                match self.handshake.on_peer_hello(frame.version, &hello) {
                    Ok(version) => {
                        self.negotiated = Some(version);
                        let _ = self.negotiated_cell.set(version);
                        self.keepalive = Some(KeepaliveMonitor::new(
                            self.config.echo_interval,
                            self.config.echo_reply_timeout,
                            self.config.max_echo_misses,
                            Instant::now(),
                        ));
                        self.emit(ConnectionEvent::HandshakeComplete { version })
                            .await
                    }
                    Err(_) => {
                        self.send_incompatible_error().await;
                        Err(DisconnectReason::HandshakeFailed)
                    }
                }
            }
            // The peer already rejected us
            TYPE_ERROR => {
                warn!(connection = %self.id, "peer error during handshake");
                Err(DisconnectReason::HandshakeFailed)
            }
            other => {
                warn!(connection = %self.id, msg_type = other, "message before hello");
                Err(DisconnectReason::ProtocolFatal)
            }
        }
    }

    async fn on_keepalive_deadline(&mut self) -> Result<(), DisconnectReason> {
        let Some(keepalive) = &mut self.keepalive else {
            return Ok(());
        };
        match keepalive.on_deadline(Instant::now()) {
            KeepaliveAction::Probe(xid) => {
                let version = self.negotiated.expect("keepalive runs only once negotiated");
                let probe = Message::EchoRequest(crate::message::EchoMessage::empty());
                match codec::encode_message(&self.registry, version, xid, &probe) {
                    Ok(frame) => {
                        trace!(connection = %self.id, %xid, "sending echo probe");
                        self.queue.push(frame);
                    }
                    Err(err) => {
                        error!(connection = %self.id, %err, "failed to encode echo probe");
                    }
                }
                Ok(())
            }
            KeepaliveAction::Dead { misses } => {
                warn!(connection = %self.id, misses, "peer declared dead");
                Err(DisconnectReason::Timeout)
            }
        }
    }

    /// Best-effort HELLO_FAILED/INCOMPATIBLE reply before teardown.
    async fn send_incompatible_error(&mut self) {
        let error = Message::Error(ErrorMessage::hello_incompatible());
        if let Ok(frame) =
            codec::encode_message(&self.registry, self.hello_version, Xid::random(), &error)
        {
            let _ = self.sink.feed(frame).await;
            let _ = self.sink.flush().await;
        }
    }

    /// Deliver an event; a gone listener means teardown.
    async fn emit(&mut self, event: ConnectionEvent) -> Result<(), DisconnectReason> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| DisconnectReason::Requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(len: usize) -> Bytes {
        Bytes::from(vec![0u8; len])
    }

    #[test]
    fn queue_preserves_submission_order() {
        let mut queue = OutboundQueue::new(1024, 512);
        queue.push(Bytes::from_static(b"first"));
        queue.push(Bytes::from_static(b"second"));
        queue.push(Bytes::from_static(b"third"));

        assert_eq!(queue.front().unwrap().as_ref(), b"first");
        queue.pop_front();
        assert_eq!(queue.front().unwrap().as_ref(), b"second");
        queue.pop_front();
        assert_eq!(queue.front().unwrap().as_ref(), b"third");
    }

    #[test]
    fn crossing_high_watermark_suspends() {
        let mut queue = OutboundQueue::new(100, 40);
        queue.push(frame(60));
        assert!(!queue.reads_suspended());
        queue.push(frame(60));
        assert!(queue.reads_suspended());
    }

    #[test]
    fn draining_below_low_watermark_resumes() {
        let mut queue = OutboundQueue::new(100, 40);
        queue.push(frame(60));
        queue.push(frame(60));
        assert!(queue.reads_suspended());

        // 120 -> 60: still at or above the low mark, stays suspended
        queue.pop_front();
        assert!(queue.reads_suspended());

        // 60 -> 0: below the low mark, reads resume
        queue.pop_front();
        assert!(!queue.reads_suspended());
    }

    #[test]
    fn hysteresis_between_watermarks() {
        let mut queue = OutboundQueue::new(100, 40);
        queue.push(frame(50));
        assert!(!queue.reads_suspended());

        queue.push(frame(60));
        assert!(queue.reads_suspended());

        queue.pop_front(); // 60 queued, between low and high
        assert!(queue.reads_suspended());

        queue.push(frame(10)); // 70, still suspended
        assert!(queue.reads_suspended());

        queue.pop_front(); // 10
        assert!(!queue.reads_suspended());
    }
}
