//! Liveness monitoring via echo probes.
//!
//! Pure clock-driven logic: the adapter owns the actual timer and feeds
//! this monitor instants and events, keeping every transition inside the
//! connection's own processing context.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::Xid;

/// What the adapter must do after a deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepaliveAction {
    /// Send an EchoRequest carrying this transaction id.
    Probe(Xid),
    /// Too many consecutive unanswered probes; the peer is dead.
    Dead { misses: u32 },
}

/// Result of feeding an EchoReply to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EchoVerdict {
    /// Reply matched the outstanding probe and was consumed.
    Matched,
    /// No outstanding probe with this id; deliver it like any message.
    Ignored,
}

/// Echo-probe scheduler for one connection.
#[derive(Debug)]
pub struct KeepaliveMonitor {
    interval: Duration,
    reply_timeout: Duration,
    max_misses: u32,
    misses: u32,
    pending: Option<Xid>,
    deadline: Instant,
}

impl KeepaliveMonitor {
    pub fn new(interval: Duration, reply_timeout: Duration, max_misses: u32, now: Instant) -> Self {
        Self {
            interval,
            reply_timeout,
            max_misses: max_misses.max(1),
            misses: 0,
            pending: None,
            deadline: now + interval,
        }
    }

    /// The next instant the adapter must call [`Self::on_deadline`].
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// A probe is in flight awaiting its reply.
    pub fn awaiting_reply(&self) -> bool {
        self.pending.is_some()
    }

    /// Any inbound traffic proves liveness: an in-flight probe is
    /// abandoned, the miss streak ends, and the idle interval restarts.
    pub fn on_traffic(&mut self, now: Instant) {
        self.pending = None;
        self.misses = 0;
        self.deadline = now + self.interval;
    }

    /// Feed an inbound EchoReply. Only a reply matching the outstanding
    /// probe's transaction id counts; anything else leaves the reply
    /// deadline untouched.
    pub fn on_echo_reply(&mut self, xid: Xid, now: Instant) -> EchoVerdict {
        if self.pending == Some(xid) {
            self.pending = None;
            self.misses = 0;
            self.deadline = now + self.interval;
            EchoVerdict::Matched
        } else {
            EchoVerdict::Ignored
        }
    }

    /// The deadline fired: either the idle interval elapsed with no
    /// traffic, or an in-flight probe went unanswered.
    pub fn on_deadline(&mut self, now: Instant) -> KeepaliveAction {
        if self.pending.is_some() {
            self.misses += 1;
            if self.misses >= self.max_misses {
                return KeepaliveAction::Dead {
                    misses: self.misses,
                };
            }
        }
        let xid = Xid::random();
        self.pending = Some(xid);
        self.deadline = now + self.reply_timeout;
        KeepaliveAction::Probe(xid)
    }
}
