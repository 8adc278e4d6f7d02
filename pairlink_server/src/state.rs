//! Session state for the signaling relay
//!
//! A single [`Session`] describes the handshake between the current sender and
//! receiver. It lives behind one lock in [`SessionStore`]; every join,
//! disconnect and signaling message is applied inside one
//! [`SessionStore::transact`] call so no operation observes another one
//! half-applied.

use pairlink_protocol::{Candidate, ServerEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// Identifier assigned to every signaling connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outbound side of a connection
///
/// Sending only enqueues the event; a per-connection writer task drains the
/// queue, so holding the session lock while sending never waits on the network.
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl PeerHandle {
    pub fn new(id: ConnectionId, tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue an event for this connection. Events for a closed connection are dropped.
    pub fn send(&self, event: ServerEvent) {
        if self.tx.send(event).is_err() {
            debug!(peer = %self.id, "connection gone, dropping event");
        }
    }

    /// Whether the connection's writer has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn is(&self, id: ConnectionId) -> bool {
        self.id == id
    }
}

/// The handshake between the current sender and receiver
#[derive(Debug, Default)]
pub struct Session {
    pub sender: Option<PeerHandle>,
    pub receiver: Option<PeerHandle>,
    /// Most recent offer, replayed to a receiver that joins later
    pub offer: Option<String>,
    /// Sender candidates in arrival order, replayed after the offer
    pub offer_candidates: Vec<Candidate>,
    /// Most recent answer. Never replayed.
    pub answer: Option<String>,
    pub answer_candidates: Vec<Candidate>,
}

impl Session {
    /// Start a new handshake epoch owned by `sender`.
    ///
    /// Everything but the receiver binding is discarded.
    pub fn begin_epoch(&mut self, sender: PeerHandle) {
        *self = Session {
            sender: Some(sender),
            receiver: self.receiver.take(),
            ..Default::default()
        };
    }

    /// Drop the sender binding along with all handshake data.
    pub fn end_epoch(&mut self) {
        let receiver = self.receiver.take();
        *self = Session {
            receiver,
            ..Default::default()
        };
    }

    pub fn is_sender(&self, id: ConnectionId) -> bool {
        self.sender.as_ref().is_some_and(|peer| peer.is(id))
    }

    pub fn is_receiver(&self, id: ConnectionId) -> bool {
        self.receiver.as_ref().is_some_and(|peer| peer.is(id))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            sender: self.sender.as_ref().map(PeerHandle::id),
            receiver: self.receiver.as_ref().map(PeerHandle::id),
            offer: self.offer.clone(),
            offer_candidates: self.offer_candidates.clone(),
            answer: self.answer.clone(),
            answer_candidates: self.answer_candidates.clone(),
        }
    }
}

/// Point-in-time copy of a [`Session`] without the connection handles
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub sender: Option<ConnectionId>,
    pub receiver: Option<ConnectionId>,
    pub offer: Option<String>,
    pub offer_candidates: Vec<Candidate>,
    pub answer: Option<String>,
    pub answer_candidates: Vec<Candidate>,
}

/// Shared handle to the one session of this process
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    inner: Arc<Mutex<Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `f` to the session while holding the lock.
    ///
    /// `f` must not block: peer sends inside it only enqueue.
    pub fn transact<R>(&self, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut session = self.inner.lock();
        f(&mut session)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.transact(|session| session.snapshot())
    }
}
