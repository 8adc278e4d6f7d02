//! Role binding for signaling connections
//!
//! Joining as sender starts a new handshake epoch. Joining as receiver replays
//! the buffered offer and sender candidates. Disconnecting releases whatever
//! roles the connection held.

use crate::error::RelayError;
use crate::state::{ConnectionId, PeerHandle, SessionStore};
use pairlink_protocol::{Role, ServerEvent};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Gateway {
    store: SessionStore,
    room: String,
}

impl Gateway {
    pub fn new(store: SessionStore, room: impl Into<String>) -> Self {
        Self {
            store,
            room: room.into(),
        }
    }

    /// Bind `peer` to the role named by `role`.
    ///
    /// A `joined` acknowledgment echoing the raw role is sent in every case;
    /// an unknown role leaves the connection unbound.
    pub fn join(&self, peer: &PeerHandle, role: &str) -> Result<Role, RelayError> {
        let ack = ServerEvent::Joined {
            room: self.room.clone(),
            role: role.to_string(),
        };

        let parsed = match role.parse::<Role>() {
            Ok(parsed) => parsed,
            Err(err) => {
                peer.send(ack);
                return Err(RelayError::InvalidRole(err.0));
            }
        };

        self.store.transact(|session| {
            match parsed {
                Role::Sender => {
                    if let Some(previous) = session.sender.as_ref().filter(|p| !p.is(peer.id())) {
                        debug!(previous = %previous.id(), "sender superseded");
                    }
                    session.begin_epoch(peer.clone());
                    info!(peer = %peer.id(), "sender joined, handshake state reset");
                }
                Role::Receiver => {
                    if let Some(previous) = session.receiver.as_ref().filter(|p| !p.is(peer.id())) {
                        debug!(previous = %previous.id(), "receiver evicted");
                    }
                    session.receiver = Some(peer.clone());
                    info!(peer = %peer.id(), "receiver joined");

                    if let Some(sdp) = &session.offer {
                        debug!(peer = %peer.id(), "replaying stored offer");
                        peer.send(ServerEvent::Offer { sdp: sdp.clone() });
                    }
                    for candidate in &session.offer_candidates {
                        peer.send(ServerEvent::Candidate {
                            candidate: candidate.clone(),
                        });
                    }
                    if !session.offer_candidates.is_empty() {
                        debug!(
                            peer = %peer.id(),
                            count = session.offer_candidates.len(),
                            "replayed stored sender candidates"
                        );
                    }
                }
            }
            peer.send(ack);
        });

        Ok(parsed)
    }

    /// Release the roles held by connection `id`. Returns the released roles.
    ///
    /// Releasing the sender ends the handshake epoch; releasing the receiver
    /// leaves the offer and its candidates buffered for the next receiver.
    pub fn disconnect(&self, id: ConnectionId) -> Vec<Role> {
        self.store.transact(|session| {
            let mut released = Vec::new();
            if session.is_sender(id) {
                session.end_epoch();
                info!(peer = %id, "sender disconnected, handshake state cleared");
                released.push(Role::Sender);
            }
            if session.is_receiver(id) {
                session.receiver = None;
                info!(peer = %id, "receiver disconnected");
                released.push(Role::Receiver);
            }
            if released.is_empty() {
                debug!(peer = %id, "unbound connection disconnected");
            }
            released
        })
    }
}
