//! Relay policy for offers, answers and candidates
//!
//! Every message is stored first, then forwarded to the peer if one is bound.

use crate::config::CandidatePolicy;
use crate::error::RelayError;
use crate::state::{ConnectionId, SessionStore};
use pairlink_protocol::{Candidate, Role, ServerEvent};
use tracing::debug;

/// What happened to a relayed message after it was stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Sent to the bound peer
    Forwarded,
    /// No peer bound, kept in the session only
    Stored,
}

#[derive(Debug, Clone)]
pub struct MessageRouter {
    store: SessionStore,
    candidate_policy: CandidatePolicy,
}

impl MessageRouter {
    pub fn new(store: SessionStore, candidate_policy: CandidatePolicy) -> Self {
        Self {
            store,
            candidate_policy,
        }
    }

    /// Store an offer and forward it to the receiver.
    ///
    /// The origin is not checked against the sender binding.
    pub fn offer(&self, from: ConnectionId, sdp: String) -> Delivery {
        self.store.transact(|session| {
            session.offer = Some(sdp.clone());
            match &session.receiver {
                Some(receiver) => {
                    debug!(%from, to = %receiver.id(), "forwarding offer");
                    receiver.send(ServerEvent::Offer { sdp });
                    Delivery::Forwarded
                }
                None => {
                    debug!(%from, "no receiver, offer buffered");
                    Delivery::Stored
                }
            }
        })
    }

    /// Store an answer and forward it to the sender.
    ///
    /// A stored answer is never replayed to a sender that joins later.
    pub fn answer(&self, from: ConnectionId, sdp: String) -> Delivery {
        self.store.transact(|session| {
            session.answer = Some(sdp.clone());
            match &session.sender {
                Some(sender) => {
                    debug!(%from, to = %sender.id(), "forwarding answer");
                    sender.send(ServerEvent::Answer { sdp });
                    Delivery::Forwarded
                }
                None => {
                    debug!(%from, "no sender, answer stored");
                    Delivery::Stored
                }
            }
        })
    }

    /// Store a candidate on the side `from` belongs to and forward it to the other side.
    ///
    /// Returns the role the candidate was attributed to. Candidates from a
    /// connection bound to neither role are rejected unless the legacy policy
    /// is configured, in which case they count as receiver candidates.
    pub fn candidate(
        &self,
        from: ConnectionId,
        candidate: Candidate,
    ) -> Result<(Role, Delivery), RelayError> {
        self.store.transact(|session| {
            let role = if session.is_sender(from) {
                Role::Sender
            } else if session.is_receiver(from)
                || self.candidate_policy == CandidatePolicy::Legacy
            {
                Role::Receiver
            } else {
                return Err(RelayError::UnattributedCandidate);
            };

            let (buffer, peer) = match role {
                Role::Sender => (&mut session.offer_candidates, &session.receiver),
                Role::Receiver => (&mut session.answer_candidates, &session.sender),
            };
            buffer.push(candidate.clone());

            let delivery = match peer {
                Some(peer) => {
                    debug!(%from, to = %peer.id(), %role, "forwarding candidate");
                    peer.send(ServerEvent::Candidate { candidate });
                    Delivery::Forwarded
                }
                None => {
                    debug!(%from, %role, "no peer, candidate stored");
                    Delivery::Stored
                }
            };
            Ok((role, delivery))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Gateway;
    use crate::state::PeerHandle;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct TestPeer {
        handle: PeerHandle,
        rx: mpsc::UnboundedReceiver<ServerEvent>,
    }

    impl TestPeer {
        fn new() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                handle: PeerHandle::new(ConnectionId::new(), tx),
                rx,
            }
        }

        fn id(&self) -> ConnectionId {
            self.handle.id()
        }

        /// Events received so far, join acknowledgments left out
        fn drain(&mut self) -> Vec<ServerEvent> {
            let mut events = Vec::new();
            while let Ok(event) = self.rx.try_recv() {
                if !matches!(event, ServerEvent::Joined { .. }) {
                    events.push(event);
                }
            }
            events
        }
    }

    struct Relay {
        store: SessionStore,
        gateway: Gateway,
        router: MessageRouter,
    }

    fn relay(policy: CandidatePolicy) -> Relay {
        let store = SessionStore::new();
        Relay {
            gateway: Gateway::new(store.clone(), "my_room"),
            router: MessageRouter::new(store.clone(), policy),
            store,
        }
    }

    fn candidate(ip: &str) -> Candidate {
        let mut map = Candidate::new();
        map.insert("ip".into(), json!(ip));
        map
    }

    #[test]
    fn offer_before_receiver_is_replayed_once_on_join() {
        let relay = relay(CandidatePolicy::Reject);
        let sender = TestPeer::new();
        let mut receiver = TestPeer::new();

        relay.gateway.join(&sender.handle, "sender").unwrap();
        assert_eq!(relay.router.offer(sender.id(), "sdp-A".into()), Delivery::Stored);
        relay.gateway.join(&receiver.handle, "receiver").unwrap();

        assert_eq!(receiver.drain(), vec![ServerEvent::Offer { sdp: "sdp-A".into() }]);
    }

    #[test]
    fn offer_after_receiver_is_forwarded_and_stored() {
        let relay = relay(CandidatePolicy::Reject);
        let sender = TestPeer::new();
        let mut receiver = TestPeer::new();

        relay.gateway.join(&sender.handle, "sender").unwrap();
        relay.gateway.join(&receiver.handle, "receiver").unwrap();
        assert!(receiver.drain().is_empty());

        assert_eq!(relay.router.offer(sender.id(), "sdp-B".into()), Delivery::Forwarded);

        assert_eq!(receiver.drain(), vec![ServerEvent::Offer { sdp: "sdp-B".into() }]);
        assert_eq!(relay.store.snapshot().offer.as_deref(), Some("sdp-B"));
    }

    #[test]
    fn answer_without_sender_is_stored_but_never_replayed() {
        let relay = relay(CandidatePolicy::Reject);
        let receiver = TestPeer::new();
        let mut sender = TestPeer::new();

        relay.gateway.join(&receiver.handle, "receiver").unwrap();
        assert_eq!(relay.router.answer(receiver.id(), "answer-1".into()), Delivery::Stored);
        assert_eq!(relay.store.snapshot().answer.as_deref(), Some("answer-1"));

        relay.gateway.join(&sender.handle, "sender").unwrap();

        assert!(sender.drain().is_empty());
        assert_eq!(relay.store.snapshot().answer, None);
    }

    #[test]
    fn answer_is_forwarded_to_sender() {
        let relay = relay(CandidatePolicy::Reject);
        let mut sender = TestPeer::new();
        let receiver = TestPeer::new();

        relay.gateway.join(&sender.handle, "sender").unwrap();
        relay.gateway.join(&receiver.handle, "receiver").unwrap();

        assert_eq!(relay.router.answer(receiver.id(), "answer-1".into()), Delivery::Forwarded);
        assert_eq!(sender.drain(), vec![ServerEvent::Answer { sdp: "answer-1".into() }]);
    }

    #[test]
    fn buffered_sender_candidate_arrives_before_later_ones() {
        let relay = relay(CandidatePolicy::Reject);
        let sender = TestPeer::new();
        let mut receiver = TestPeer::new();

        relay.gateway.join(&sender.handle, "sender").unwrap();
        let c1 = candidate("1.1.1.1");
        assert_eq!(
            relay.router.candidate(sender.id(), c1.clone()).unwrap(),
            (Role::Sender, Delivery::Stored)
        );
        relay.gateway.join(&receiver.handle, "receiver").unwrap();
        let c2 = candidate("2.2.2.2");
        assert_eq!(
            relay.router.candidate(sender.id(), c2.clone()).unwrap(),
            (Role::Sender, Delivery::Forwarded)
        );

        assert_eq!(
            receiver.drain(),
            vec![
                ServerEvent::Candidate { candidate: c1.clone() },
                ServerEvent::Candidate { candidate: c2.clone() },
            ]
        );
        assert_eq!(relay.store.snapshot().offer_candidates, vec![c1, c2]);
    }

    #[test]
    fn receiver_candidates_go_to_sender_and_are_not_replayed() {
        let relay = relay(CandidatePolicy::Reject);
        let mut sender = TestPeer::new();
        let receiver = TestPeer::new();

        relay.gateway.join(&receiver.handle, "receiver").unwrap();
        let early = candidate("3.3.3.3");
        assert_eq!(
            relay.router.candidate(receiver.id(), early.clone()).unwrap(),
            (Role::Receiver, Delivery::Stored)
        );
        assert_eq!(relay.store.snapshot().answer_candidates, vec![early]);

        relay.gateway.join(&sender.handle, "sender").unwrap();
        assert!(sender.drain().is_empty());

        let late = candidate("4.4.4.4");
        assert_eq!(
            relay.router.candidate(receiver.id(), late.clone()).unwrap(),
            (Role::Receiver, Delivery::Forwarded)
        );
        assert_eq!(sender.drain(), vec![ServerEvent::Candidate { candidate: late }]);
    }

    #[test]
    fn unbound_candidate_is_rejected_by_default() {
        let relay = relay(CandidatePolicy::Reject);
        let mut sender = TestPeer::new();
        let stranger = TestPeer::new();

        relay.gateway.join(&sender.handle, "sender").unwrap();
        let err = relay.router.candidate(stranger.id(), candidate("6.6.6.6")).unwrap_err();

        assert!(matches!(err, RelayError::UnattributedCandidate));
        assert!(sender.drain().is_empty());
        assert!(relay.store.snapshot().answer_candidates.is_empty());
    }

    #[test]
    fn unbound_candidate_counts_as_receiver_under_legacy_policy() {
        let relay = relay(CandidatePolicy::Legacy);
        let mut sender = TestPeer::new();
        let stranger = TestPeer::new();

        relay.gateway.join(&sender.handle, "sender").unwrap();
        let c = candidate("6.6.6.6");
        assert_eq!(
            relay.router.candidate(stranger.id(), c.clone()).unwrap(),
            (Role::Receiver, Delivery::Forwarded)
        );

        assert_eq!(sender.drain(), vec![ServerEvent::Candidate { candidate: c.clone() }]);
        assert_eq!(relay.store.snapshot().answer_candidates, vec![c]);
    }

    #[test]
    fn sender_disconnect_clears_candidates() {
        let relay = relay(CandidatePolicy::Reject);
        let sender = TestPeer::new();
        let receiver = TestPeer::new();

        relay.gateway.join(&receiver.handle, "receiver").unwrap();
        relay.gateway.join(&sender.handle, "sender").unwrap();
        relay.router.candidate(sender.id(), candidate("1.2.3.4")).unwrap();
        relay.gateway.disconnect(sender.id());

        let snapshot = relay.store.snapshot();
        assert!(snapshot.offer_candidates.is_empty());
        assert_eq!(snapshot.sender, None);
        assert_eq!(snapshot.receiver, Some(receiver.id()));
    }

    #[test]
    fn superseded_sender_candidates_count_as_unattributed() {
        let relay = relay(CandidatePolicy::Reject);
        let first = TestPeer::new();
        let second = TestPeer::new();

        relay.gateway.join(&first.handle, "sender").unwrap();
        relay.router.candidate(first.id(), candidate("1.1.1.1")).unwrap();
        relay.gateway.join(&second.handle, "sender").unwrap();

        assert!(relay.router.candidate(first.id(), candidate("1.1.1.2")).is_err());
        assert!(relay.store.snapshot().offer_candidates.is_empty());
    }

    #[test]
    fn concurrent_joins_keep_candidates_of_final_sender_only() {
        let relay = relay(CandidatePolicy::Reject);
        let senders: Vec<TestPeer> = (0..8).map(|_| TestPeer::new()).collect();
        let receivers: Vec<TestPeer> = (0..4).map(|_| TestPeer::new()).collect();
        let sender_handles: Vec<PeerHandle> = senders.iter().map(|p| p.handle.clone()).collect();
        let receiver_handles: Vec<PeerHandle> =
            receivers.iter().map(|p| p.handle.clone()).collect();

        let relay_ref = &relay;
        std::thread::scope(|scope| {
            for sender in &sender_handles {
                scope.spawn(move || {
                    for round in 0..50u64 {
                        relay_ref.gateway.join(sender, "sender").unwrap();
                        for n in 0..4u64 {
                            let mut c = Candidate::new();
                            c.insert("from".into(), json!(sender.id().to_string()));
                            c.insert("n".into(), json!(round * 4 + n));
                            // fails once another sender has taken over
                            let _ = relay_ref.router.candidate(sender.id(), c);
                        }
                    }
                });
            }
            for receiver in &receiver_handles {
                scope.spawn(move || {
                    for _ in 0..50 {
                        relay_ref.gateway.join(receiver, "receiver").unwrap();
                    }
                });
            }
        });

        let snapshot = relay.store.snapshot();
        let sender = snapshot.sender.expect("a sender is bound");
        let receiver = snapshot.receiver.expect("a receiver is bound");
        assert!(senders.iter().any(|p| p.id() == sender));
        assert!(receivers.iter().any(|p| p.id() == receiver));

        let sequence: Vec<u64> = snapshot
            .offer_candidates
            .iter()
            .map(|c| {
                assert_eq!(c["from"], json!(sender.to_string()));
                c["n"].as_u64().unwrap()
            })
            .collect();
        assert!(sequence.windows(2).all(|w| w[0] < w[1]), "{sequence:?}");
        assert!(snapshot.answer_candidates.is_empty());
    }
}
