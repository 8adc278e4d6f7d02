//! Signaling relay pairing one WebRTC sender with one receiver
//!
//! The relay never touches media. It binds connections to the `sender` and
//! `receiver` roles, stores the offer, answer and ICE candidates they exchange
//! and forwards each one to the other side, buffering what a late receiver
//! needs to catch up.
//!
//! # Protocol
//!
//! Clients open a WebSocket on the configured path (`/ws` by default) and
//! exchange JSON text frames, see [`pairlink_protocol`]:
//!
//! - `{"event": "join", "data": {"role": "sender"}}` - bind to a role
//! - `{"event": "offer", "data": {"sdp": "..."}}` - forwarded to the receiver
//! - `{"event": "answer", "data": {"sdp": "..."}}` - forwarded to the sender
//! - `{"event": "candidate", "data": {"candidate": {...}}}` - forwarded to the other side
//!
//! ## Replay rules
//!
//! - A sender join starts a new handshake: stored offer, answer and candidates
//!   are discarded, the receiver stays bound.
//! - A receiver join replays the stored offer, then the stored sender
//!   candidates in arrival order.
//! - Answers and receiver candidates are never replayed.
//!
//! # Example
//!
//! ```bash
//! pairlink-server --addr 127.0.0.1:5000 --index static/index.html
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::{CandidatePolicy, RelayConfig};
pub use error::{ClientRequestError, RelayError};
pub use gateway::Gateway;
pub use handler::{RelayState, build_router, handle_socket};
pub use router::{Delivery, MessageRouter};
pub use server::RelayServer;
pub use state::{ConnectionId, PeerHandle, Session, SessionSnapshot, SessionStore};
