//! Wire types for the pairlink signaling relay
//!
//! Every frame exchanged over the signaling channel is a JSON object of the
//! form `{"event": <name>, "data": <payload>}`.
//!
//! ## Client → server
//!
//! - `{"event": "join", "data": {"role": "sender"}}`
//! - `{"event": "offer", "data": {"sdp": "..."}}`
//! - `{"event": "answer", "data": {"sdp": "..."}}`
//! - `{"event": "candidate", "data": {"candidate": {...}}}`
//!
//! ## Server → client
//!
//! - `{"event": "joined", "data": {"room": "my_room", "role": "sender"}}`
//! - `offer`, `answer` and `candidate` with the same payloads as above

#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// An ICE candidate as produced by `RTCIceCandidate.toJSON()`.
///
/// The relay never inspects candidates, it only requires them to be objects.
pub type Candidate = serde_json::Map<String, serde_json::Value>;

/// One side of the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Media-offering party
    Sender,
    /// Media-accepting party
    Receiver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sender => "sender",
            Role::Receiver => "receiver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A join request named a role other than `sender` or `receiver`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown role: {0:?}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sender" => Ok(Role::Sender),
            "receiver" => Ok(Role::Receiver),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Requests a client can make to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ClientRequest {
    /// Bind this connection to a role.
    ///
    /// The role is kept as the raw string so that the acknowledgment can echo
    /// back whatever the client sent, even when it is not a valid [`Role`].
    Join { role: String },
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate { candidate: Candidate },
}

/// Events the relay delivers to a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Acknowledgment of a join request
    Joined { room: String, role: String },
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate { candidate: Candidate },
}

impl fmt::Display for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let serialized = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{serialized}")
    }
}

impl FromStr for ClientRequest {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

impl fmt::Display for ServerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let serialized = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        write!(f, "{serialized}")
    }
}

impl FromStr for ServerEvent {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}
