//! Error types for the signaling relay

use thiserror::Error;

/// Errors that can occur while running the relay
#[derive(Error, Debug)]
pub enum RelayError {
    /// Socket or file I/O failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Signaling path unusable as a route
    #[error("Invalid WebSocket path: {0}")]
    InvalidWsPath(String),

    /// Join request named neither `sender` nor `receiver`
    #[error("Invalid role: {0:?}")]
    InvalidRole(String),

    /// Candidate from a connection bound to neither role
    #[error("Candidate from a connection bound to neither role")]
    UnattributedCandidate,
}

/// Errors from client frames
#[derive(Error, Debug)]
pub enum ClientRequestError {
    /// Connection was closed
    #[error("Connection closed")]
    Close,

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unsupported message type
    #[error("Unsupported message type")]
    UnsupportedType,

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] axum::Error),
}
