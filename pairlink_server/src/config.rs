//! Command line and environment configuration

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// How to treat a candidate from a connection bound to neither role
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CandidatePolicy {
    /// Drop it
    #[default]
    Reject,
    /// Store it as a receiver candidate and forward it to the sender
    Legacy,
}

/// Pairlink signaling relay
///
/// Pairs one WebRTC sender with one receiver and relays their offer, answer
/// and ICE candidates.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct RelayConfig {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:5000", env = "PAIRLINK_ADDR")]
    pub addr: SocketAddr,

    /// Request path that is upgraded to the signaling WebSocket
    #[arg(
        long,
        default_value = "/ws",
        env = "PAIRLINK_WS_PATH",
        value_parser = parse_ws_path
    )]
    pub ws_path: String,

    /// Static front-end document served on `GET /`
    #[arg(long, default_value = "static/index.html", env = "PAIRLINK_INDEX")]
    pub index: PathBuf,

    /// Room label echoed back in join acknowledgments
    #[arg(long, default_value = "my_room", env = "PAIRLINK_ROOM")]
    pub room: String,

    /// Handling of candidates from connections bound to neither role
    #[arg(
        long,
        value_enum,
        default_value_t = CandidatePolicy::Reject,
        env = "PAIRLINK_CANDIDATE_POLICY"
    )]
    pub candidate_policy: CandidatePolicy,

    /// Milliseconds between WebSocket pings sent to each client
    #[arg(long, default_value_t = 25_000, env = "PAIRLINK_PING_INTERVAL_MS")]
    pub ping_interval_ms: u64,

    /// Milliseconds past a ping interval without any frame before a client is dropped
    #[arg(long, default_value_t = 20_000, env = "PAIRLINK_PING_TIMEOUT_MS")]
    pub ping_timeout_ms: u64,
}

impl RelayConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// How long a connection may stay silent before it counts as gone
    pub fn idle_limit(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms + self.ping_timeout_ms)
    }
}

/// The signaling path must be a route of its own, apart from `/` and `/health`
pub(crate) fn parse_ws_path(path: &str) -> Result<String, String> {
    if !path.starts_with('/') {
        return Err(format!("{path:?} must start with '/'"));
    }
    if path == "/" || path == "/health" {
        return Err(format!("{path:?} is reserved"));
    }
    Ok(path.to_string())
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            ws_path: "/ws".to_string(),
            index: PathBuf::from("static/index.html"),
            room: "my_room".to_string(),
            candidate_policy: CandidatePolicy::Reject,
            ping_interval_ms: 25_000,
            ping_timeout_ms: 20_000,
        }
    }
}
