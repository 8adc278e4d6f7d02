//! HTTP routes and WebSocket connection handling for the signaling relay
//!
//! - `GET {ws_path}` upgrades to a signaling connection
//! - `GET /` serves the static front-end document
//! - `GET /health` is a health check

use crate::config::RelayConfig;
use crate::error::{ClientRequestError, RelayError};
use crate::gateway::Gateway;
use crate::router::MessageRouter;
use crate::state::{ConnectionId, PeerHandle, SessionStore};
use axum::{
    Router,
    extract::{
        ConnectInfo, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use pairlink_protocol::{ClientRequest, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{MissedTickBehavior, timeout};
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Time the writer gets to flush the close frame once the read side is done
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// Everything a connection task needs, cheap to clone
#[derive(Debug, Clone)]
pub struct RelayState {
    store: SessionStore,
    gateway: Gateway,
    router: MessageRouter,
    config: Arc<RelayConfig>,
}

impl RelayState {
    pub fn new(config: RelayConfig) -> Self {
        let store = SessionStore::new();
        Self {
            gateway: Gateway::new(store.clone(), config.room.clone()),
            router: MessageRouter::new(store.clone(), config.candidate_policy),
            store,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Apply one client request on behalf of `peer`
    pub fn dispatch(&self, peer: &PeerHandle, request: ClientRequest) -> Result<(), RelayError> {
        match request {
            ClientRequest::Join { role } => {
                self.gateway.join(peer, &role)?;
            }
            ClientRequest::Offer { sdp } => {
                self.router.offer(peer.id(), sdp);
            }
            ClientRequest::Answer { sdp } => {
                self.router.answer(peer.id(), sdp);
            }
            ClientRequest::Candidate { candidate } => {
                self.router.candidate(peer.id(), candidate)?;
            }
        }
        Ok(())
    }

    pub fn disconnect(&self, id: ConnectionId) {
        self.gateway.disconnect(id);
    }
}

/// Build the HTTP router
pub fn build_router(state: RelayState) -> Router {
    let index = ServeFile::new(&state.config().index);

    Router::new()
        .route(&state.config().ws_path, get(ws_handler))
        .route("/health", get(health_check))
        .route_service("/", index)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<RelayState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, addr, state))
}

fn parse_request(
    message: Result<Message, axum::Error>,
) -> Result<Option<ClientRequest>, ClientRequestError> {
    match message? {
        Message::Text(text) => Ok(Some(text.parse()?)),
        Message::Close(_) => Err(ClientRequestError::Close),
        Message::Binary(_) => Err(ClientRequestError::UnsupportedType),
        Message::Ping(_) | Message::Pong(_) => Ok(None),
    }
}

/// Run one signaling connection until the client leaves or goes silent
///
/// Any frame, pongs included, counts as a sign of life. A connection silent
/// for longer than [`RelayConfig::idle_limit`] is released like a closed one.
pub async fn handle_socket(socket: WebSocket, addr: SocketAddr, state: RelayState) {
    let (ws_tx, mut ws_rx) = socket.split();

    let id = ConnectionId::new();
    let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();
    let (done_tx, done_rx) = oneshot::channel();
    let peer = PeerHandle::new(id, tx);
    info!(peer = %id, %addr, "signaling connection opened");

    let mut writer = tokio::spawn(write_events(
        ws_tx,
        rx,
        done_rx,
        id,
        state.config().ping_interval(),
    ));

    let idle_limit = state.config().idle_limit();
    loop {
        let message = match timeout(idle_limit, ws_rx.next()).await {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(_) => {
                warn!(peer = %id, "no frames for {idle_limit:?}, dropping connection");
                break;
            }
        };
        match parse_request(message) {
            Ok(Some(request)) => {
                if let Err(err) = state.dispatch(&peer, request) {
                    warn!(peer = %id, "{err}");
                }
            }
            Ok(None) => {}
            Err(ClientRequestError::Close) => break,
            Err(ClientRequestError::WebSocket(err)) => {
                warn!(peer = %id, "WebSocket error: {err}");
                break;
            }
            Err(err @ (ClientRequestError::Json(_) | ClientRequestError::UnsupportedType)) => {
                warn!(peer = %id, "dropping frame: {err}");
            }
        }
    }

    state.disconnect(id);
    drop(peer);
    let _ = done_tx.send(());
    if timeout(CLOSE_GRACE, &mut writer).await.is_err() {
        debug!(peer = %id, "writer stuck, aborting");
        writer.abort();
    }
    info!(peer = %id, "signaling connection closed");
}

/// Drain queued events into the socket, pinging on every interval
///
/// Ends with a close frame once `done` fires or every handle is gone.
async fn write_events(
    mut ws_tx: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<ServerEvent>,
    mut done: oneshot::Receiver<()>,
    id: ConnectionId,
    ping_interval: Duration,
) {
    let first_ping = tokio::time::Instant::now() + ping_interval;
    let mut ping = tokio::time::interval_at(first_ping, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else { break };
                if let Err(err) = ws_tx.send(Message::Text(event.to_string())).await {
                    warn!(peer = %id, "failed to send event: {err}");
                    return;
                }
            }
            _ = ping.tick() => {
                if let Err(err) = ws_tx.send(Message::Ping(Vec::new())).await {
                    debug!(peer = %id, "failed to send ping: {err}");
                    return;
                }
            }
            _ = &mut done => break,
        }
    }

    if let Err(err) = ws_tx.close().await {
        debug!(peer = %id, "failed to close: {err}");
    }
}
