//! Listener and HTTP server

use crate::config::{RelayConfig, parse_ws_path};
use crate::error::RelayError;
use crate::handler::{RelayState, build_router};
use crate::state::SessionStore;
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

/// A bound signaling relay, ready to accept connections
pub struct RelayServer {
    listener: TcpListener,
    state: RelayState,
}

impl RelayServer {
    pub async fn bind(config: RelayConfig) -> Result<Self, RelayError> {
        parse_ws_path(&config.ws_path).map_err(RelayError::InvalidWsPath)?;
        let listener = TcpListener::bind(config.addr).await?;
        Ok(Self {
            listener,
            state: RelayState::new(config),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RelayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Handle to the session shared by all connections of this server
    pub fn store(&self) -> SessionStore {
        self.state.store().clone()
    }

    /// Serve until the process exits
    pub async fn serve(self) -> Result<(), RelayError> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves
    ///
    /// Each connection runs in its own task; a failing connection is logged
    /// and never affects the others.
    pub async fn serve_with_shutdown(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), RelayError> {
        info!(
            addr = %self.local_addr()?,
            ws_path = %self.state.config().ws_path,
            "signaling relay listening"
        );

        let app = build_router(self.state);
        axum::serve(
            self.listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await?;

        info!("shut down");
        Ok(())
    }
}
