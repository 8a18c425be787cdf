//! `ReelroomServer` builder and server loop.
//!
//! Ties the layers together: transport → protocol → room engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use reelroom_catalog::MovieCatalog;
use reelroom_protocol::{Codec, JsonCodec};
use reelroom_room::{GameConfig, RegistryConfig, RoomRegistry, SessionCoordinator};
use reelroom_transport::{Transport, WebSocketTransport};

use crate::ReelroomError;
use crate::broadcast::RoomBroadcaster;
use crate::handler::handle_connection;

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default bind address.
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3001";

/// Connection-level settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// A connection that sends nothing (not even a heartbeat) for this
    /// long is closed, which also removes it from its room.
    pub idle_timeout: Duration,

    /// How long a new connection has to send its handshake.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(15),
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<M: MovieCatalog, C: Codec> {
    pub(crate) coordinator: SessionCoordinator<M>,
    pub(crate) broadcaster: RoomBroadcaster,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    started: Instant,
}

impl<M: MovieCatalog, C: Codec> ServerState<M, C> {
    /// Milliseconds since the server started.
    pub(crate) fn server_time(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// Builder for configuring and starting a Reelroom server.
///
/// # Example
///
/// ```rust,no_run
/// use reelroom::prelude::*;
///
/// # async fn run() -> Result<(), ReelroomError> {
/// let server = ReelroomServerBuilder::new()
///     .bind("127.0.0.1:3001")
///     .build(MockCatalog)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct ReelroomServerBuilder {
    bind_addr: String,
    server_config: ServerConfig,
    game_config: GameConfig,
    registry_config: RegistryConfig,
}

impl ReelroomServerBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            server_config: ServerConfig::default(),
            game_config: GameConfig::default(),
            registry_config: RegistryConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn server_config(mut self, config: ServerConfig) -> Self {
        self.server_config = config;
        self
    }

    pub fn game_config(mut self, config: GameConfig) -> Self {
        self.game_config = config;
        self
    }

    pub fn registry_config(mut self, config: RegistryConfig) -> Self {
        self.registry_config = config;
        self
    }

    /// Binds the listener and assembles the server around `catalog`.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<M: MovieCatalog>(
        self,
        catalog: M,
    ) -> Result<ReelroomServer<M, JsonCodec>, ReelroomError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let registry = Arc::new(RoomRegistry::new(self.registry_config));
        let state = Arc::new(ServerState {
            coordinator: SessionCoordinator::new(registry, catalog, self.game_config),
            broadcaster: RoomBroadcaster::default(),
            codec: JsonCodec,
            config: self.server_config,
            started: Instant::now(),
        });

        Ok(ReelroomServer { transport, state })
    }
}

impl Default for ReelroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Reelroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct ReelroomServer<M: MovieCatalog, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<M, C>>,
}

impl<M: MovieCatalog, C: Codec> ReelroomServer<M, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the accept loop until the process is terminated, spawning a
    /// handler task per connection.
    pub async fn run(mut self) -> Result<(), ReelroomError> {
        tracing::info!(addr = ?self.transport.local_addr().ok(), "Reelroom server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
