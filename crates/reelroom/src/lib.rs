//! # Reelroom
//!
//! Real-time group movie picking. Friends join a room with a four-letter
//! code, pick genres, and swipe through the same list of movies; when the
//! last player finishes, everyone sees the movies the group liked most.
//!
//! The server speaks JSON envelopes over WebSockets. This crate wires the
//! layers together:
//!
//! ```text
//! reelroom-transport → reelroom-protocol → reelroom-room ← reelroom-catalog
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use reelroom::prelude::*;
//!
//! # async fn run() -> Result<(), ReelroomError> {
//! let server = ReelroomServerBuilder::new()
//!     .bind("0.0.0.0:3001")
//!     .build(TmdbCatalog::from_env())
//!     .await?;
//! server.run().await
//! # }
//! ```

mod broadcast;
mod error;
mod handler;
mod server;

pub use error::ReelroomError;
pub use server::{
    DEFAULT_BIND_ADDR, PROTOCOL_VERSION, ReelroomServer, ReelroomServerBuilder, ServerConfig,
};

/// Installs the global `tracing` subscriber.
///
/// Filtering comes from `RUST_LOG`, falling back to `default_filter`
/// (e.g. `"info"`). Calling it twice is harmless; the second call is a
/// no-op.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Everything needed to run a server or write a client against it.
pub mod prelude {
    pub use crate::{
        PROTOCOL_VERSION, ReelroomError, ReelroomServer, ReelroomServerBuilder, ServerConfig,
        init_tracing,
    };
    pub use reelroom_catalog::{MockCatalog, MovieCatalog, TmdbCatalog, TmdbConfig};
    pub use reelroom_protocol::{
        ClientMessage, Codec, Envelope, JsonCodec, Movie, MovieId, Player, PlayerId, RoomCode,
        RoomId, RoomSnapshot, RoomStatus, ServerMessage, Swipe, TopPick,
    };
    pub use reelroom_room::{GameConfig, RegistryConfig, RoomError};
}
