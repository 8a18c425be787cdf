//! Wire protocol for Reelroom.
//!
//! This crate defines the "language" clients and the server speak:
//!
//! - **Types** ([`RoomSnapshot`], [`Player`], [`Movie`], [`TopPick`], ids) —
//!   the data model every client renders.
//! - **Messages** ([`Envelope`], [`ClientMessage`], [`ServerMessage`]) —
//!   requests and notifications.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how envelopes become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room engine (snapshots)
//! ```

mod codec;
mod error;
mod messages;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use messages::{ClientMessage, Envelope, ServerMessage};
pub use types::{
    Movie, MovieId, Player, PlayerId, RoomCode, RoomId, RoomSnapshot, RoomStatus, Swipe, TopPick,
};
