//! Room lifecycle and session coordination for Reelroom.
//!
//! A room moves through `waiting → playing → finished`. Players join with a
//! four-letter code, pick genres, and swipe through a frozen list of
//! movies; when the last player finishes, the room ranks the movies by
//! likes.
//!
//! # Key types
//!
//! - [`SessionCoordinator`] — every player-facing operation
//! - [`RoomRegistry`] — active rooms by id and code
//! - [`Room`] — one room's state, reached through a [`RoomHandle`]
//! - [`rank`] — the top-picks ranking
//! - [`GameConfig`] / [`RegistryConfig`] — tunables

mod config;
mod coordinator;
mod error;
mod ranking;
mod registry;
mod room;

pub use config::{GameConfig, RegistryConfig};
pub use coordinator::{LeaveOutcome, SessionCoordinator, StartOutcome};
pub use error::RoomError;
pub use ranking::rank;
pub use registry::RoomRegistry;
pub use room::{RecordedSwipe, Room, RoomHandle, SwipeOutcome};

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
