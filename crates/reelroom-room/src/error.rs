//! Error types for the room layer.

use reelroom_protocol::{PlayerId, RoomCode, RoomId};

/// Errors returned by registry and coordinator operations.
///
/// A failed operation never leaves a partial change behind: the room is
/// exactly as it was before the call.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No active room has this code or id. Also returned for a room that
    /// was destroyed while the caller still held a handle to it.
    #[error("room {0} not found")]
    RoomNotFound(String),

    /// The room has left the waiting state; it no longer admits players.
    #[error("room {0} has already started")]
    RoomAlreadyStarted(RoomCode),

    #[error("room {0} is full")]
    RoomFull(RoomCode),

    #[error("player {0} not in room {1}")]
    PlayerNotFound(PlayerId, RoomId),

    /// Every code in the alphabet is held by an active room.
    #[error("no room codes available")]
    RegistryExhausted,

    /// The room's lifecycle state doesn't allow this operation, e.g.
    /// starting a finished room.
    #[error("invalid room state for this operation: {0}")]
    InvalidState(String),
}

impl RoomError {
    pub(crate) fn not_found(room: impl std::fmt::Display) -> Self {
        Self::RoomNotFound(room.to_string())
    }
}
