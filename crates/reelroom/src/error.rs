//! Unified error type for Reelroom.

use reelroom_protocol::ProtocolError;
use reelroom_room::RoomError;
use reelroom_transport::TransportError;

/// Top-level error that wraps every crate-specific error.
///
/// `#[from]` on each variant lets `?` convert sub-crate errors.
#[derive(Debug, thiserror::Error)]
pub enum ReelroomError {
    /// Connection, send, or receive failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encode, decode, or a message out of place (e.g. no handshake).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Room(#[from] RoomError),

    /// Bad server configuration, e.g. an unparsable environment value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let reelroom_err: ReelroomError = err.into();
        assert!(matches!(reelroom_err, ReelroomError::Transport(_)));
        assert!(reelroom_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let reelroom_err: ReelroomError = err.into();
        assert!(matches!(reelroom_err, ReelroomError::Protocol(_)));
    }

    #[test]
    fn test_from_room_error() {
        let reelroom_err: ReelroomError = RoomError::RegistryExhausted.into();
        assert!(matches!(reelroom_err, ReelroomError::Room(_)));
        assert_eq!(reelroom_err.to_string(), "no room codes available");
    }
}
