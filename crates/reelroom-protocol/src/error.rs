//! Error types for the protocol layer.
//!
//! Each crate in Reelroom defines its own error enum. A `ProtocolError`
//! always means the problem is in turning messages into bytes or back,
//! never in networking or room management.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning bytes into a Rust type).
    ///
    /// Common causes: malformed JSON, missing required fields, an unknown
    /// `"type"` tag, or truncated frames.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The message decoded fine but breaks a protocol rule, e.g. the first
    /// message on a connection is not a handshake.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
