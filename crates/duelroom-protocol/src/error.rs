//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or validating events.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning an event into a text frame).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown event name, a
    /// missing required field or a field of the wrong type.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The event decoded fine but violates a protocol rule, e.g. a board
    /// index outside `0..9` or a `hello` sent twice.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
