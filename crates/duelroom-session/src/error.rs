//! Error types for the session layer.

use duelroom_protocol::ConnectionId;

/// Errors that can occur while identifying and tracking connections.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The handshake token was rejected by the
    /// [`Authenticator`](crate::Authenticator).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The client speaks a different protocol version.
    #[error("version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    /// No live connection with this id.
    #[error("connection {0} not registered")]
    NotFound(ConnectionId),

    /// The connection id is already in the registry.
    #[error("connection {0} already registered")]
    AlreadyRegistered(ConnectionId),
}
