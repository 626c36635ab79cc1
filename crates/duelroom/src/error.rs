//! Unified error type for the Duelroom server.

use duelroom_ledger::LedgerError;
use duelroom_protocol::ProtocolError;
use duelroom_room::RoomError;
use duelroom_session::SessionError;
use duelroom_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` attribute on each variant generates `From` impls, so `?`
/// converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum DuelroomError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Handshake failures: bad version, rejected token.
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Room(#[from] RoomError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A malformed environment variable or account list.
    #[error("invalid configuration: {0}")]
    Config(String),
}
