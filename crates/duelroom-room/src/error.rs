//! Error types for the room layer.

use duelroom_ledger::LedgerError;
use duelroom_protocol::{ConnectionId, RoomId, ServerEvent};

use crate::RoomPhase;

/// Errors that can occur during matchmaking and room operations.
///
/// None of these are faults: each one is reported to the acting
/// connection and leaves room state unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room {0} not found")]
    NotFound(RoomId),

    #[error("connection {0} not in room {1}")]
    NotInRoom(ConnectionId, RoomId),

    /// The connection is already seated in a room.
    #[error("connection {0} already in room {1}")]
    AlreadyInRoom(ConnectionId, RoomId),

    #[error("You cannot play against yourself")]
    SelfPlay,

    #[error("not your turn")]
    NotYourTurn,

    #[error("cell {0} is already taken")]
    CellOccupied(usize),

    /// A drawn round is waiting for `startNewRound`.
    #[error("round is over, waiting for a new round")]
    RoundOver,

    #[error("cell {0} is off the board")]
    InvalidCell(usize),

    /// The action isn't allowed in the room's current phase.
    #[error("cannot do that while the room is in {0}")]
    WrongPhase(RoomPhase),

    #[error("Bet must be between {min} and {max}")]
    BetOutOfRange { min: u64, max: u64 },

    #[error("Insufficient balance")]
    InsufficientBalance,

    #[error("Bet amounts must match")]
    BetMismatch,

    /// A ledger call failed while moving stakes.
    #[error("settlement failed: {0}")]
    Settlement(#[from] LedgerError),

    /// The room's command channel is full or closed.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),
}

impl RoomError {
    /// HTTP-style status code for `error` events.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidCell(_) | Self::BetOutOfRange { .. } => 400,
            Self::NotFound(_) | Self::NotInRoom(..) => 404,
            Self::Settlement(LedgerError::Unavailable(_)) | Self::Unavailable(_) => 503,
            _ => 409,
        }
    }

    /// The event that tells the acting client what went wrong.
    pub fn to_event(&self) -> ServerEvent {
        match self {
            Self::BetOutOfRange { .. }
            | Self::InsufficientBalance
            | Self::BetMismatch
            | Self::Settlement(_) => ServerEvent::bet_error(self.to_string()),
            Self::SelfPlay => ServerEvent::SelfPlayError {
                message: self.to_string(),
            },
            _ => ServerEvent::error(self.code(), self.to_string()),
        }
    }
}
