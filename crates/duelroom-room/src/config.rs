//! Room configuration and lifecycle phase.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoomConfig
// ---------------------------------------------------------------------------

/// Inclusive bounds on a single wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetLimits {
    pub min: u64,
    pub max: u64,
}

impl BetLimits {
    pub fn contains(&self, amount: u64) -> bool {
        (self.min..=self.max).contains(&amount)
    }
}

impl Default for BetLimits {
    fn default() -> Self {
        Self { min: 10, max: 1000 }
    }
}

/// What happens after a drawn round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DrawContinuation {
    /// The board is re-dealt immediately after the draw announcement.
    #[default]
    Automatic,
    /// The full board stays until a member sends `startNewRound`.
    OnRequest,
}

/// Settings shared by every room a [`RoomManager`](crate::RoomManager)
/// creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Wager bounds. `None` skips the betting phase: rooms go straight
    /// to play with nothing at stake.
    pub betting: Option<BetLimits>,

    pub draw_continuation: DrawContinuation,

    /// Seeds each room's RNG (mixed with the room id) for reproducible
    /// mark and turn assignment. `None` seeds from the OS.
    pub rng_seed: Option<u64>,

    /// Capacity of each room actor's command channel.
    pub channel_size: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            betting: Some(BetLimits::default()),
            draw_continuation: DrawContinuation::Automatic,
            rng_seed: None,
            channel_size: 64,
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// Where a room is in its lifecycle.
///
/// ```text
/// Betting ──(bets matched)──→ Playing ──(decisive win)──→ Ended
///                               ↺ draw (new round)
/// ```
///
/// A departure during `Betting` or `Playing` destroys the room outright.
/// In `Ended` the room lingers until both players have released it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoomPhase {
    Betting,
    Playing,
    Ended,
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Betting => write!(f, "Betting"),
            Self::Playing => write!(f, "Playing"),
            Self::Ended => write!(f, "Ended"),
        }
    }
}
