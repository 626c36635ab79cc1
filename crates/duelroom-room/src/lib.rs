//! Matchmaking and room lifecycle for Duelroom.
//!
//! Paired players get a room. Each room runs as an isolated Tokio task
//! (actor model) that owns a tic-tac-toe [`Game`], settles wagers through
//! a [`Ledger`](duelroom_ledger::Ledger), and tears itself down when its
//! players are gone.
//!
//! # Key types
//!
//! - [`MatchQueue`]: FIFO of players waiting for an opponent
//! - [`rules`]: pure win/draw evaluation
//! - [`Game`]: the pure room state machine (`Betting → Playing → Ended`)
//! - [`RoomManager`]: creates rooms, routes actions, handles departures
//! - [`RoomHandle`]: send commands to a running room actor
//! - [`RoomConfig`]: bet limits, draw policy, RNG seed

mod config;
mod error;
mod game;
mod manager;
mod matchmaking;
mod room;
pub mod rules;

pub use config::{BetLimits, DrawContinuation, RoomConfig, RoomPhase};
pub use error::RoomError;
pub use game::{BetStatus, Game, MoveOutcome, PlayerSlot};
pub use manager::RoomManager;
pub use matchmaking::{MatchQueue, Pairing, QueueEntry};
pub use room::{DepartureKind, LeaveOutcome, RoomAction, RoomHandle, RoomInfo, RoomSeat};
