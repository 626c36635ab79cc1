//! # Duelroom
//!
//! Realtime two-player tic-tac-toe server with matchmaking and wagers.
//!
//! Browsers hold one WebSocket per tab. Players queue with `findGame`,
//! get paired into a room, agree on a bet, and play rounds until someone
//! wins; drawn rounds re-deal with the same stakes. Bets between two
//! signed-in users settle against a [`Ledger`](duelroom_ledger::Ledger);
//! guests play for nothing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use duelroom::prelude::*;
//!
//! # async fn run() -> Result<(), DuelroomError> {
//! let auth = StaticAuthenticator::new().with_account("secret", "alice");
//! let ledger = Arc::new(MemoryLedger::new().with_account("alice", 1000));
//!
//! let server = DuelroomServerBuilder::new()
//!     .bind("0.0.0.0:3000")
//!     .build(auth, ledger)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod presence;
mod server;

pub use config::{AccountSeed, ServerConfig};
pub use error::DuelroomError;
pub use server::{DuelroomServer, DuelroomServerBuilder};

pub mod prelude {
    pub use crate::{AccountSeed, DuelroomError, DuelroomServer, DuelroomServerBuilder, ServerConfig};
    pub use duelroom_ledger::{Ledger, MemoryLedger};
    pub use duelroom_protocol::{ClientEvent, Identity, JsonCodec, PROTOCOL_VERSION, ServerEvent};
    pub use duelroom_room::{BetLimits, DrawContinuation, RoomConfig};
    pub use duelroom_session::{Authenticator, SessionConfig, StaticAuthenticator};
}
