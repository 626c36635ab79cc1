//! Wire protocol for Duelroom.
//!
//! This crate defines the "language" that browser clients and the server
//! speak:
//!
//! - **Types** ([`Identity`], [`RoomId`], [`Mark`], [`Cell`], [`Board`]):
//!   the vocabulary shared by every layer.
//! - **Events** ([`ClientEvent`], [`ServerEvent`]): one tagged variant per
//!   named event, validated at the boundary before anything reaches the
//!   room state machine.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how events become text
//!   frames and back.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (text frames) → Protocol (events) → Session / Rooms
//! ```

mod codec;
mod error;
mod events;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use duelroom_transport::ConnectionId;
pub use error::ProtocolError;
pub use events::{BettingPlayer, ClientEvent, DepartureNotice, ServerEvent};
pub use types::{Board, Cell, EMPTY_BOARD, Identity, Mark, RoomId, Winner};

/// The current protocol version. Clients must send this in their `hello`
/// or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;
