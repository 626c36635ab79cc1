//! Connection tracking for Duelroom.
//!
//! This crate knows *who* is connected:
//!
//! 1. **Identity resolution**: turning a handshake token into a username
//!    ([`Authenticator`]), or minting a guest tab id when there is none.
//! 2. **Connection registry**: every live connection, its identity and
//!    its outbound channel ([`ConnectionRegistry`]).
//! 3. **Presence**: the distinct live-user count and the change
//!    suppression applied before it is broadcast ([`PresenceTracker`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Rooms / Matchmaking (above)  ← look up outboxes and identities here
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Protocol Layer (below)  ← provides ConnectionId, Identity, ServerEvent
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod error;
mod presence;
mod registry;

pub use auth::{Authenticator, StaticAuthenticator};
pub use error::SessionError;
pub use presence::{PresenceTracker, SessionConfig};
pub use registry::{ConnectionRecord, ConnectionRegistry, Outbox, generate_tab_id};
