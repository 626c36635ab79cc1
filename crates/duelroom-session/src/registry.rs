//! The connection registry: every live connection and how to reach it.
//!
//! # Concurrency note
//!
//! `ConnectionRegistry` is a plain `HashMap` wrapper. The server owns one
//! behind a mutex and every handler mutates it through that lock, so
//! register/remove never interleave with a count computation.

use std::collections::{HashMap, HashSet};
use std::time::Instant;

use duelroom_protocol::{ConnectionId, Identity, ServerEvent};
use rand::Rng;
use tokio::sync::mpsc;

use crate::SessionError;

/// Channel feeding a connection's writer task.
///
/// Unbounded so a room actor never blocks on a slow client; the writer
/// task drains it onto the socket.
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

/// The server's record of one live connection.
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub connection_id: ConnectionId,
    pub identity: Identity,
    /// The browser tab this connection claimed in its `hello`, if any.
    pub tab_id: Option<String>,
    pub joined_at: Instant,
}

impl ConnectionRecord {
    pub fn new(connection_id: ConnectionId, identity: Identity, tab_id: Option<String>) -> Self {
        Self {
            connection_id,
            identity,
            tab_id,
            joined_at: Instant::now(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_authenticated()
    }
}

/// Tracks every live connection.
///
/// One user may hold several connections (several tabs). Each connection
/// is tracked on its own so disconnects are handled per socket, but the
/// live-user count folds them together.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    records: HashMap<ConnectionId, ConnectionRecord>,
    outboxes: HashMap<ConnectionId, Outbox>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a freshly identified connection.
    ///
    /// # Errors
    /// Returns [`SessionError::AlreadyRegistered`] if the id is taken.
    pub fn register(&mut self, record: ConnectionRecord, outbox: Outbox) -> Result<(), SessionError> {
        let connection_id = record.connection_id;
        if self.records.contains_key(&connection_id) {
            return Err(SessionError::AlreadyRegistered(connection_id));
        }

        tracing::info!(
            %connection_id,
            identity = %record.identity,
            "connection registered"
        );
        self.records.insert(connection_id, record);
        self.outboxes.insert(connection_id, outbox);
        Ok(())
    }

    /// Removes a connection, returning its record if it was present.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<ConnectionRecord> {
        self.outboxes.remove(&connection_id);
        let record = self.records.remove(&connection_id)?;
        tracing::info!(
            %connection_id,
            identity = %record.identity,
            "connection removed"
        );
        Some(record)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&ConnectionRecord> {
        self.records.get(&connection_id)
    }

    /// A clone of the connection's outbound channel.
    pub fn outbox(&self, connection_id: ConnectionId) -> Option<Outbox> {
        self.outboxes.get(&connection_id).cloned()
    }

    /// Every live connection held by `identity`, in id order.
    pub fn connections_of(&self, identity: &Identity) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self
            .records
            .values()
            .filter(|r| &r.identity == identity)
            .map(|r| r.connection_id)
            .collect();
        ids.sort();
        ids
    }

    /// Distinct authenticated usernames plus distinct guest tab ids.
    pub fn live_user_count(&self) -> usize {
        self.records
            .values()
            .map(|r| &r.identity)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Queues `event` for one connection.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if the connection is gone.
    pub fn send(&self, connection_id: ConnectionId, event: ServerEvent) -> Result<(), SessionError> {
        let outbox = self
            .outboxes
            .get(&connection_id)
            .ok_or(SessionError::NotFound(connection_id))?;
        outbox
            .send(event)
            .map_err(|_| SessionError::NotFound(connection_id))
    }

    /// Queues `event` for every live connection.
    pub fn broadcast(&self, event: &ServerEvent) {
        for outbox in self.outboxes.values() {
            let _ = outbox.send(event.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Generates a random 16-character hex tab id (64 bits) for a guest that
/// didn't bring one.
pub fn generate_tab_id() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
