//! FIFO matchmaking queue.
//!
//! The queue is plain data. The server holds it behind a mutex and forms
//! a room while still holding that lock, so once two entries are popped
//! for pairing a racing `cancel` for either of them finds nothing.

use std::collections::VecDeque;

use duelroom_protocol::{ConnectionId, Identity};

/// A connection waiting for an opponent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub connection_id: ConnectionId,
    pub identity: Identity,
}

impl QueueEntry {
    pub fn new(connection_id: ConnectionId, identity: Identity) -> Self {
        Self {
            connection_id,
            identity,
        }
    }

    /// Two entries are the same person if they're tabs of one signed-in
    /// account. Guests are never the same person as anyone else.
    fn same_user_as(&self, other: &QueueEntry) -> bool {
        match (self.identity.username(), other.identity.username()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

/// Result of [`MatchQueue::dequeue_pair`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pairing {
    /// The two oldest entries, oldest first.
    Paired(QueueEntry, QueueEntry),
    /// The two oldest entries belong to the same account. The later one
    /// was removed; the earlier one keeps its place at the front.
    SelfPlay { rejected: QueueEntry },
    /// Fewer than two entries queued.
    Waiting,
}

#[derive(Debug, Default)]
pub struct MatchQueue {
    entries: VecDeque<QueueEntry>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `entry`. Returns `false` (and changes nothing) if the
    /// connection is already queued.
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        if self.contains(entry.connection_id) {
            return false;
        }
        tracing::debug!(connection_id = %entry.connection_id, "queued for match");
        self.entries.push_back(entry);
        true
    }

    /// Pops the two oldest entries if they can play each other.
    pub fn dequeue_pair(&mut self) -> Pairing {
        if self.entries.len() < 2 {
            return Pairing::Waiting;
        }

        if self.entries[0].same_user_as(&self.entries[1]) {
            return match self.entries.remove(1) {
                Some(rejected) => Pairing::SelfPlay { rejected },
                None => Pairing::Waiting,
            };
        }

        match (self.entries.pop_front(), self.entries.pop_front()) {
            (Some(first), Some(second)) => Pairing::Paired(first, second),
            _ => Pairing::Waiting,
        }
    }

    /// Removes the connection's entry. Returns whether one was present.
    pub fn cancel(&mut self, connection_id: ConnectionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.connection_id != connection_id);
        before != self.entries.len()
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.entries.iter().any(|e| e.connection_id == connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================
