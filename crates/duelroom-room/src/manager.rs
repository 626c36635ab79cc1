//! Room manager: creates rooms for paired players and routes them there.

use std::collections::HashMap;
use std::sync::Arc;

use duelroom_ledger::Ledger;
use duelroom_protocol::{ConnectionId, RoomId};

use crate::room::spawn_room;
use crate::{DepartureKind, LeaveOutcome, RoomAction, RoomConfig, RoomError, RoomHandle, RoomInfo, RoomSeat};

/// Owns every active room and knows which connection sits where.
///
/// Held by the server behind a mutex; all room creation and teardown goes
/// through here so the seating index never disagrees with the rooms map.
pub struct RoomManager<L: Ledger> {
    rooms: HashMap<RoomId, RoomHandle>,

    /// Each connection sits in at most ONE room at a time.
    player_rooms: HashMap<ConnectionId, RoomId>,

    config: RoomConfig,
    ledger: Arc<L>,
    next_room_id: u64,
}

impl<L: Ledger> RoomManager<L> {
    pub fn new(config: RoomConfig, ledger: Arc<L>) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            config,
            ledger,
            next_room_id: 1,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Seats two paired players in a new room and starts its actor.
    ///
    /// # Errors
    /// [`RoomError::AlreadyInRoom`] if either connection is already seated.
    pub fn create_room(&mut self, first: RoomSeat, second: RoomSeat) -> Result<RoomId, RoomError> {
        for seat in [&first, &second] {
            if let Some(current) = self.player_rooms.get(&seat.connection_id) {
                return Err(RoomError::AlreadyInRoom(seat.connection_id, *current));
            }
        }

        let room_id = RoomId(self.next_room_id);
        self.next_room_id += 1;

        let (a, b) = (first.connection_id, second.connection_id);
        let handle = spawn_room(room_id, first, second, self.config.clone(), Arc::clone(&self.ledger));
        self.rooms.insert(room_id, handle);
        self.player_rooms.insert(a, room_id);
        self.player_rooms.insert(b, room_id);

        tracing::info!(%room_id, first = %a, second = %b, "room created");
        Ok(room_id)
    }

    /// The room the connection is seated in, if any.
    pub fn room_of(&self, connection_id: ConnectionId) -> Option<RoomId> {
        self.player_rooms.get(&connection_id).copied()
    }

    /// Forwards an in-room action after checking the sender sits there.
    pub async fn act(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        action: RoomAction,
    ) -> Result<(), RoomError> {
        self.member_handle(connection_id, room_id)?
            .act(connection_id, action)
            .await
    }

    /// Takes a player out of a room and tears the room down if that closed
    /// it. The player is free to queue again afterwards.
    pub async fn leave(
        &mut self,
        connection_id: ConnectionId,
        room_id: RoomId,
        kind: DepartureKind,
    ) -> Result<LeaveOutcome, RoomError> {
        let handle = self.member_handle(connection_id, room_id)?.clone();

        match handle.depart(connection_id, kind).await {
            Ok(outcome) => {
                self.player_rooms.remove(&connection_id);
                if outcome.closed {
                    self.close_room(room_id);
                }
                Ok(outcome)
            }
            Err(RoomError::Unavailable(_)) => {
                tracing::warn!(%room_id, "room actor gone, dropping room");
                self.close_room(room_id);
                Err(RoomError::Unavailable(room_id))
            }
            Err(e) => Err(e),
        }
    }

    /// Forced departure for a closed socket. Returns `None` if the
    /// connection wasn't seated anywhere.
    pub async fn disconnect(&mut self, connection_id: ConnectionId) -> Option<LeaveOutcome> {
        let room_id = self.room_of(connection_id)?;
        match self.leave(connection_id, room_id, DepartureKind::Disconnect).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::warn!(%connection_id, %room_id, error = %e, "disconnect cleanup failed");
                self.player_rooms.remove(&connection_id);
                None
            }
        }
    }

    pub async fn get_room_info(&self, room_id: RoomId) -> Result<RoomInfo, RoomError> {
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        handle.get_info().await
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    fn member_handle(&self, connection_id: ConnectionId, room_id: RoomId) -> Result<&RoomHandle, RoomError> {
        let handle = self.rooms.get(&room_id).ok_or(RoomError::NotFound(room_id))?;
        match self.player_rooms.get(&connection_id) {
            Some(current) if *current == room_id => Ok(handle),
            _ => Err(RoomError::NotInRoom(connection_id, room_id)),
        }
    }

    fn close_room(&mut self, room_id: RoomId) {
        self.rooms.remove(&room_id);
        self.player_rooms.retain(|_, r| *r != room_id);
        tracing::info!(%room_id, "room destroyed");
    }
}
