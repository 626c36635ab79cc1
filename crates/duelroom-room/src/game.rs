//! Pure room state: seats, wagers, board, turn, and phase.
//!
//! [`Game`] never performs I/O. The room actor validates and applies every
//! transition here, then does the ledger calls and messaging around it.

use std::collections::BTreeMap;

use duelroom_protocol::{
    BettingPlayer, Board, Cell, ConnectionId, EMPTY_BOARD, Identity, Mark, RoomId,
};
use rand::Rng;

use crate::{BetLimits, RoomError, RoomPhase, rules};

/// One of the two seats in a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSlot {
    pub connection_id: ConnectionId,
    pub identity: Identity,
    /// Assigned once, when play starts.
    pub mark: Option<Mark>,
    pub bet_amount: u64,
    pub bet_confirmed: bool,
    /// Stake taken from this player's ledger account and not yet settled.
    pub debited: u64,
    /// Set in `Ended` once the player has left or is ready to leave.
    pub released: bool,
}

impl PlayerSlot {
    fn new(connection_id: ConnectionId, identity: Identity) -> Self {
        Self {
            connection_id,
            identity,
            mark: None,
            bet_amount: 0,
            bet_confirmed: false,
            debited: 0,
            released: false,
        }
    }
}

/// Where the wagers stand after a bet is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BetStatus {
    /// At least one player hasn't confirmed yet.
    Pending,
    /// Both confirmed the same amount.
    Matched(u64),
    /// Both confirmed, with different amounts.
    Mismatched,
}

/// Result of an accepted move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// No line, squares left: the turn passes.
    Continue { current_turn: Mark },
    /// `winner` completed a line with `mark`. The room is now `Ended`.
    Win { mark: Mark, winner: ConnectionId },
    /// Board full, no line.
    Draw,
}

#[derive(Debug, Clone)]
pub struct Game {
    room_id: RoomId,
    players: [PlayerSlot; 2],
    board: Board,
    phase: RoomPhase,
    current_turn: Option<Mark>,
    round_starter: Option<Mark>,
    match_count: u32,
    /// Agreed per-player wager for the room's game session.
    stake: u64,
    /// A drawn board is waiting to be re-dealt.
    round_over: bool,
}

impl Game {
    /// Seats two paired players. The room starts in `Betting`; `first` is
    /// the earlier queue entry.
    pub fn new(
        room_id: RoomId,
        first: (ConnectionId, Identity),
        second: (ConnectionId, Identity),
    ) -> Self {
        Self {
            room_id,
            players: [
                PlayerSlot::new(first.0, first.1),
                PlayerSlot::new(second.0, second.1),
            ],
            board: EMPTY_BOARD,
            phase: RoomPhase::Betting,
            current_turn: None,
            round_starter: None,
            match_count: 0,
            stake: 0,
            round_over: false,
        }
    }

    // -- Accessors --------------------------------------------------------

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn current_turn(&self) -> Option<Mark> {
        self.current_turn
    }

    pub fn match_count(&self) -> u32 {
        self.match_count
    }

    pub fn stake(&self) -> u64 {
        self.stake
    }

    pub fn is_round_over(&self) -> bool {
        self.round_over
    }

    pub fn players(&self) -> &[PlayerSlot; 2] {
        &self.players
    }

    /// Money only moves when both seats are signed-in accounts.
    pub fn is_paid(&self) -> bool {
        self.players.iter().all(|p| p.identity.is_authenticated())
    }

    /// Index of the connection's seat.
    pub fn seat(&self, connection_id: ConnectionId) -> Result<usize, RoomError> {
        self.players
            .iter()
            .position(|p| p.connection_id == connection_id)
            .ok_or(RoomError::NotInRoom(connection_id, self.room_id))
    }

    pub fn slot(&self, connection_id: ConnectionId) -> Option<&PlayerSlot> {
        self.players.iter().find(|p| p.connection_id == connection_id)
    }

    pub(crate) fn slot_mut(&mut self, seat: usize) -> &mut PlayerSlot {
        &mut self.players[seat]
    }

    pub fn opponent(&self, connection_id: ConnectionId) -> Option<&PlayerSlot> {
        let seat = self.seat(connection_id).ok()?;
        Some(&self.players[1 - seat])
    }

    pub fn connection_with(&self, mark: Mark) -> Option<ConnectionId> {
        self.players
            .iter()
            .find(|p| p.mark == Some(mark))
            .map(|p| p.connection_id)
    }

    pub fn current_turn_connection(&self) -> Option<ConnectionId> {
        self.connection_with(self.current_turn?)
    }

    // -- Betting ----------------------------------------------------------

    /// Validates a wager without recording it.
    pub fn check_bet(
        &self,
        connection_id: ConnectionId,
        amount: u64,
        limits: BetLimits,
    ) -> Result<usize, RoomError> {
        if self.phase != RoomPhase::Betting {
            return Err(RoomError::WrongPhase(self.phase));
        }
        let seat = self.seat(connection_id)?;
        if !limits.contains(amount) {
            return Err(RoomError::BetOutOfRange {
                min: limits.min,
                max: limits.max,
            });
        }
        Ok(seat)
    }

    /// Records and confirms a wager, replacing any earlier one.
    pub fn place_bet(
        &mut self,
        connection_id: ConnectionId,
        amount: u64,
        limits: BetLimits,
    ) -> Result<BetStatus, RoomError> {
        let seat = self.check_bet(connection_id, amount, limits)?;
        let slot = &mut self.players[seat];
        slot.bet_amount = amount;
        slot.bet_confirmed = true;
        Ok(self.bet_status())
    }

    /// Resets the player's wager to `0` / unconfirmed.
    pub fn clear_bet(&mut self, connection_id: ConnectionId) -> Result<(), RoomError> {
        if self.phase != RoomPhase::Betting {
            return Err(RoomError::WrongPhase(self.phase));
        }
        let seat = self.seat(connection_id)?;
        let slot = &mut self.players[seat];
        slot.bet_amount = 0;
        slot.bet_confirmed = false;
        Ok(())
    }

    /// Unconfirms both wagers so each player must place again. Amounts are
    /// kept for display.
    pub fn clear_confirmations(&mut self) {
        for slot in &mut self.players {
            slot.bet_confirmed = false;
        }
    }

    pub fn bet_status(&self) -> BetStatus {
        let [a, b] = &self.players;
        if !(a.bet_confirmed && b.bet_confirmed) {
            BetStatus::Pending
        } else if a.bet_amount == b.bet_amount {
            BetStatus::Matched(a.bet_amount)
        } else {
            BetStatus::Mismatched
        }
    }

    // -- Play -------------------------------------------------------------

    /// Leaves `Betting`: assigns marks and the first turn, clears the board
    /// and records the agreed stake.
    pub fn start<R: Rng + ?Sized>(&mut self, rng: &mut R, stake: u64) -> Result<(), RoomError> {
        if self.phase != RoomPhase::Betting {
            return Err(RoomError::WrongPhase(self.phase));
        }
        self.assign_roles(rng);
        self.stake = stake;
        self.board = EMPTY_BOARD;
        self.round_over = false;
        self.match_count = 1;
        self.phase = RoomPhase::Playing;
        Ok(())
    }

    /// The only place marks and the opening turn are drawn. Both are
    /// independent fair coin flips; queue order plays no part.
    fn assign_roles<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let first_mark = if rng.random_bool(0.5) { Mark::X } else { Mark::O };
        self.players[0].mark = Some(first_mark);
        self.players[1].mark = Some(first_mark.other());

        let opener = if rng.random_bool(0.5) { Mark::X } else { Mark::O };
        self.current_turn = Some(opener);
        self.round_starter = Some(opener);
    }

    /// Places the mover's mark at `index` and evaluates the board.
    pub fn apply_move(
        &mut self,
        connection_id: ConnectionId,
        index: usize,
    ) -> Result<MoveOutcome, RoomError> {
        if self.phase != RoomPhase::Playing {
            return Err(RoomError::WrongPhase(self.phase));
        }
        if self.round_over {
            return Err(RoomError::RoundOver);
        }
        let seat = self.seat(connection_id)?;
        if index >= self.board.len() {
            return Err(RoomError::InvalidCell(index));
        }
        let mark = self.players[seat]
            .mark
            .ok_or(RoomError::WrongPhase(self.phase))?;
        if self.current_turn != Some(mark) {
            return Err(RoomError::NotYourTurn);
        }
        if !self.board[index].is_empty() {
            return Err(RoomError::CellOccupied(index));
        }

        self.board[index] = Cell::from(mark);

        if let Some(winning) = rules::evaluate(&self.board) {
            self.phase = RoomPhase::Ended;
            return Ok(MoveOutcome::Win {
                mark: winning,
                winner: connection_id,
            });
        }
        if rules::is_full(&self.board) {
            self.round_over = true;
            return Ok(MoveOutcome::Draw);
        }

        let next = mark.other();
        self.current_turn = Some(next);
        Ok(MoveOutcome::Continue { current_turn: next })
    }

    /// Re-deals after a draw. The player who didn't open the previous
    /// round opens this one. Returns the opening mark.
    pub fn start_next_round(&mut self) -> Result<Mark, RoomError> {
        if self.phase != RoomPhase::Playing || !self.round_over {
            return Err(RoomError::WrongPhase(self.phase));
        }
        let opener = self
            .round_starter
            .map(Mark::other)
            .ok_or(RoomError::WrongPhase(self.phase))?;
        self.board = EMPTY_BOARD;
        self.round_over = false;
        self.round_starter = Some(opener);
        self.current_turn = Some(opener);
        self.match_count += 1;
        Ok(opener)
    }

    // -- Teardown ---------------------------------------------------------

    /// Marks the player as done with an `Ended` room. Returns `true` once
    /// both players are released.
    pub fn release(&mut self, connection_id: ConnectionId) -> Result<bool, RoomError> {
        if self.phase != RoomPhase::Ended {
            return Err(RoomError::WrongPhase(self.phase));
        }
        let seat = self.seat(connection_id)?;
        self.players[seat].released = true;
        Ok(self.players.iter().all(|p| p.released))
    }

    // -- Snapshots for events ----------------------------------------------

    pub fn betting_players(&self) -> Vec<BettingPlayer> {
        self.players
            .iter()
            .map(|p| BettingPlayer {
                id: p.connection_id,
                username: p.identity.display_name(),
                bet_amount: p.bet_amount,
                bet_placed: p.bet_confirmed,
            })
            .collect()
    }

    pub fn marks(&self) -> BTreeMap<ConnectionId, Mark> {
        self.players
            .iter()
            .filter_map(|p| Some((p.connection_id, p.mark?)))
            .collect()
    }

    pub fn bets(&self) -> BTreeMap<ConnectionId, u64> {
        self.players
            .iter()
            .map(|p| (p.connection_id, p.bet_amount))
            .collect()
    }
}

// =========================================================================
// Tests
// =========================================================================
