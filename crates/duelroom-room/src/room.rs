//! Room actor: an isolated Tokio task that owns one [`Game`].
//!
//! Every room runs in its own task and processes commands one at a time
//! from an mpsc channel. Ledger calls are awaited inside the actor, so a
//! settlement finishes before the next command (a move, or the opponent's
//! disconnect) is looked at.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use duelroom_ledger::{Ledger, LedgerError};
use duelroom_protocol::{
    Board, ConnectionId, DepartureNotice, Identity, Mark, RoomId, ServerEvent, Winner,
};
use duelroom_session::Outbox;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::{mpsc, oneshot};

use crate::game::{BetStatus, Game, MoveOutcome};
use crate::{DrawContinuation, RoomConfig, RoomError, RoomPhase};

/// A player entering a room: who they are and where their events go.
#[derive(Debug, Clone)]
pub struct RoomSeat {
    pub connection_id: ConnectionId,
    pub identity: Identity,
    pub outbox: Outbox,
}

/// In-room actions a player can take. Results reach the player as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAction {
    PlaceBet { amount: u64 },
    ClearBet,
    Move { index: usize },
    StartNewRound,
}

/// How a player is leaving. Decides which notice the opponent gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepartureKind {
    /// `leaveRoom`.
    Leave,
    /// `betMenuLeave`: walked out of the betting lobby.
    BetMenuLeave,
    /// `playerReadyToLeave`: only valid once the game has ended.
    ReadyToLeave,
    /// The socket went away.
    Disconnect,
}

impl DepartureKind {
    fn notice(self) -> &'static str {
        match self {
            Self::Leave => "Opponent left the game",
            Self::BetMenuLeave => "Opponent left the betting lobby",
            Self::ReadyToLeave => "Opponent left the room",
            Self::Disconnect => "Opponent disconnected",
        }
    }
}

/// What a departure did to the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The room is gone; neither player is seated any more.
    pub closed: bool,
    /// Stake returned to the remaining player.
    pub refunded: u64,
}

/// A snapshot of room state, mainly for tests and diagnostics.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub phase: RoomPhase,
    pub board: Board,
    pub current_turn: Option<Mark>,
    pub match_count: u32,
    pub stake: u64,
    pub players: Vec<ConnectionId>,
    pub marks: BTreeMap<ConnectionId, Mark>,
    pub bets: BTreeMap<ConnectionId, u64>,
}

/// Commands sent to a room actor through its channel.
enum RoomCommand {
    Act {
        connection_id: ConnectionId,
        action: RoomAction,
    },
    Depart {
        connection_id: ConnectionId,
        kind: DepartureKind,
        reply: oneshot::Sender<Result<LeaveOutcome, RoomError>>,
    },
    GetInfo {
        reply: oneshot::Sender<RoomInfo>,
    },
}

/// Handle to a running room actor. Cheap to clone.
#[derive(Clone)]
pub struct RoomHandle {
    room_id: RoomId,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    /// Queues an in-room action (fire-and-forget).
    pub async fn act(&self, connection_id: ConnectionId, action: RoomAction) -> Result<(), RoomError> {
        self.sender
            .send(RoomCommand::Act {
                connection_id,
                action,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }

    /// Removes a player and waits for the room to settle the departure.
    pub async fn depart(
        &self,
        connection_id: ConnectionId,
        kind: DepartureKind,
    ) -> Result<LeaveOutcome, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::Depart {
                connection_id,
                kind,
                reply: reply_tx,
            })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?
    }

    pub async fn get_info(&self) -> Result<RoomInfo, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetInfo { reply: reply_tx })
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.room_id))
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor<L: Ledger> {
    game: Game,
    config: RoomConfig,
    ledger: Arc<L>,
    rng: StdRng,
    /// Per-player outbound channels. A player released from an ended room
    /// is dropped from here.
    outboxes: HashMap<ConnectionId, Outbox>,
    receiver: mpsc::Receiver<RoomCommand>,
}

impl<L: Ledger> RoomActor<L> {
    /// Runs the actor loop until the room closes or every handle is gone.
    async fn run(mut self) {
        let room_id = self.game.room_id();
        tracing::info!(%room_id, paid = self.game.is_paid(), "room actor started");

        self.open();

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Act {
                    connection_id,
                    action,
                } => {
                    if let Err(e) = self.handle_action(connection_id, action).await {
                        tracing::debug!(
                            %room_id,
                            %connection_id,
                            ?action,
                            error = %e,
                            "action rejected"
                        );
                        self.send_to(connection_id, e.to_event());
                    }
                }
                RoomCommand::Depart {
                    connection_id,
                    kind,
                    reply,
                } => {
                    let result = self.handle_departure(connection_id, kind).await;
                    let closed = matches!(result, Ok(LeaveOutcome { closed: true, .. }));
                    let _ = reply.send(result);
                    if closed {
                        break;
                    }
                }
                RoomCommand::GetInfo { reply } => {
                    let _ = reply.send(self.info());
                }
            }
        }

        tracing::info!(%room_id, "room actor stopped");
    }

    /// First events after pairing: the betting lobby, or straight to play
    /// when wagers are disabled.
    fn open(&mut self) {
        let room_id = self.game.room_id();
        if self.config.betting.is_some() {
            let lobby: Vec<(ConnectionId, String)> = self
                .game
                .players()
                .iter()
                .filter_map(|p| {
                    let opponent = self.game.opponent(p.connection_id)?;
                    Some((p.connection_id, opponent.identity.display_name()))
                })
                .collect();
            for (connection_id, opponent) in lobby {
                self.send_to(connection_id, ServerEvent::EnterBettingLobby { room_id, opponent });
            }
            self.broadcast_betting_info();
            return;
        }

        match self.game.start(&mut self.rng, 0) {
            Ok(()) => self.broadcast_game_start(),
            Err(e) => tracing::error!(%room_id, error = %e, "room failed to start"),
        }
    }

    async fn handle_action(&mut self, connection_id: ConnectionId, action: RoomAction) -> Result<(), RoomError> {
        match action {
            RoomAction::PlaceBet { amount } => self.place_bet(connection_id, amount).await,
            RoomAction::ClearBet => self.clear_bet(connection_id),
            RoomAction::Move { index } => self.make_move(connection_id, index).await,
            RoomAction::StartNewRound => {
                self.game.seat(connection_id)?;
                self.deal_next_round()
            }
        }
    }

    // -- Betting ----------------------------------------------------------

    async fn place_bet(&mut self, connection_id: ConnectionId, amount: u64) -> Result<(), RoomError> {
        let limits = self
            .config
            .betting
            .ok_or(RoomError::WrongPhase(self.game.phase()))?;
        let seat = self.game.check_bet(connection_id, amount, limits)?;

        if self.game.is_paid() {
            if let Some(username) = self.account(seat) {
                let balance = self.ledger.balance(&username).await?;
                if balance < to_delta(amount) {
                    return Err(RoomError::InsufficientBalance);
                }
            }
        }

        let status = self.game.place_bet(connection_id, amount, limits)?;
        tracing::info!(room_id = %self.game.room_id(), %connection_id, amount, "bet placed");

        if let Some(opponent) = self.game.opponent(connection_id).map(|p| p.connection_id) {
            self.send_to(opponent, ServerEvent::OpponentBetPlaced { bet_amount: amount });
        }
        self.broadcast_betting_info();

        match status {
            BetStatus::Pending => Ok(()),
            BetStatus::Mismatched => {
                tracing::debug!(room_id = %self.game.room_id(), "bet amounts differ");
                self.game.clear_confirmations();
                self.broadcast(ServerEvent::bet_error(RoomError::BetMismatch.to_string()));
                self.broadcast_betting_info();
                Ok(())
            }
            BetStatus::Matched(stake) => self.begin_play(stake).await,
        }
    }

    fn clear_bet(&mut self, connection_id: ConnectionId) -> Result<(), RoomError> {
        if self.config.betting.is_none() {
            return Err(RoomError::WrongPhase(self.game.phase()));
        }
        self.game.clear_bet(connection_id)?;
        self.broadcast_betting_info();
        Ok(())
    }

    /// Both bets agree: take the stakes, then deal.
    async fn begin_play(&mut self, stake: u64) -> Result<(), RoomError> {
        if self.game.is_paid() {
            if let Err(e) = self.collect_stakes(stake).await {
                tracing::warn!(room_id = %self.game.room_id(), error = %e, "stake collection failed");
                self.game.clear_confirmations();
                self.broadcast(ServerEvent::bet_error(e.to_string()));
                self.broadcast_betting_info();
                return Ok(());
            }
        }

        self.broadcast(ServerEvent::BothBetsPlaced);
        self.game.start(&mut self.rng, stake)?;
        tracing::info!(
            room_id = %self.game.room_id(),
            stake,
            paid = self.game.is_paid(),
            "game started"
        );
        self.broadcast_game_start();
        Ok(())
    }

    /// Debits both players. If the second debit fails the first is
    /// credited back, so either both stakes are held or neither is.
    async fn collect_stakes(&mut self, stake: u64) -> Result<(), RoomError> {
        let mut collected = Vec::with_capacity(2);
        for seat in 0..2 {
            match self.debit(seat, stake).await {
                Ok(()) => collected.push(seat),
                Err(e) => {
                    for done in collected {
                        self.refund(done).await;
                    }
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }

    // -- Play -------------------------------------------------------------

    async fn make_move(&mut self, connection_id: ConnectionId, index: usize) -> Result<(), RoomError> {
        let outcome = self.game.apply_move(connection_id, index)?;
        let board = *self.game.board();

        match outcome {
            MoveOutcome::Continue { .. } => {
                if let Some(current_turn) = self.game.current_turn_connection() {
                    self.broadcast(ServerEvent::GameUpdate { board, current_turn });
                }
            }
            MoveOutcome::Win { mark, winner } => {
                let payout = self.pay_winner(winner).await;
                tracing::info!(room_id = %self.game.room_id(), %winner, payout, "game won");
                self.broadcast(ServerEvent::GameOver {
                    winner: Winner::from(mark),
                    winner_id: Some(winner),
                    board,
                    new_round: false,
                    payout,
                });
            }
            MoveOutcome::Draw => {
                let automatic = self.config.draw_continuation == DrawContinuation::Automatic;
                tracing::info!(
                    room_id = %self.game.room_id(),
                    match_count = self.game.match_count(),
                    "round drawn"
                );
                self.broadcast(ServerEvent::GameOver {
                    winner: Winner::Draw,
                    winner_id: None,
                    board,
                    new_round: automatic,
                    payout: 0,
                });
                if automatic {
                    self.deal_next_round()?;
                }
            }
        }
        Ok(())
    }

    fn deal_next_round(&mut self) -> Result<(), RoomError> {
        let opener = self.game.start_next_round()?;
        let Some(current_turn) = self.game.connection_with(opener) else {
            return Ok(());
        };
        self.broadcast(ServerEvent::NewRound {
            board: *self.game.board(),
            current_turn,
            match_count: self.game.match_count(),
        });
        Ok(())
    }

    /// Credits the winner both stakes. Returns the amount paid.
    async fn pay_winner(&mut self, winner: ConnectionId) -> u64 {
        let stake = self.game.stake();
        if !self.game.is_paid() || stake == 0 {
            return 0;
        }
        let Ok(seat) = self.game.seat(winner) else {
            return 0;
        };

        let payout = stake.saturating_mul(2);
        match self.credit(seat, payout).await {
            Ok(_) => {
                for seat in 0..2 {
                    self.game.slot_mut(seat).debited = 0;
                }
                payout
            }
            Err(e) => {
                tracing::error!(
                    room_id = %self.game.room_id(),
                    %winner,
                    payout,
                    error = %e,
                    "payout failed"
                );
                self.send_to(winner, ServerEvent::bet_error(format!("Payout failed: {e}")));
                0
            }
        }
    }

    // -- Departures -------------------------------------------------------

    async fn handle_departure(
        &mut self,
        connection_id: ConnectionId,
        kind: DepartureKind,
    ) -> Result<LeaveOutcome, RoomError> {
        let room_id = self.game.room_id();
        let seat = self.game.seat(connection_id)?;
        let phase = self.game.phase();
        let opponent = self.game.players()[1 - seat].clone();

        if phase == RoomPhase::Ended {
            let closed = self.game.release(connection_id)?;
            self.outboxes.remove(&connection_id);
            if !opponent.released {
                self.send_to(
                    opponent.connection_id,
                    ServerEvent::PlayerLeft(DepartureNotice {
                        message: kind.notice().to_owned(),
                        game_ended: true,
                        ..Default::default()
                    }),
                );
            }
            tracing::info!(%room_id, %connection_id, closed, "player released ended room");
            return Ok(LeaveOutcome { closed, refunded: 0 });
        }

        if kind == DepartureKind::ReadyToLeave {
            return Err(RoomError::WrongPhase(phase));
        }

        // The departed player's stake is forfeit; only the one who stays
        // gets theirs back.
        let refunded = self.refund(1 - seat).await;
        let notice = DepartureNotice {
            message: kind.notice().to_owned(),
            in_game: phase == RoomPhase::Playing,
            in_betting: phase == RoomPhase::Betting,
            game_ended: false,
            refunded: (refunded > 0).then_some(refunded),
        };
        let event = match kind {
            DepartureKind::Disconnect => ServerEvent::OpponentDisconnected(notice),
            DepartureKind::BetMenuLeave => ServerEvent::OpponentLeftLobby(notice),
            DepartureKind::Leave | DepartureKind::ReadyToLeave => ServerEvent::OpponentLeft(notice),
        };
        self.send_to(opponent.connection_id, event);

        tracing::info!(%room_id, %connection_id, %phase, ?kind, refunded, "room closed by departure");
        Ok(LeaveOutcome {
            closed: true,
            refunded,
        })
    }

    // -- Ledger helpers ---------------------------------------------------

    fn account(&self, seat: usize) -> Option<String> {
        self.game.players()[seat].identity.username().map(str::to_owned)
    }

    async fn debit(&mut self, seat: usize, amount: u64) -> Result<(), LedgerError> {
        let Some(username) = self.account(seat) else {
            return Ok(());
        };
        let balance = self.ledger.adjust(&username, -to_delta(amount)).await?;
        self.game.slot_mut(seat).debited = amount;
        let connection_id = self.game.players()[seat].connection_id;
        tracing::info!(room_id = %self.game.room_id(), %username, amount, balance, "stake debited");
        self.send_to(connection_id, ServerEvent::WalletUpdate { balance });
        Ok(())
    }

    async fn credit(&mut self, seat: usize, amount: u64) -> Result<i64, LedgerError> {
        let Some(username) = self.account(seat) else {
            return Ok(0);
        };
        let balance = self.ledger.adjust(&username, to_delta(amount)).await?;
        let connection_id = self.game.players()[seat].connection_id;
        tracing::info!(room_id = %self.game.room_id(), %username, amount, balance, "balance credited");
        self.send_to(connection_id, ServerEvent::WalletUpdate { balance });
        Ok(balance)
    }

    /// Returns whatever is still held for `seat`. A failed refund is
    /// logged and the stake stays recorded as held.
    async fn refund(&mut self, seat: usize) -> u64 {
        let held = self.game.players()[seat].debited;
        if held == 0 {
            return 0;
        }
        match self.credit(seat, held).await {
            Ok(_) => {
                self.game.slot_mut(seat).debited = 0;
                held
            }
            Err(e) => {
                tracing::error!(
                    room_id = %self.game.room_id(),
                    seat,
                    amount = held,
                    error = %e,
                    "refund failed, stake still held"
                );
                0
            }
        }
    }

    // -- Messaging --------------------------------------------------------

    fn broadcast_betting_info(&self) {
        self.broadcast(ServerEvent::UpdateBettingInfo {
            room_id: self.game.room_id(),
            players: self.game.betting_players(),
        });
    }

    fn broadcast_game_start(&self) {
        let Some(current_turn) = self.game.current_turn_connection() else {
            return;
        };
        self.broadcast(ServerEvent::GameStart {
            room_id: self.game.room_id(),
            players: self.game.marks(),
            current_turn,
            bets: self.game.bets(),
            match_count: self.game.match_count(),
        });
    }

    fn broadcast(&self, event: ServerEvent) {
        for outbox in self.outboxes.values() {
            let _ = outbox.send(event.clone());
        }
    }

    /// Silently drops the event if the player's connection is gone.
    fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) {
        if let Some(outbox) = self.outboxes.get(&connection_id) {
            let _ = outbox.send(event);
        }
    }

    fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.game.room_id(),
            phase: self.game.phase(),
            board: *self.game.board(),
            current_turn: self.game.current_turn(),
            match_count: self.game.match_count(),
            stake: self.game.stake(),
            players: self.game.players().iter().map(|p| p.connection_id).collect(),
            marks: self.game.marks(),
            bets: self.game.bets(),
        }
    }
}

fn to_delta(amount: u64) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}

/// Spawns a room actor for a freshly paired couple and returns its handle.
pub(crate) fn spawn_room<L: Ledger>(
    room_id: RoomId,
    first: RoomSeat,
    second: RoomSeat,
    config: RoomConfig,
    ledger: Arc<L>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(config.channel_size.max(1));

    let rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed ^ room_id.0),
        None => StdRng::from_os_rng(),
    };

    let game = Game::new(
        room_id,
        (first.connection_id, first.identity),
        (second.connection_id, second.identity),
    );
    let outboxes = HashMap::from([
        (first.connection_id, first.outbox),
        (second.connection_id, second.outbox),
    ]);

    let actor = RoomActor {
        game,
        config,
        ledger,
        rng,
        outboxes,
        receiver: rx,
    };

    tokio::spawn(actor.run());

    RoomHandle { room_id, sender: tx }
}
