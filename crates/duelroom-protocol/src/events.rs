//! Client and server events.
//!
//! Every frame is a JSON object with an `event` name and an optional `data`
//! payload, matching the named-event style browser clients expect:
//!
//! ```json
//! { "event": "makeMove", "data": { "roomId": 7, "index": 4 } }
//! { "event": "findGame" }
//! ```
//!
//! Field names are camelCase on the wire and snake_case in Rust; serde's
//! `rename_all_fields` does the translation for every variant at once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Board, ConnectionId, Identity, Mark, RoomId, Winner};

// ---------------------------------------------------------------------------
// Client → Server
// ---------------------------------------------------------------------------

/// Events a client may send.
///
/// Anything that fails to decode into one of these variants is rejected at
/// the boundary and never reaches matchmaking or a room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// First frame on every connection. `token` signs the connection in as
    /// a user; without it the connection is a guest, keyed by `tab_id`
    /// (generated by the server if omitted).
    Hello {
        version: u32,
        #[serde(default)]
        token: Option<String>,
        #[serde(default)]
        tab_id: Option<String>,
    },

    /// Keep-alive. Echoed back as `heartbeatAck`.
    Heartbeat { client_time: u64 },

    FindGame,
    CancelSearch,

    /// Asks whether an identity (defaults to the caller's) has any live
    /// connection seated in a room.
    CheckGameStatus {
        #[serde(default)]
        identity: Option<Identity>,
    },

    PlaceBet { room_id: RoomId, bet_amount: u64 },
    ClearBet { room_id: RoomId },

    /// Claims a square. `mark` is informational only; the server always
    /// uses the mark it assigned to the sender.
    MakeMove {
        room_id: RoomId,
        index: usize,
        #[serde(default)]
        mark: Option<Mark>,
    },

    StartNewRound { room_id: RoomId },
    PlayerReadyToLeave { room_id: RoomId },
    LeaveRoom { room_id: RoomId },
    BetMenuLeave { room_id: RoomId },

    /// Polite goodbye before closing the socket.
    Disconnect {
        #[serde(default)]
        reason: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// Server → Client
// ---------------------------------------------------------------------------

/// One player's row in the betting lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BettingPlayer {
    pub id: ConnectionId,
    pub username: String,
    pub bet_amount: u64,
    pub bet_placed: bool,
}

/// Payload shared by the departure notices (`opponentLeft`,
/// `opponentLeftLobby`, `opponentDisconnected`, `playerLeft`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartureNotice {
    pub message: String,
    pub in_game: bool,
    pub in_betting: bool,
    pub game_ended: bool,
    /// Amount returned to the remaining player's balance, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refunded: Option<u64>,
}

/// Events the server sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Welcome {
        connection_id: ConnectionId,
        identity: Identity,
        /// Ledger balance for users; absent for guests.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        balance: Option<i64>,
    },
    HeartbeatAck { client_time: u64, server_time: u64 },

    UpdateUserCount { count: usize },

    Searching,
    SearchCancelled { cancelled: bool },
    SelfPlayError { message: String },
    GameStatusResponse { is_in_game: bool },

    EnterBettingLobby { room_id: RoomId, opponent: String },
    UpdateBettingInfo { room_id: RoomId, players: Vec<BettingPlayer> },
    OpponentBetPlaced { bet_amount: u64 },
    BetError { message: String },
    BothBetsPlaced,

    GameStart {
        room_id: RoomId,
        players: BTreeMap<ConnectionId, Mark>,
        /// Connection whose move it is.
        current_turn: ConnectionId,
        bets: BTreeMap<ConnectionId, u64>,
        match_count: u32,
    },
    GameUpdate { board: Board, current_turn: ConnectionId },
    GameOver {
        winner: Winner,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        winner_id: Option<ConnectionId>,
        board: Board,
        /// Set on a draw that rolls straight into another round.
        new_round: bool,
        /// Total credited to the winner; zero for draws and play money.
        payout: u64,
    },
    NewRound { board: Board, current_turn: ConnectionId, match_count: u32 },

    OpponentLeft(DepartureNotice),
    OpponentLeftLobby(DepartureNotice),
    OpponentDisconnected(DepartureNotice),
    PlayerLeft(DepartureNotice),

    #[serde(rename = "wallet-update")]
    WalletUpdate { balance: i64 },

    /// Generic failure. `code` follows HTTP conventions: 400 malformed,
    /// 401 auth, 404 unknown room, 409 wrong state, 503 unavailable.
    Error { code: u16, message: String },
}

impl ServerEvent {
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::Error {
            code,
            message: message.into(),
        }
    }

    pub fn bet_error(message: impl Into<String>) -> Self {
        Self::BetError {
            message: message.into(),
        }
    }

    /// Name of the event as it appears on the wire, for log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::HeartbeatAck { .. } => "heartbeatAck",
            Self::UpdateUserCount { .. } => "updateUserCount",
            Self::Searching => "searching",
            Self::SearchCancelled { .. } => "searchCancelled",
            Self::SelfPlayError { .. } => "selfPlayError",
            Self::GameStatusResponse { .. } => "gameStatusResponse",
            Self::EnterBettingLobby { .. } => "enterBettingLobby",
            Self::UpdateBettingInfo { .. } => "updateBettingInfo",
            Self::OpponentBetPlaced { .. } => "opponentBetPlaced",
            Self::BetError { .. } => "betError",
            Self::BothBetsPlaced => "bothBetsPlaced",
            Self::GameStart { .. } => "gameStart",
            Self::GameUpdate { .. } => "gameUpdate",
            Self::GameOver { .. } => "gameOver",
            Self::NewRound { .. } => "newRound",
            Self::OpponentLeft(_) => "opponentLeft",
            Self::OpponentLeftLobby(_) => "opponentLeftLobby",
            Self::OpponentDisconnected(_) => "opponentDisconnected",
            Self::PlayerLeft(_) => "playerLeft",
            Self::WalletUpdate { .. } => "wallet-update",
            Self::Error { .. } => "error",
        }
    }
}
