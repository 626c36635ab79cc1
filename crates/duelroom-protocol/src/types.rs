//! Core vocabulary types for Duelroom's wire format.
//!
//! Everything here is shared by every layer above the transport: who a
//! player is ([`Identity`]), which room they are in ([`RoomId`]), and what
//! the tic-tac-toe board looks like ([`Mark`], [`Cell`], [`Board`]).

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a room (one match between two players).
///
/// Newtype over `u64` so a room id can never be confused with a
/// `ConnectionId`. Serialized as a bare number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub u64);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "room-{}", self.0)
    }
}

/// Who a connection belongs to.
///
/// A signed-in **user** is identified by username and may hold several
/// connections at once (several browser tabs). A **guest** is identified by
/// a per-tab id and has no ledger account, so guests always play for play
/// money.
///
/// Serialized with an internal `kind` tag:
///
/// ```json
/// { "kind": "user", "username": "alice" }
/// { "kind": "guest", "tabId": "9f2c41d0" }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Identity {
    User { username: String },
    Guest { tab_id: String },
}

impl Identity {
    pub fn user(username: impl Into<String>) -> Self {
        Self::User {
            username: username.into(),
        }
    }

    pub fn guest(tab_id: impl Into<String>) -> Self {
        Self::Guest {
            tab_id: tab_id.into(),
        }
    }

    /// True for signed-in users, the only identities with a ledger account.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User { .. })
    }

    /// The ledger account name, if any.
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::User { username } => Some(username),
            Self::Guest { .. } => None,
        }
    }

    /// Name shown to opponents.
    pub fn display_name(&self) -> String {
        match self {
            Self::User { username } => username.clone(),
            Self::Guest { tab_id } => {
                let short: String = tab_id.chars().take(6).collect();
                format!("Guest-{short}")
            }
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User { username } => write!(f, "user:{username}"),
            Self::Guest { tab_id } => write!(f, "guest:{tab_id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Board types
// ---------------------------------------------------------------------------

/// A player's symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// The opposing mark. X moves after O and O after X.
    pub fn other(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => f.write_str("X"),
            Self::O => f.write_str("O"),
        }
    }
}

/// One square of the board. Empty squares travel as `""` so clients can
/// render the array directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Cell {
    #[default]
    #[serde(rename = "")]
    Empty,
    X,
    O,
}

impl Cell {
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }

    pub fn mark(self) -> Option<Mark> {
        match self {
            Self::Empty => None,
            Self::X => Some(Mark::X),
            Self::O => Some(Mark::O),
        }
    }
}

impl From<Mark> for Cell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Self::X,
            Mark::O => Self::O,
        }
    }
}

/// The 3x3 board in row-major order: index 0 is top-left, 8 is bottom-right.
pub type Board = [Cell; 9];

/// A board with every square empty.
pub const EMPTY_BOARD: Board = [Cell::Empty; 9];

/// Outcome of a finished round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    X,
    O,
    #[serde(rename = "draw")]
    Draw,
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Self::X,
            Mark::O => Self::O,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // RoomId
    // =====================================================================

    #[test]
    fn test_room_id_serializes_as_plain_number() {
        let json = serde_json::to_string(&RoomId(17)).unwrap();
        assert_eq!(json, "17");
    }

    #[test]
    fn test_room_id_display_format() {
        assert_eq!(RoomId(3).to_string(), "room-3");
    }

    // =====================================================================
    // Identity
    // =====================================================================

    #[test]
    fn test_identity_user_json_shape() {
        let value = serde_json::to_value(Identity::user("alice")).unwrap();
        assert_eq!(value["kind"], "user");
        assert_eq!(value["username"], "alice");
    }

    #[test]
    fn test_identity_guest_json_uses_camel_case_tab_id() {
        let value = serde_json::to_value(Identity::guest("ab12")).unwrap();
        assert_eq!(value["kind"], "guest");
        assert_eq!(value["tabId"], "ab12");
    }

    #[test]
    fn test_identity_only_users_are_authenticated() {
        assert!(Identity::user("bob").is_authenticated());
        assert!(!Identity::guest("t1").is_authenticated());
        assert_eq!(Identity::user("bob").username(), Some("bob"));
        assert_eq!(Identity::guest("t1").username(), None);
    }

    #[test]
    fn test_identity_guest_display_name_is_shortened() {
        assert_eq!(Identity::guest("0123456789").display_name(), "Guest-012345");
    }

    // =====================================================================
    // Board
    // =====================================================================

    #[test]
    fn test_empty_cell_serializes_as_empty_string() {
        let json = serde_json::to_string(&[Cell::Empty, Cell::X, Cell::O]).unwrap();
        assert_eq!(json, r#"["","X","O"]"#);
    }

    #[test]
    fn test_board_deserializes_from_strings() {
        let board: Board =
            serde_json::from_str(r#"["X","","","","O","","","",""]"#).unwrap();
        assert_eq!(board[0], Cell::X);
        assert_eq!(board[4], Cell::O);
        assert!(board[8].is_empty());
    }

    #[test]
    fn test_mark_other_alternates() {
        assert_eq!(Mark::X.other(), Mark::O);
        assert_eq!(Mark::O.other(), Mark::X);
    }

    #[test]
    fn test_winner_draw_is_lowercase() {
        assert_eq!(serde_json::to_string(&Winner::Draw).unwrap(), r#""draw""#);
        assert_eq!(serde_json::to_string(&Winner::from(Mark::O)).unwrap(), r#""O""#);
    }
}
