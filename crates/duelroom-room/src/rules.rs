//! Tic-tac-toe rules: pure functions over a [`Board`].

use duelroom_protocol::{Board, Mark};

/// The eight winning triples: three rows, three columns, two diagonals.
pub const LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Returns the mark that owns a complete line, if any.
pub fn evaluate(board: &Board) -> Option<Mark> {
    LINES.iter().find_map(|&[a, b, c]| {
        let mark = board[a].mark()?;
        (board[b] == board[a] && board[c] == board[a]).then_some(mark)
    })
}

/// True when no empty square is left.
pub fn is_full(board: &Board) -> bool {
    board.iter().all(|cell| !cell.is_empty())
}
