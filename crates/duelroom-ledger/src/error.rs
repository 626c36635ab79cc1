//! Error types for the ledger.

/// Errors a [`Ledger`](crate::Ledger) call can fail with.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// The adjustment would take the balance below zero.
    #[error("insufficient funds for {username}: balance {balance}, requested {requested}")]
    InsufficientFunds {
        username: String,
        balance: i64,
        requested: u64,
    },

    /// A credit would push the balance past `i64::MAX`. Nothing was applied.
    #[error("balance overflow for {username}")]
    Overflow { username: String },

    #[error("unknown account {0}")]
    UnknownAccount(String),

    /// The backing store can't be reached. Nothing was applied.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}
