//! Balance ledger for Duelroom wagers.
//!
//! Rooms never touch balances directly. They hold an `Arc<L>` where
//! `L: Ledger` and await each debit or credit as one step of a settlement.
//!
//! - [`Ledger`]: read a balance, apply a signed adjustment.
//! - [`MemoryLedger`]: an in-process ledger used by the standalone server
//!   and by tests.
//! - [`LedgerError`]: insufficient funds, unknown account, or outage.

#![allow(async_fn_in_trait)]

mod error;
mod memory;

pub use error::LedgerError;
pub use memory::MemoryLedger;

/// Atomic per-account balance store.
///
/// Every `adjust` call is a single read-modify-write: two concurrent
/// adjustments to the same account both land, none is lost.
///
/// `Send + Sync + 'static` because one ledger is shared (behind an `Arc`)
/// by every room actor.
pub trait Ledger: Send + Sync + 'static {
    /// Current balance of `username`.
    ///
    /// # Errors
    /// [`LedgerError::UnknownAccount`] if no such account exists,
    /// [`LedgerError::Unavailable`] if the store can't be reached.
    fn balance(
        &self,
        username: &str,
    ) -> impl std::future::Future<Output = Result<i64, LedgerError>> + Send;

    /// Adds `delta` (negative to debit) and returns the new balance.
    ///
    /// # Errors
    /// [`LedgerError::InsufficientFunds`] if the result would go below
    /// zero, [`LedgerError::Overflow`] if it would exceed `i64::MAX`. Either
    /// way the balance is left untouched.
    fn adjust(
        &self,
        username: &str,
        delta: i64,
    ) -> impl std::future::Future<Output = Result<i64, LedgerError>> + Send;
}
