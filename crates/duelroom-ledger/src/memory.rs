//! In-memory [`Ledger`] implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;

use crate::{Ledger, LedgerError};

/// A ledger that keeps every balance in a mutex-guarded map.
///
/// The lock is held across the whole read-modify-write of an `adjust`,
/// which makes each call atomic per account.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    accounts: Mutex<HashMap<String, i64>>,
    offline: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style account seeding, used before the ledger is shared.
    pub fn with_account(self, username: impl Into<String>, balance: i64) -> Self {
        let Self { accounts, offline } = self;
        let mut accounts = accounts.into_inner();
        accounts.insert(username.into(), balance);
        Self {
            accounts: Mutex::new(accounts),
            offline,
        }
    }

    /// Opens (or resets) an account with the given balance.
    pub async fn open_account(&self, username: impl Into<String>, balance: i64) {
        let username = username.into();
        tracing::debug!(%username, balance, "ledger account opened");
        self.accounts.lock().await.insert(username, balance);
    }

    /// Simulates an outage: while offline every call fails with
    /// [`LedgerError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> Result<(), LedgerError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(LedgerError::Unavailable("memory ledger offline".into()));
        }
        Ok(())
    }
}

impl Ledger for MemoryLedger {
    async fn balance(&self, username: &str) -> Result<i64, LedgerError> {
        self.check_online()?;
        self.accounts
            .lock()
            .await
            .get(username)
            .copied()
            .ok_or_else(|| LedgerError::UnknownAccount(username.to_owned()))
    }

    async fn adjust(&self, username: &str, delta: i64) -> Result<i64, LedgerError> {
        self.check_online()?;
        let mut accounts = self.accounts.lock().await;
        let balance = accounts
            .get_mut(username)
            .ok_or_else(|| LedgerError::UnknownAccount(username.to_owned()))?;

        let updated = match balance.checked_add(delta) {
            Some(updated) if updated >= 0 => updated,
            _ if delta > 0 => {
                return Err(LedgerError::Overflow {
                    username: username.to_owned(),
                });
            }
            _ => {
                return Err(LedgerError::InsufficientFunds {
                    username: username.to_owned(),
                    balance: *balance,
                    requested: delta.unsigned_abs(),
                });
            }
        };

        *balance = updated;
        tracing::debug!(%username, delta, balance = updated, "ledger adjusted");
        Ok(updated)
    }
}
