//! Authentication hook for resolving a handshake token to a username.
//!
//! Duelroom doesn't own user accounts. It defines the [`Authenticator`]
//! trait, a single async method from token to username, and calls it
//! during the handshake. Connections without a token never reach the
//! authenticator; they become guests.

use std::collections::HashMap;

use crate::SessionError;

/// Validates a client's token and returns the account's username.
///
/// `Send + Sync + 'static` because one authenticator is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use duelroom_session::{Authenticator, SessionError};
///
/// /// Treats any `user-<name>` token as valid. Development only.
/// struct PrefixAuthenticator;
///
/// impl Authenticator for PrefixAuthenticator {
///     async fn authenticate(&self, token: &str) -> Result<String, SessionError> {
///         token
///             .strip_prefix("user-")
///             .map(str::to_owned)
///             .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates `token`.
    ///
    /// # Returns
    /// - `Ok(username)`: the ledger account this connection acts for
    /// - `Err(SessionError::AuthFailed)`: token is invalid or expired
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<String, SessionError>> + Send;
}

/// An [`Authenticator`] backed by a fixed token → username table.
///
/// Used by the standalone binary (seeded from `DUELROOM_ACCOUNTS`) and by
/// tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, String>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `token` as a credential for `username`. Several tokens may
    /// map to the same user.
    pub fn with_account(mut self, token: impl Into<String>, username: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), username.into());
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<String, SessionError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| SessionError::AuthFailed("unknown token".into()))
    }
}
