//! Server configuration, read from the environment by the binary.

use duelroom_room::{BetLimits, RoomConfig};
use duelroom_session::SessionConfig;

use crate::DuelroomError;

/// A signed-in account to seed the authenticator and the ledger with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSeed {
    pub username: String,
    pub token: String,
    pub balance: i64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub accounts: Vec<AccountSeed>,
    pub room: RoomConfig,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            accounts: Vec::new(),
            room: RoomConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `PORT`, `DUELROOM_BIND`, `DUELROOM_BET_MIN`, `DUELROOM_BET_MAX`,
    /// `DUELROOM_NO_WAGER` and `DUELROOM_ACCOUNTS`. A `.env` file in the
    /// working directory is loaded first; real environment variables win.
    pub fn from_env() -> Result<Self, DuelroomError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DuelroomError> {
        let defaults = Self::default();
        let limits = BetLimits::default();

        let port = parse_or(&lookup, "PORT", defaults.port)?;
        let host = lookup("DUELROOM_BIND").unwrap_or(defaults.host);
        let min = parse_or(&lookup, "DUELROOM_BET_MIN", limits.min)?;
        let max = parse_or(&lookup, "DUELROOM_BET_MAX", limits.max)?;
        if min > max {
            return Err(DuelroomError::Config(format!(
                "DUELROOM_BET_MIN ({min}) exceeds DUELROOM_BET_MAX ({max})"
            )));
        }
        let no_wager = lookup("DUELROOM_NO_WAGER").is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes"));
        let accounts = match lookup("DUELROOM_ACCOUNTS") {
            Some(raw) => parse_accounts(&raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            host,
            port,
            accounts,
            room: RoomConfig {
                betting: (!no_wager).then_some(BetLimits { min, max }),
                ..RoomConfig::default()
            },
            session: SessionConfig::default(),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    fallback: T,
) -> Result<T, DuelroomError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| DuelroomError::Config(format!("{key} is not a valid number: {raw:?}"))),
        None => Ok(fallback),
    }
}

/// Parses `user:token:balance` entries separated by commas.
fn parse_accounts(raw: &str) -> Result<Vec<AccountSeed>, DuelroomError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let mut parts = entry.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(username), Some(token), Some(balance)) if !username.is_empty() && !token.is_empty() => {
                    let balance = balance.parse().map_err(|_| {
                        DuelroomError::Config(format!("bad balance for account {username}: {balance:?}"))
                    })?;
                    Ok(AccountSeed {
                        username: username.to_owned(),
                        token: token.to_owned(),
                        balance,
                    })
                }
                _ => Err(DuelroomError::Config(format!(
                    "account entry must be user:token:balance, got {entry:?}"
                ))),
            }
        })
        .collect()
}
