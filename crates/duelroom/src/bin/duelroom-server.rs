//! Runs a Duelroom server configured from the environment.
//!
//! ```text
//! PORT=3000 DUELROOM_ACCOUNTS=alice:s3cret:1000,bob:hunter2:1000 duelroom-server
//! ```

use std::sync::Arc;

use duelroom::prelude::*;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

#[tokio::main]
async fn main() -> Result<(), DuelroomError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;

    let mut auth = StaticAuthenticator::new();
    let mut ledger = MemoryLedger::new();
    for account in &config.accounts {
        auth = auth.with_account(&account.token, &account.username);
        ledger = ledger.with_account(&account.username, account.balance);
    }

    let server = DuelroomServerBuilder::new()
        .config(&config)
        .build(auth, Arc::new(ledger))
        .await?;

    tracing::info!(
        addr = %server.local_addr()?,
        accounts = config.accounts.len(),
        wagers = config.room.betting.is_some(),
        "duelroom server ready"
    );
    server.run().await
}
