//! Debounced `updateUserCount` broadcaster.

use std::sync::Weak;
use std::time::Duration;

use duelroom_ledger::Ledger;
use duelroom_protocol::{Codec, ServerEvent};
use duelroom_session::{Authenticator, PresenceTracker};
use tokio::sync::mpsc;

use crate::server::ServerState;

/// Waits for presence notifications, lets a burst settle for `debounce`,
/// then broadcasts the live-user count if it changed since the last
/// broadcast. Exits once the server state is gone.
pub(crate) async fn broadcast_user_count<A, L, C>(
    state: Weak<ServerState<A, L, C>>,
    mut changes: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
) where
    A: Authenticator,
    L: Ledger,
    C: Codec,
{
    let mut tracker = PresenceTracker::new();

    while changes.recv().await.is_some() {
        tokio::time::sleep(debounce).await;
        while changes.try_recv().is_ok() {}

        let Some(state) = state.upgrade() else {
            break;
        };
        let sessions = state.sessions.lock().await;
        if let Some(count) = tracker.observe(sessions.live_user_count()) {
            tracing::debug!(count, connections = sessions.len(), "broadcasting live user count");
            sessions.broadcast(&ServerEvent::UpdateUserCount { count });
        }
    }
}
