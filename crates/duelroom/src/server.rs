//! `DuelroomServer` builder and server loop.
//!
//! This is the entry point for running a Duelroom server. It ties
//! together all the layers: transport → protocol → session → room.

use std::net::SocketAddr;
use std::sync::Arc;

use duelroom_ledger::Ledger;
use duelroom_protocol::{Codec, ConnectionId, JsonCodec};
use duelroom_room::{MatchQueue, RoomConfig, RoomManager};
use duelroom_session::{Authenticator, ConnectionRegistry, SessionConfig};
use duelroom_transport::{Transport, WebSocketTransport};
use tokio::sync::{Mutex, mpsc};

use crate::config::ServerConfig;
use crate::handler::handle_connection;
use crate::presence::broadcast_user_count;
use crate::DuelroomError;

/// Shared server state passed to each connection handler task.
///
/// Lock order is `queue` → `rooms` → `sessions`. `sessions` is never held
/// while another of the three is acquired.
pub(crate) struct ServerState<A: Authenticator, L: Ledger, C: Codec> {
    pub(crate) sessions: Mutex<ConnectionRegistry>,
    pub(crate) queue: Mutex<MatchQueue>,
    pub(crate) rooms: Mutex<RoomManager<L>>,
    pub(crate) auth: A,
    pub(crate) ledger: Arc<L>,
    pub(crate) codec: C,
    pub(crate) session_config: SessionConfig,
    presence: mpsc::UnboundedSender<()>,
}

impl<A: Authenticator, L: Ledger, C: Codec> ServerState<A, L, C> {
    /// Marks the live-user count as possibly changed. The broadcaster
    /// coalesces these.
    pub(crate) fn notify_presence(&self) {
        let _ = self.presence.send(());
    }

    /// Everything that has to happen when a connection goes away: leave
    /// the queue, leave (and maybe settle) its room, drop the registry
    /// entry, recount.
    pub(crate) async fn release_connection(&self, connection_id: ConnectionId) {
        let was_queued = self.queue.lock().await.cancel(connection_id);
        let left_room = self.rooms.lock().await.disconnect(connection_id).await;
        let record = self.sessions.lock().await.remove(connection_id);

        match record {
            Some(record) => tracing::info!(
                %connection_id,
                identity = %record.identity,
                was_queued,
                refunded = left_room.map_or(0, |o| o.refunded),
                "connection released"
            ),
            None => tracing::debug!(%connection_id, "release for unknown connection"),
        }
        self.notify_presence();
    }
}

/// Builder for configuring and starting a Duelroom server.
///
/// # Example
///
/// ```rust,ignore
/// use duelroom::prelude::*;
///
/// let server = DuelroomServerBuilder::new()
///     .bind("0.0.0.0:3000")
///     .build(StaticAuthenticator::new(), Arc::new(MemoryLedger::new()))
///     .await?;
/// server.run().await
/// ```
pub struct DuelroomServerBuilder {
    bind_addr: String,
    session_config: SessionConfig,
    room_config: RoomConfig,
}

impl DuelroomServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            session_config: SessionConfig::default(),
            room_config: RoomConfig::default(),
        }
    }

    /// Takes the bind address, room and session settings from a
    /// [`ServerConfig`].
    pub fn config(self, config: &ServerConfig) -> Self {
        self.bind(&config.addr())
            .room_config(config.room.clone())
            .session_config(config.session.clone())
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the session configuration.
    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Sets the configuration every room is created with.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener and starts the live-user-count broadcaster.
    ///
    /// Uses `JsonCodec` and `WebSocketTransport`.
    pub async fn build<A: Authenticator, L: Ledger>(
        self,
        auth: A,
        ledger: Arc<L>,
    ) -> Result<DuelroomServer<A, L, JsonCodec>, DuelroomError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;

        let (presence_tx, presence_rx) = mpsc::unbounded_channel();
        let debounce = self.session_config.count_debounce;

        let state = Arc::new(ServerState {
            sessions: Mutex::new(ConnectionRegistry::new()),
            queue: Mutex::new(MatchQueue::new()),
            rooms: Mutex::new(RoomManager::new(self.room_config, Arc::clone(&ledger))),
            auth,
            ledger,
            codec: JsonCodec,
            session_config: self.session_config,
            presence: presence_tx,
        });

        tokio::spawn(broadcast_user_count(
            Arc::downgrade(&state),
            presence_rx,
            debounce,
        ));

        Ok(DuelroomServer { transport, state })
    }
}

impl Default for DuelroomServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Duelroom server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DuelroomServer<A: Authenticator, L: Ledger, C: Codec> {
    transport: WebSocketTransport,
    state: Arc<ServerState<A, L, C>>,
}

impl<A, L, C> DuelroomServer<A, L, C>
where
    A: Authenticator,
    L: Ledger,
    C: Codec,
{
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, DuelroomError> {
        Ok(self.transport.local_addr()?)
    }

    /// Runs the server accept loop.
    ///
    /// Spawns a handler task for each accepted connection. Runs until the
    /// process is terminated.
    pub async fn run(mut self) -> Result<(), DuelroomError> {
        tracing::info!("Duelroom server running");

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, state).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
