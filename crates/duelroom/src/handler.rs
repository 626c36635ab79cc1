//! Per-connection handler: handshake, identity, and event routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `hello` → validate version
//!   2. Resolve identity: token → user, otherwise a guest tab
//!   3. Register the connection, send `welcome` and the live count
//!   4. Loop: receive events → dispatch to matchmaking or the player's room
//!
//! Outbound events go through the connection's outbox and a writer task,
//! so rooms and other connections can reach this player without touching
//! the socket.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use duelroom_ledger::Ledger;
use duelroom_protocol::{
    ClientEvent, Codec, ConnectionId, Identity, PROTOCOL_VERSION, ProtocolError, RoomId,
    ServerEvent,
};
use duelroom_room::{DepartureKind, Pairing, QueueEntry, RoomAction, RoomError, RoomSeat};
use duelroom_session::{
    Authenticator, ConnectionRecord, Outbox, SessionError, generate_tab_id,
};
use duelroom_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::DuelroomError;

/// Drop guard that releases a connection when the handler exits.
///
/// Since `Drop` is synchronous, the async cleanup runs in a spawned task.
struct ConnectionGuard<A: Authenticator, L: Ledger, C: Codec> {
    connection_id: ConnectionId,
    state: Arc<ServerState<A, L, C>>,
}

impl<A: Authenticator, L: Ledger, C: Codec> Drop for ConnectionGuard<A, L, C> {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.release_connection(connection_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<A, L, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<A, L, C>>,
) -> Result<(), DuelroomError>
where
    A: Authenticator,
    L: Ledger,
    C: Codec,
{
    let connection_id = conn.id();
    tracing::debug!(%connection_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: Handshake ---
    let (identity, tab_id) = match perform_handshake(&conn, &state).await {
        Ok(resolved) => resolved,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };

    tracing::info!(%connection_id, %identity, "connection identified");

    // --- Step 2: Outbox writer + registration ---
    let conn = Arc::new(conn);
    let (outbox, outbox_rx) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outbox(
        Arc::clone(&conn),
        outbox_rx,
        Arc::clone(&state),
    ));

    let balance = match identity.username() {
        Some(username) => match state.ledger.balance(username).await {
            Ok(balance) => Some(balance),
            Err(e) => {
                tracing::warn!(%connection_id, %username, error = %e, "balance lookup failed");
                None
            }
        },
        None => None,
    };

    // `welcome` and the current count are queued under the registry lock,
    // so no broadcast can overtake them. Registration and guard go
    // together: if registering fails there is nothing to release.
    {
        let mut sessions = state.sessions.lock().await;
        let record = ConnectionRecord::new(connection_id, identity.clone(), tab_id);
        if let Err(e) = sessions.register(record, outbox.clone()) {
            writer.abort();
            return Err(e.into());
        }
        reply(
            &outbox,
            ServerEvent::Welcome {
                connection_id,
                identity: identity.clone(),
                balance,
            },
        );
        reply(
            &outbox,
            ServerEvent::UpdateUserCount {
                count: sessions.live_user_count(),
            },
        );
    }
    let _guard = ConnectionGuard {
        connection_id,
        state: Arc::clone(&state),
    };
    state.notify_presence();

    // --- Step 3: Event loop ---
    let client = Client {
        connection_id,
        identity,
        outbox,
    };

    loop {
        // No idle cutoff: a silent player keeps their seat and stake until the
        // socket itself goes away.
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%connection_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "recv error");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%connection_id, error = %e, "failed to decode event");
                reply(&client.outbox, ServerEvent::error(400, format!("invalid event: {e}")));
                continue;
            }
        };

        if handle_event(&client, &state, event).await {
            break;
        }
    }

    writer.abort();
    let _ = conn.close().await;
    // _guard drops here → queue, room and registry cleanup fires.
    Ok(())
}

/// Receives `hello`, checks the version and resolves the identity.
///
/// Failures are reported to the client directly on the socket, since no
/// writer task exists yet.
async fn perform_handshake<A, L, C>(
    conn: &WebSocketConnection,
    state: &ServerState<A, L, C>,
) -> Result<(Identity, Option<String>), DuelroomError>
where
    A: Authenticator,
    L: Ledger,
    C: Codec,
{
    let data = match tokio::time::timeout(state.session_config.handshake_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before hello".into()).into());
        }
        Ok(Err(e)) => return Err(DuelroomError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("hello timed out".into()).into());
        }
    };

    let (version, token, tab_id) = match state.codec.decode(&data) {
        Ok(ClientEvent::Hello {
            version,
            token,
            tab_id,
        }) => (version, token, tab_id),
        _ => {
            send_error(conn, &state.codec, 400, "expected hello").await?;
            return Err(ProtocolError::InvalidMessage("first event must be hello".into()).into());
        }
    };

    if version != PROTOCOL_VERSION {
        send_error(
            conn,
            &state.codec,
            400,
            &format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}"),
        )
        .await?;
        return Err(SessionError::VersionMismatch {
            expected: PROTOCOL_VERSION,
            got: version,
        }
        .into());
    }

    match token {
        Some(token) => match state.auth.authenticate(&token).await {
            Ok(username) => Ok((Identity::user(username), tab_id)),
            Err(e) => {
                send_error(conn, &state.codec, 401, "unauthorized").await?;
                Err(e.into())
            }
        },
        None => {
            let tab_id = tab_id.unwrap_or_else(generate_tab_id);
            Ok((Identity::guest(tab_id.clone()), Some(tab_id)))
        }
    }
}

/// Drains the outbox onto the socket until either side is gone.
async fn write_outbox<A, L, C>(
    conn: Arc<WebSocketConnection>,
    mut outbox: mpsc::UnboundedReceiver<ServerEvent>,
    state: Arc<ServerState<A, L, C>>,
) where
    A: Authenticator,
    L: Ledger,
    C: Codec,
{
    let connection_id = conn.id();
    while let Some(event) = outbox.recv().await {
        let frame = match state.codec.encode(&event) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(%connection_id, event = event.name(), error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&frame).await {
            tracing::debug!(%connection_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}

/// The identified connection the event loop acts for.
struct Client {
    connection_id: ConnectionId,
    identity: Identity,
    outbox: Outbox,
}

/// Routes one event. Returns `true` if the connection should close.
async fn handle_event<A, L, C>(
    client: &Client,
    state: &ServerState<A, L, C>,
    event: ClientEvent,
) -> bool
where
    A: Authenticator,
    L: Ledger,
    C: Codec,
{
    let connection_id = client.connection_id;

    match event {
        ClientEvent::Hello { .. } => {
            reply(&client.outbox, ServerEvent::error(400, "already identified"));
        }

        ClientEvent::Heartbeat { client_time } => {
            let server_time = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or_default();
            reply(
                &client.outbox,
                ServerEvent::HeartbeatAck {
                    client_time,
                    server_time,
                },
            );
        }

        ClientEvent::FindGame => find_game(client, state).await,

        ClientEvent::CancelSearch => {
            let cancelled = state.queue.lock().await.cancel(connection_id);
            tracing::debug!(%connection_id, cancelled, "search cancelled");
            reply(&client.outbox, ServerEvent::SearchCancelled { cancelled });
        }

        ClientEvent::CheckGameStatus { identity } => {
            let identity = identity.unwrap_or_else(|| client.identity.clone());
            let connections = state.sessions.lock().await.connections_of(&identity);
            let is_in_game = {
                let rooms = state.rooms.lock().await;
                connections.iter().any(|&id| rooms.room_of(id).is_some())
            };
            reply(&client.outbox, ServerEvent::GameStatusResponse { is_in_game });
        }

        ClientEvent::PlaceBet {
            room_id,
            bet_amount,
        } => act(client, state, room_id, RoomAction::PlaceBet { amount: bet_amount }).await,
        ClientEvent::ClearBet { room_id } => act(client, state, room_id, RoomAction::ClearBet).await,
        // The assigned mark is authoritative; the claimed one is ignored.
        ClientEvent::MakeMove { room_id, index, .. } => {
            act(client, state, room_id, RoomAction::Move { index }).await
        }
        ClientEvent::StartNewRound { room_id } => {
            act(client, state, room_id, RoomAction::StartNewRound).await
        }

        ClientEvent::PlayerReadyToLeave { room_id } => {
            leave(client, state, room_id, DepartureKind::ReadyToLeave).await
        }
        ClientEvent::LeaveRoom { room_id } => leave(client, state, room_id, DepartureKind::Leave).await,
        ClientEvent::BetMenuLeave { room_id } => {
            leave(client, state, room_id, DepartureKind::BetMenuLeave).await
        }

        ClientEvent::Disconnect { reason } => {
            tracing::info!(
                %connection_id,
                reason = reason.as_deref().unwrap_or(""),
                "client disconnected"
            );
            return true;
        }
    }

    false
}

/// Queues the caller and forms rooms while at least two are waiting.
///
/// The queue lock is held until pairing is done, so a concurrent cancel
/// for a popped entry finds nothing.
async fn find_game<A, L, C>(client: &Client, state: &ServerState<A, L, C>)
where
    A: Authenticator,
    L: Ledger,
    C: Codec,
{
    let connection_id = client.connection_id;
    let mut queue = state.queue.lock().await;

    if let Some(room_id) = state.rooms.lock().await.room_of(connection_id) {
        reply(
            &client.outbox,
            RoomError::AlreadyInRoom(connection_id, room_id).to_event(),
        );
        return;
    }

    if queue.enqueue(QueueEntry::new(connection_id, client.identity.clone())) {
        tracing::debug!(%connection_id, queued = queue.len(), "joined matchmaking queue");
    }

    loop {
        match queue.dequeue_pair() {
            Pairing::Waiting => break,
            Pairing::SelfPlay { rejected } => {
                tracing::info!(
                    connection_id = %rejected.connection_id,
                    identity = %rejected.identity,
                    "rejected self-play pairing"
                );
                let _ = state
                    .sessions
                    .lock()
                    .await
                    .send(rejected.connection_id, RoomError::SelfPlay.to_event());
            }
            Pairing::Paired(first, second) => {
                let (first_outbox, second_outbox) = {
                    let sessions = state.sessions.lock().await;
                    (
                        sessions.outbox(first.connection_id),
                        sessions.outbox(second.connection_id),
                    )
                };
                let (Some(first_outbox), Some(second_outbox)) = (first_outbox, second_outbox) else {
                    tracing::warn!(
                        first = %first.connection_id,
                        second = %second.connection_id,
                        "paired connection already gone, requeueing the other"
                    );
                    for entry in [first, second] {
                        if state.sessions.lock().await.get(entry.connection_id).is_some() {
                            queue.enqueue(entry);
                        }
                    }
                    continue;
                };

                let created = state.rooms.lock().await.create_room(
                    RoomSeat {
                        connection_id: first.connection_id,
                        identity: first.identity,
                        outbox: first_outbox,
                    },
                    RoomSeat {
                        connection_id: second.connection_id,
                        identity: second.identity,
                        outbox: second_outbox,
                    },
                );
                if let Err(e) = created {
                    tracing::warn!(error = %e, "failed to create room");
                }
            }
        }
    }

    if queue.contains(connection_id) {
        reply(&client.outbox, ServerEvent::Searching);
    }
}

/// Forwards an in-room action; a routing failure goes back to the caller.
async fn act<A, L, C>(client: &Client, state: &ServerState<A, L, C>, room_id: RoomId, action: RoomAction)
where
    A: Authenticator,
    L: Ledger,
    C: Codec,
{
    let result = state
        .rooms
        .lock()
        .await
        .act(client.connection_id, room_id, action)
        .await;
    if let Err(e) = result {
        tracing::debug!(connection_id = %client.connection_id, %room_id, error = %e, "action rejected");
        reply(&client.outbox, e.to_event());
    }
}

async fn leave<A, L, C>(client: &Client, state: &ServerState<A, L, C>, room_id: RoomId, kind: DepartureKind)
where
    A: Authenticator,
    L: Ledger,
    C: Codec,
{
    let connection_id = client.connection_id;
    let result = state
        .rooms
        .lock()
        .await
        .leave(connection_id, room_id, kind)
        .await;
    match result {
        Ok(outcome) => tracing::info!(
            %connection_id,
            %room_id,
            ?kind,
            closed = outcome.closed,
            refunded = outcome.refunded,
            "left room"
        ),
        Err(e) => {
            tracing::debug!(%connection_id, %room_id, error = %e, "leave rejected");
            reply(&client.outbox, e.to_event());
        }
    }
}

/// Queues an event for this connection. A closed outbox means the writer
/// is gone and the read loop is about to end, so the event is dropped.
fn reply(outbox: &Outbox, event: ServerEvent) {
    let _ = outbox.send(event);
}

/// Sends an `error` event straight on the socket.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
) -> Result<(), DuelroomError> {
    let frame = codec.encode(&ServerEvent::error(code, message))?;
    conn.send(&frame).await?;
    Ok(())
}
