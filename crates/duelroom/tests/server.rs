//! Integration tests for the Duelroom server over real WebSocket clients.

use std::sync::Arc;
use std::time::Duration;

use duelroom::prelude::*;
use duelroom_protocol::{ConnectionId, Mark, RoomId, Winner};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

struct TestServer {
    addr: String,
    ledger: Arc<MemoryLedger>,
}

/// Starts a server on a random port with two funded accounts:
/// `alice` (token `tok-alice`) and `bob` (token `tok-bob`).
async fn start_server(room_config: RoomConfig) -> TestServer {
    start_server_with(
        room_config,
        SessionConfig {
            count_debounce: Duration::from_millis(20),
            ..SessionConfig::default()
        },
    )
    .await
}

async fn start_server_with(room_config: RoomConfig, session_config: SessionConfig) -> TestServer {
    let auth = StaticAuthenticator::new()
        .with_account("tok-alice", "alice")
        .with_account("tok-bob", "bob");
    let ledger = Arc::new(
        MemoryLedger::new()
            .with_account("alice", 1000)
            .with_account("bob", 1000),
    );

    let server = DuelroomServerBuilder::new()
        .bind("127.0.0.1:0")
        .room_config(room_config)
        .session_config(session_config)
        .build(auth, Arc::clone(&ledger))
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer { addr, ledger }
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_event(ws: &mut ClientWs, event: &ClientEvent) {
    let text = serde_json::to_string(event).expect("encode");
    ws.send(Message::Text(text.into())).await.expect("send");
}

async fn recv_event(ws: &mut ClientWs) -> ServerEvent {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("recv");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("decode");
        }
    }
}

fn hello(token: Option<&str>, tab_id: Option<&str>) -> ClientEvent {
    ClientEvent::Hello {
        version: PROTOCOL_VERSION,
        token: token.map(str::to_owned),
        tab_id: tab_id.map(str::to_owned),
    }
}

/// An identified test client.
struct Client {
    ws: ClientWs,
    id: ConnectionId,
}

impl Client {
    async fn join(addr: &str, hello: ClientEvent) -> Self {
        let mut ws = connect(addr).await;
        send_event(&mut ws, &hello).await;
        match recv_event(&mut ws).await {
            ServerEvent::Welcome { connection_id, .. } => Self {
                ws,
                id: connection_id,
            },
            other => panic!("expected welcome, got {other:?}"),
        }
    }

    async fn guest(addr: &str, tab_id: &str) -> Self {
        Self::join(addr, hello(None, Some(tab_id))).await
    }

    async fn user(addr: &str, token: &str) -> Self {
        Self::join(addr, hello(Some(token), None)).await
    }

    async fn send(&mut self, event: ClientEvent) {
        send_event(&mut self.ws, &event).await;
    }

    async fn next(&mut self) -> ServerEvent {
        recv_event(&mut self.ws).await
    }

    /// Fails if any frame arrives within `window`.
    async fn assert_silent(&mut self, window: Duration) {
        if let Ok(Some(frame)) = tokio::time::timeout(window, self.ws.next()).await {
            panic!("expected no frame, got {frame:?}");
        }
    }

    /// Skips events until one named `name` arrives.
    async fn until(&mut self, name: &str) -> ServerEvent {
        loop {
            let event = self.next().await;
            if event.name() == name {
                return event;
            }
        }
    }
}

/// Queues `a` then `b` and returns the room they were paired into.
async fn pair(a: &mut Client, b: &mut Client) -> RoomId {
    a.send(ClientEvent::FindGame).await;
    a.until("searching").await;
    b.send(ClientEvent::FindGame).await;

    let ServerEvent::EnterBettingLobby { room_id, .. } = a.until("enterBettingLobby").await else {
        unreachable!()
    };
    let ServerEvent::EnterBettingLobby { room_id: b_room, .. } = b.until("enterBettingLobby").await
    else {
        unreachable!()
    };
    assert_eq!(room_id, b_room);
    room_id
}

/// Both players bet `amount`; returns the `gameStart` each one saw.
async fn bet_both(a: &mut Client, b: &mut Client, room_id: RoomId, amount: u64) -> ServerEvent {
    a.send(ClientEvent::PlaceBet {
        room_id,
        bet_amount: amount,
    })
    .await;
    b.until("opponentBetPlaced").await;
    b.send(ClientEvent::PlaceBet {
        room_id,
        bet_amount: amount,
    })
    .await;

    a.until("bothBetsPlaced").await;
    b.until("bothBetsPlaced").await;
    let start = a.until("gameStart").await;
    assert_eq!(b.until("gameStart").await, start);
    start
}

// =========================================================================
// Startup
// =========================================================================

#[tokio::test]
async fn test_server_built_from_environment_config_accepts_clients() {
    let config = ServerConfig::from_lookup(|key| match key {
        "PORT" => Some("0".to_owned()),
        "DUELROOM_BIND" => Some("127.0.0.1".to_owned()),
        "DUELROOM_ACCOUNTS" => Some("carol:tok-carol:250".to_owned()),
        _ => None,
    })
    .expect("config should parse");

    let mut auth = StaticAuthenticator::new();
    let mut ledger = MemoryLedger::new();
    for account in &config.accounts {
        auth = auth.with_account(&account.token, &account.username);
        ledger = ledger.with_account(&account.username, account.balance);
    }
    let server = DuelroomServerBuilder::new()
        .config(&config)
        .build(auth, Arc::new(ledger))
        .await
        .expect("server should build");
    let addr = server.local_addr().expect("should have local addr");
    assert_ne!(addr.port(), 0);
    tokio::spawn(async move {
        let _ = server.run().await;
    });

    let mut ws = connect(&addr.to_string()).await;
    send_event(&mut ws, &hello(Some("tok-carol"), None)).await;
    match recv_event(&mut ws).await {
        ServerEvent::Welcome { identity, balance, .. } => {
            assert_eq!(identity, Identity::user("carol"));
            assert_eq!(balance, Some(250));
        }
        other => panic!("expected welcome, got {other:?}"),
    }
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_hello_as_guest_gets_welcome_and_user_count() {
    let server = start_server(RoomConfig::default()).await;
    let mut ws = connect(&server.addr).await;

    send_event(&mut ws, &hello(None, Some("tab-a"))).await;

    match recv_event(&mut ws).await {
        ServerEvent::Welcome {
            identity, balance, ..
        } => {
            assert_eq!(identity, Identity::guest("tab-a"));
            assert_eq!(balance, None);
        }
        other => panic!("expected welcome, got {other:?}"),
    }
    assert_eq!(recv_event(&mut ws).await, ServerEvent::UpdateUserCount { count: 1 });
}

#[tokio::test]
async fn test_hello_with_token_reports_balance() {
    let server = start_server(RoomConfig::default()).await;
    let mut ws = connect(&server.addr).await;

    send_event(&mut ws, &hello(Some("tok-alice"), None)).await;

    match recv_event(&mut ws).await {
        ServerEvent::Welcome {
            identity, balance, ..
        } => {
            assert_eq!(identity, Identity::user("alice"));
            assert_eq!(balance, Some(1000));
        }
        other => panic!("expected welcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hello_version_mismatch_is_rejected() {
    let server = start_server(RoomConfig::default()).await;
    let mut ws = connect(&server.addr).await;

    send_event(
        &mut ws,
        &ClientEvent::Hello {
            version: 999,
            token: None,
            tab_id: None,
        },
    )
    .await;

    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hello_bad_token_is_rejected() {
    let server = start_server(RoomConfig::default()).await;
    let mut ws = connect(&server.addr).await;

    send_event(&mut ws, &hello(Some("forged"), None)).await;

    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 401),
        other => panic!("expected error 401, got {other:?}"),
    }
}

#[tokio::test]
async fn test_first_event_must_be_hello() {
    let server = start_server(RoomConfig::default()).await;
    let mut ws = connect(&server.addr).await;

    send_event(&mut ws, &ClientEvent::FindGame).await;

    match recv_event(&mut ws).await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected error, got {other:?}"),
    }
}

// =========================================================================
// Connection housekeeping
// =========================================================================

#[tokio::test]
async fn test_heartbeat_echoes_client_time() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;

    a.send(ClientEvent::Heartbeat { client_time: 12345 }).await;

    match a.until("heartbeatAck").await {
        ServerEvent::HeartbeatAck {
            client_time,
            server_time,
        } => {
            assert_eq!(client_time, 12345);
            assert!(server_time > 0);
        }
        other => panic!("expected heartbeatAck, got {other:?}"),
    }
}

#[tokio::test]
async fn test_invalid_event_reports_error_and_keeps_connection() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;

    a.ws.send(Message::Text("not json".into())).await.expect("send");
    match a.until("error").await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 400),
        other => panic!("expected error, got {other:?}"),
    }

    a.send(ClientEvent::Heartbeat { client_time: 1 }).await;
    a.until("heartbeatAck").await;
}

#[tokio::test]
async fn test_user_count_broadcast_when_second_user_connects() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;
    let _b = Client::guest(&server.addr, "tab-b").await;

    loop {
        if let ServerEvent::UpdateUserCount { count: 2 } = a.until("updateUserCount").await {
            break;
        }
    }
}

#[tokio::test]
async fn test_connect_burst_yields_one_count_broadcast() {
    let server = start_server_with(
        RoomConfig::default(),
        SessionConfig {
            count_debounce: Duration::from_millis(300),
            ..SessionConfig::default()
        },
    )
    .await;
    let mut a = Client::guest(&server.addr, "tab-a").await;
    assert_eq!(a.next().await, ServerEvent::UpdateUserCount { count: 1 });
    assert_eq!(a.next().await, ServerEvent::UpdateUserCount { count: 1 });

    let _b = Client::guest(&server.addr, "tab-b").await;
    let _c = Client::guest(&server.addr, "tab-c").await;
    let _d = Client::guest(&server.addr, "tab-d").await;

    assert_eq!(a.next().await, ServerEvent::UpdateUserCount { count: 4 });
    a.assert_silent(Duration::from_millis(500)).await;
}

#[tokio::test]
async fn test_second_tab_of_same_user_does_not_raise_count() {
    let server = start_server(RoomConfig::default()).await;
    let _first = Client::user(&server.addr, "tok-alice").await;

    let mut ws = connect(&server.addr).await;
    send_event(&mut ws, &hello(Some("tok-alice"), None)).await;
    assert!(matches!(recv_event(&mut ws).await, ServerEvent::Welcome { .. }));
    assert_eq!(recv_event(&mut ws).await, ServerEvent::UpdateUserCount { count: 1 });
}

// =========================================================================
// Matchmaking
// =========================================================================

#[tokio::test]
async fn test_find_game_pairs_two_guests_into_one_room() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;
    let mut b = Client::guest(&server.addr, "tab-b").await;

    pair(&mut a, &mut b).await;
}

#[tokio::test]
async fn test_cancel_search_reports_whether_queued() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;

    a.send(ClientEvent::FindGame).await;
    a.until("searching").await;

    a.send(ClientEvent::CancelSearch).await;
    assert_eq!(
        a.until("searchCancelled").await,
        ServerEvent::SearchCancelled { cancelled: true }
    );

    a.send(ClientEvent::CancelSearch).await;
    assert_eq!(
        a.until("searchCancelled").await,
        ServerEvent::SearchCancelled { cancelled: false }
    );
}

#[tokio::test]
async fn test_find_game_same_account_is_self_play_error() {
    let server = start_server(RoomConfig::default()).await;
    let mut first = Client::user(&server.addr, "tok-alice").await;
    let mut second = Client::user(&server.addr, "tok-alice").await;

    first.send(ClientEvent::FindGame).await;
    first.until("searching").await;
    second.send(ClientEvent::FindGame).await;

    assert!(matches!(
        second.until("selfPlayError").await,
        ServerEvent::SelfPlayError { .. }
    ));

    // The first tab is still waiting and pairs with someone else.
    let mut bob = Client::user(&server.addr, "tok-bob").await;
    bob.send(ClientEvent::FindGame).await;
    first.until("enterBettingLobby").await;
    bob.until("enterBettingLobby").await;
}

#[tokio::test]
async fn test_check_game_status_reports_seated_identity() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;
    let mut b = Client::guest(&server.addr, "tab-b").await;
    let mut c = Client::guest(&server.addr, "tab-c").await;
    pair(&mut a, &mut b).await;

    a.send(ClientEvent::CheckGameStatus { identity: None }).await;
    assert_eq!(
        a.until("gameStatusResponse").await,
        ServerEvent::GameStatusResponse { is_in_game: true }
    );

    c.send(ClientEvent::CheckGameStatus { identity: None }).await;
    assert_eq!(
        c.until("gameStatusResponse").await,
        ServerEvent::GameStatusResponse { is_in_game: false }
    );

    c.send(ClientEvent::CheckGameStatus {
        identity: Some(Identity::guest("tab-b")),
    })
    .await;
    assert_eq!(
        c.until("gameStatusResponse").await,
        ServerEvent::GameStatusResponse { is_in_game: true }
    );
}

// =========================================================================
// Rooms
// =========================================================================

#[tokio::test]
async fn test_matched_bets_start_game() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;
    let mut b = Client::guest(&server.addr, "tab-b").await;
    let room_id = pair(&mut a, &mut b).await;

    match bet_both(&mut a, &mut b, room_id, 100).await {
        ServerEvent::GameStart {
            room_id: started,
            players,
            bets,
            match_count,
            ..
        } => {
            assert_eq!(started, room_id);
            assert_eq!(match_count, 1);
            assert_eq!(bets.get(&a.id), Some(&100));
            assert_eq!(bets.get(&b.id), Some(&100));
            let mut marks: Vec<Mark> = players.values().copied().collect();
            marks.sort_by_key(|m| *m == Mark::O);
            assert_eq!(marks, vec![Mark::X, Mark::O]);
        }
        other => panic!("expected gameStart, got {other:?}"),
    }
}

#[tokio::test]
async fn test_mismatched_bets_send_bet_error_to_both() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;
    let mut b = Client::guest(&server.addr, "tab-b").await;
    let room_id = pair(&mut a, &mut b).await;

    a.send(ClientEvent::PlaceBet {
        room_id,
        bet_amount: 100,
    })
    .await;
    b.until("opponentBetPlaced").await;
    b.send(ClientEvent::PlaceBet {
        room_id,
        bet_amount: 200,
    })
    .await;

    assert!(matches!(a.until("betError").await, ServerEvent::BetError { .. }));
    assert!(matches!(b.until("betError").await, ServerEvent::BetError { .. }));
}

#[tokio::test]
async fn test_action_for_unknown_room_is_not_found() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;

    a.send(ClientEvent::MakeMove {
        room_id: RoomId(999),
        index: 4,
        mark: None,
    })
    .await;

    match a.until("error").await {
        ServerEvent::Error { code, .. } => assert_eq!(code, 404),
        other => panic!("expected error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_bet_menu_leave_notifies_opponent_and_frees_player() {
    let server = start_server(RoomConfig::default()).await;
    let mut a = Client::guest(&server.addr, "tab-a").await;
    let mut b = Client::guest(&server.addr, "tab-b").await;
    let room_id = pair(&mut a, &mut b).await;

    a.send(ClientEvent::BetMenuLeave { room_id }).await;

    match b.until("opponentLeftLobby").await {
        ServerEvent::OpponentLeftLobby(notice) => {
            assert!(notice.in_betting);
            assert!(!notice.in_game);
        }
        other => panic!("expected opponentLeftLobby, got {other:?}"),
    }

    a.send(ClientEvent::FindGame).await;
    a.until("searching").await;
}

#[tokio::test]
async fn test_paid_game_winner_collects_both_stakes() {
    let server = start_server(RoomConfig::default()).await;
    let mut alice = Client::user(&server.addr, "tok-alice").await;
    let mut bob = Client::user(&server.addr, "tok-bob").await;
    let room_id = pair(&mut alice, &mut bob).await;

    let ServerEvent::GameStart {
        players,
        current_turn,
        ..
    } = bet_both(&mut alice, &mut bob, room_id, 100).await
    else {
        unreachable!()
    };
    assert_eq!(server.ledger.balance("alice").await, Ok(900));
    assert_eq!(server.ledger.balance("bob").await, Ok(900));

    assert!(current_turn == alice.id || current_turn == bob.id);
    let alice_opens = current_turn == alice.id;
    let opener_mark = players[&current_turn];
    let (opener, other) = if alice_opens {
        (&mut alice, &mut bob)
    } else {
        (&mut bob, &mut alice)
    };

    // Opener takes the top row while the other plays the middle row.
    for (turn, index) in [0, 3, 1, 4].into_iter().enumerate() {
        let mover = if turn % 2 == 0 { &mut *opener } else { &mut *other };
        mover.send(ClientEvent::MakeMove {
            room_id,
            index,
            mark: None,
        })
        .await;
        let next = if turn % 2 == 0 { other.id } else { opener.id };
        match opener.until("gameUpdate").await {
            ServerEvent::GameUpdate { current_turn, .. } => assert_eq!(current_turn, next),
            event => panic!("expected gameUpdate, got {event:?}"),
        }
        other.until("gameUpdate").await;
    }
    opener
        .send(ClientEvent::MakeMove {
            room_id,
            index: 2,
            mark: None,
        })
        .await;

    match opener.until("gameOver").await {
        ServerEvent::GameOver {
            winner,
            winner_id,
            payout,
            new_round,
            ..
        } => {
            assert_eq!(winner, Winner::from(opener_mark));
            assert_eq!(winner_id, Some(opener.id));
            assert_eq!(payout, 200);
            assert!(!new_round);
        }
        other => panic!("expected gameOver, got {other:?}"),
    }
    other.until("gameOver").await;

    let (winner_name, loser_name) = if alice_opens {
        ("alice", "bob")
    } else {
        ("bob", "alice")
    };
    assert_eq!(server.ledger.balance(winner_name).await, Ok(1100));
    assert_eq!(server.ledger.balance(loser_name).await, Ok(900));
}

#[tokio::test]
async fn test_paid_game_disconnect_refunds_remaining_player() {
    let server = start_server(RoomConfig::default()).await;
    let mut alice = Client::user(&server.addr, "tok-alice").await;
    let mut bob = Client::user(&server.addr, "tok-bob").await;
    let room_id = pair(&mut alice, &mut bob).await;
    bet_both(&mut alice, &mut bob, room_id, 100).await;

    bob.ws.close(None).await.expect("close");

    // The refund lands before the notice goes out.
    assert_eq!(
        alice.until("wallet-update").await,
        ServerEvent::WalletUpdate { balance: 1000 }
    );
    match alice.until("opponentDisconnected").await {
        ServerEvent::OpponentDisconnected(notice) => {
            assert!(notice.in_game);
            assert_eq!(notice.refunded, Some(100));
        }
        other => panic!("expected opponentDisconnected, got {other:?}"),
    }
    assert_eq!(server.ledger.balance("alice").await, Ok(1000));
    assert_eq!(server.ledger.balance("bob").await, Ok(900));
}

#[tokio::test]
async fn test_silent_players_keep_their_seats_and_stakes() {
    let server = start_server(RoomConfig::default()).await;
    let mut alice = Client::user(&server.addr, "tok-alice").await;
    let mut bob = Client::user(&server.addr, "tok-bob").await;
    let room_id = pair(&mut alice, &mut bob).await;
    let ServerEvent::GameStart { current_turn, .. } = bet_both(&mut alice, &mut bob, room_id, 100).await else {
        unreachable!()
    };

    tokio::time::sleep(Duration::from_millis(400)).await;

    let (mover, waiting) = if current_turn == alice.id {
        (&mut alice, &mut bob)
    } else {
        (&mut bob, &mut alice)
    };
    mover
        .send(ClientEvent::MakeMove {
            room_id,
            index: 4,
            mark: None,
        })
        .await;
    loop {
        match waiting.next().await {
            ServerEvent::UpdateUserCount { .. } => continue,
            ServerEvent::GameUpdate { current_turn, .. } => {
                assert_eq!(current_turn, waiting.id);
                break;
            }
            other => panic!("expected gameUpdate, got {other:?}"),
        }
    }
    assert_eq!(server.ledger.balance("alice").await, Ok(900));
    assert_eq!(server.ledger.balance("bob").await, Ok(900));
}
