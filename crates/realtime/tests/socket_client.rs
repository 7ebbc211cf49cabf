use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use realtime::{
    ClientConfig, ConnectionState, RealtimeClient, RealtimeError, SendMessageData,
    protocol::SocketPacket,
};
use tokio::{
    net::TcpListener,
    sync::{Mutex, broadcast, mpsc},
    time::timeout,
};

const VALID_TOKEN: &str = "token-alice";
const HANDSHAKE: &str =
    r#"0{"sid":"mock-sid","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;
/// Heartbeat deadline of 200 ms.
const SHORT_HEARTBEAT: &str =
    r#"0{"sid":"mock-sid","upgrades":[],"pingInterval":100,"pingTimeout":100,"maxPayload":1000000}"#;
const WAIT: Duration = Duration::from_secs(5);

#[derive(Clone)]
struct MockState {
    frames_tx: mpsc::UnboundedSender<String>,
    push: broadcast::Sender<String>,
    sessions: Arc<AtomicUsize>,
    drop_after_join: Arc<AtomicUsize>,
    tokens: Arc<std::sync::Mutex<Vec<String>>>,
    handshake: &'static str,
}

struct MockServer {
    addr: SocketAddr,
    frames: Mutex<mpsc::UnboundedReceiver<String>>,
    push: broadcast::Sender<String>,
    sessions: Arc<AtomicUsize>,
    drop_after_join: Arc<AtomicUsize>,
    tokens: Arc<std::sync::Mutex<Vec<String>>>,
}

impl MockServer {
    async fn start() -> Self {
        Self::start_with(HANDSHAKE).await
    }

    async fn start_with(handshake: &'static str) -> Self {
        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (push, _) = broadcast::channel(16);
        let sessions = Arc::new(AtomicUsize::new(0));
        let drop_after_join = Arc::new(AtomicUsize::new(0));
        let tokens = Arc::new(std::sync::Mutex::new(Vec::new()));
        let state = MockState {
            frames_tx,
            push: push.clone(),
            sessions: Arc::clone(&sessions),
            drop_after_join: Arc::clone(&drop_after_join),
            tokens: Arc::clone(&tokens),
            handshake,
        };

        let app = Router::new()
            .route("/socket.io/", get(socket_handler))
            .with_state(state);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            frames: Mutex::new(frames_rx),
            push,
            sessions,
            drop_after_join,
            tokens,
        }
    }

    fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    fn config(&self) -> ClientConfig {
        ClientConfig::new(format!("http://{}", self.addr))
            .reconnect(Duration::from_millis(20), 5)
            .connect_timeout(Duration::from_secs(2))
    }

    async fn next_frame_matching(&self, predicate: impl Fn(&str) -> bool) -> String {
        let mut frames = self.frames.lock().await;
        timeout(WAIT, async {
            loop {
                let frame = frames.recv().await.expect("mock server stopped");
                if predicate(&frame) {
                    return frame;
                }
            }
        })
        .await
        .expect("timed out waiting for client frame")
    }

    fn push(&self, frame: &str) {
        let _ = self.push.send(frame.to_string());
    }
}

async fn socket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<MockState>,
) -> Response {
    let token = query.get("token").cloned().unwrap_or_default();
    ws.on_upgrade(move |socket| run_mock_session(socket, token, state))
}

async fn run_mock_session(mut socket: WebSocket, token: String, state: MockState) {
    state.sessions.fetch_add(1, Ordering::SeqCst);
    state.tokens.lock().unwrap().push(token.clone());
    if send(&mut socket, state.handshake).await.is_err() {
        return;
    }

    let Some(Ok(Message::Text(first))) = socket.recv().await else {
        return;
    };
    if first.as_str() != "40" {
        return;
    }
    if !token.starts_with("token-") {
        let _ = send(&mut socket, r#"44{"message":"Unauthorized"}"#).await;
        return;
    }
    let _ = send(&mut socket, r#"40{"sid":"ns-sid"}"#).await;
    let _ = send(&mut socket, r#"42["connected",{"userId":"u-alice"}]"#).await;

    let mut push_rx = state.push.subscribe();
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let Some(Ok(Message::Text(text))) = incoming else {
                    return;
                };
                let text = text.as_str().to_string();
                let _ = state.frames_tx.send(text.clone());

                if let Some(room_id) = joined_room(&text) {
                    let reply = format!(r#"42["joined_room",{{"roomId":"{room_id}"}}]"#);
                    let _ = send(&mut socket, &reply).await;
                    let pending = state.drop_after_join.load(Ordering::SeqCst);
                    if pending > 0 {
                        state.drop_after_join.store(pending - 1, Ordering::SeqCst);
                        return;
                    }
                }
            }
            pushed = push_rx.recv() => {
                if let Ok(frame) = pushed
                    && send(&mut socket, &frame).await.is_err()
                {
                    return;
                }
            }
        }
    }
}

fn joined_room(frame: &str) -> Option<String> {
    let payload = frame.strip_prefix('4')?;
    match SocketPacket::decode(payload).ok()? {
        SocketPacket::Event { name, args, .. } if name == "join_room" => args
            .first()?
            .get("roomId")?
            .as_str()
            .map(str::to_string),
        _ => None,
    }
}

async fn send(socket: &mut WebSocket, text: &str) -> Result<(), axum::Error> {
    socket.send(Message::Text(text.to_string().into())).await
}

async fn wait_for_state(client: &RealtimeClient, wanted: ConnectionState) {
    let mut rx = client.watch_state();
    timeout(WAIT, rx.wait_for(|state| *state == wanted))
        .await
        .expect("timed out waiting for state")
        .expect("state channel closed");
}

#[tokio::test]
async fn connects_and_receives_connected_event() {
    let server = MockServer::start().await;
    let client = RealtimeClient::with_token(server.config(), VALID_TOKEN);

    let (tx, mut rx) = mpsc::unbounded_channel();
    client.on_connected(move |user_id| {
        let _ = tx.send(user_id.to_string());
    });

    client.connect().await.unwrap();
    assert!(client.is_connected());

    let user_id = timeout(WAIT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(user_id, "u-alice");

    // Already connected: no second session.
    client.connect().await.unwrap();
    assert_eq!(server.sessions.load(Ordering::SeqCst), 1);

    client.disconnect().await;
}

#[tokio::test]
async fn join_switches_rooms_and_sends_messages() {
    let server = MockServer::start().await;
    let client = RealtimeClient::with_token(server.config(), VALID_TOKEN);

    let (tx, mut joined) = mpsc::unbounded_channel();
    client.on_joined_room(move |room_id| {
        let _ = tx.send(room_id.to_string());
    });

    client.connect().await.unwrap();
    client.join_room("room-1").await.unwrap();
    server
        .next_frame_matching(|f| f == r#"42["join_room",{"roomId":"room-1"}]"#)
        .await;
    assert_eq!(timeout(WAIT, joined.recv()).await.unwrap().unwrap(), "room-1");

    client.join_room("room-2").await.unwrap();
    server
        .next_frame_matching(|f| f == r#"42["leave_room",{"roomId":"room-1"}]"#)
        .await;
    server
        .next_frame_matching(|f| f == r#"42["join_room",{"roomId":"room-2"}]"#)
        .await;
    assert_eq!(client.current_room().as_deref(), Some("room-2"));

    client
        .send_message(SendMessageData::text("hello"))
        .await
        .unwrap();
    let frame = server
        .next_frame_matching(|f| f.starts_with(r#"42["send_message""#))
        .await;
    assert!(frame.contains(r#""content":"hello""#));
    assert!(frame.contains(r#""type":"TEXT""#));

    client.send_typing(true).await.unwrap();
    server
        .next_frame_matching(|f| f == r#"42["typing",{"typing":true}]"#)
        .await;

    client.leave_room("room-2").await.unwrap();
    assert_eq!(client.current_room(), None);
    assert!(matches!(
        client.send_message(SendMessageData::text("late")).await,
        Err(RealtimeError::NotInRoom)
    ));

    client.disconnect().await;
}

#[tokio::test]
async fn server_events_fan_out_to_handlers() {
    let server = MockServer::start().await;
    let client = RealtimeClient::with_token(server.config(), VALID_TOKEN);

    let (tx, mut messages) = mpsc::unbounded_channel();
    client.on_new_message(move |message| {
        let _ = tx.send(message.content.clone());
    });
    let (typing_tx, mut typing) = mpsc::unbounded_channel();
    client.on_user_typing(move |data| {
        let _ = typing_tx.send((data.user_id.clone(), data.typing));
    });

    client.connect().await.unwrap();
    client.join_room("room-1").await.unwrap();
    server
        .next_frame_matching(|f| f.contains("join_room"))
        .await;

    server.push(
        r#"42["new_message",{"id":"m1","roomId":"room-1","userId":"u-bob","userName":"Bob","userPicture":"","content":"hey","type":"TEXT","imageUrl":"","timestamp":"2024-05-01T09:00:00"}]"#,
    );
    server.push(r#"42["user_typing",{"userId":"u-bob","userName":"Bob","typing":true}]"#);

    assert_eq!(timeout(WAIT, messages.recv()).await.unwrap().unwrap(), "hey");
    assert_eq!(
        timeout(WAIT, typing.recv()).await.unwrap().unwrap(),
        ("u-bob".to_string(), true)
    );

    client.disconnect().await;
}

#[tokio::test]
async fn answers_server_pings() {
    let server = MockServer::start().await;
    let client = RealtimeClient::with_token(server.config(), VALID_TOKEN);
    client.connect().await.unwrap();

    server.push("2");
    server.next_frame_matching(|f| f == "3").await;

    client.disconnect().await;
}

#[tokio::test]
async fn rejected_token_fails_connect() {
    let server = MockServer::start().await;
    let client = RealtimeClient::with_token(server.config().no_reconnect(), "wrong");

    let err = client.connect().await.unwrap_err();
    assert!(matches!(err, RealtimeError::ConnectRejected(ref message) if message == "Unauthorized"));
    wait_for_state(&client, ConnectionState::Disconnected).await;
}

#[tokio::test]
async fn reconnects_and_rejoins_current_room() {
    let server = MockServer::start().await;
    server.drop_after_join.store(1, Ordering::SeqCst);
    let client = RealtimeClient::with_token(server.config(), VALID_TOKEN);

    client.connect().await.unwrap();
    client.join_room("room-7").await.unwrap();
    server
        .next_frame_matching(|f| f == r#"42["join_room",{"roomId":"room-7"}]"#)
        .await;

    // The mock drops the first session after the join; the client comes back
    // and joins the same room on the new connection.
    server
        .next_frame_matching(|f| f == r#"42["join_room",{"roomId":"room-7"}]"#)
        .await;
    assert_eq!(server.sessions.load(Ordering::SeqCst), 2);
    wait_for_state(&client, ConnectionState::Connected).await;
    assert_eq!(client.current_room().as_deref(), Some("room-7"));

    client.disconnect().await;
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    // Accepts TCP and hangs up at once, so every attempt fails.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepts);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let cfg = ClientConfig::new(format!("http://{addr}"))
        .reconnect(Duration::from_millis(10), 2)
        .connect_timeout(Duration::from_millis(500));
    let client = RealtimeClient::with_token(cfg, VALID_TOKEN);

    let (tx, mut errors) = mpsc::unbounded_channel();
    let observer = client.clone();
    client.on_error(move |message| {
        let _ = tx.send((message.to_string(), observer.state()));
    });

    assert!(client.connect().await.is_err());
    let (message, state) = timeout(WAIT, errors.recv()).await.unwrap().unwrap();
    assert_eq!(message, "connection lost");
    assert_eq!(state, ConnectionState::Disconnected);
    wait_for_state(&client, ConnectionState::Disconnected).await;

    // The first connect plus two reconnects.
    assert_eq!(accepts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn silent_server_trips_the_heartbeat() {
    let server = MockServer::start_with(SHORT_HEARTBEAT).await;
    let client = RealtimeClient::with_token(server.config(), VALID_TOKEN);
    client.connect().await.unwrap();

    // Events keep flowing but no ping ever arrives.
    let push = server.push.clone();
    let chatter = tokio::spawn(async move {
        loop {
            let _ = push.send(
                r#"42["user_typing",{"userId":"u-bob","userName":"Bob","typing":true}]"#
                    .to_string(),
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    });

    timeout(WAIT, async {
        while server.sessions.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("client never reconnected after missing pings");

    chatter.abort();
    client.disconnect().await;
}

#[tokio::test]
async fn pings_keep_the_session_alive() {
    let server = MockServer::start_with(SHORT_HEARTBEAT).await;
    let client = RealtimeClient::with_token(server.config(), VALID_TOKEN);
    client.connect().await.unwrap();

    for _ in 0..6 {
        server.push("2");
        server.next_frame_matching(|f| f == "3").await;
        tokio::time::sleep(Duration::from_millis(80)).await;
    }
    assert_eq!(server.sessions.load(Ordering::SeqCst), 1);
    assert!(client.is_connected());

    client.disconnect().await;
}

#[tokio::test]
async fn token_update_reconnects_and_rejoins() {
    let server = MockServer::start().await;
    let client = RealtimeClient::with_token(server.config(), VALID_TOKEN);

    client.connect().await.unwrap();
    client.join_room("room-3").await.unwrap();
    server
        .next_frame_matching(|f| f == r#"42["join_room",{"roomId":"room-3"}]"#)
        .await;

    client.update_token("token-bob").await.unwrap();
    server
        .next_frame_matching(|f| f == r#"42["join_room",{"roomId":"room-3"}]"#)
        .await;

    assert_eq!(server.tokens(), vec![VALID_TOKEN, "token-bob"]);
    assert_eq!(server.sessions.load(Ordering::SeqCst), 2);
    assert_eq!(client.current_room().as_deref(), Some("room-3"));
    assert!(client.is_connected());

    client.disconnect().await;
}

#[tokio::test]
async fn disconnect_clears_room_and_stops() {
    let server = MockServer::start().await;
    let client = RealtimeClient::with_token(server.config(), VALID_TOKEN);

    client.connect().await.unwrap();
    client.join_room("room-1").await.unwrap();
    client.disconnect().await;

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.current_room(), None);
    server.next_frame_matching(|f| f == "41").await;
    assert!(matches!(
        client.join_room("room-1").await,
        Err(RealtimeError::NotConnected)
    ));
}
