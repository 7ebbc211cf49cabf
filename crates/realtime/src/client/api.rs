use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::{
    sync::{mpsc, oneshot, watch},
    task::JoinHandle,
    time::{sleep, timeout},
};

use crate::protocol::{
    ClientEvent, EnginePacket, EventKind, MessageData, SendMessageData, ServerEvent,
    TypingNotificationData, UserJoinedData,
};

use super::{
    ClientConfig, EventHandlers, HandlerId, RealtimeError, Result,
    transport::{SessionEnd, Transport},
};

/// Message delivered to `error` handlers once reconnect attempts are spent.
pub const CONNECTION_LOST: &str = "connection lost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Reconnecting chat client. Cloning shares the same connection.
#[derive(Clone)]
pub struct RealtimeClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    cfg: ClientConfig,
    token: Mutex<Option<String>>,
    current_room: Mutex<Option<String>>,
    outbound: Mutex<Option<mpsc::Sender<String>>>,
    state: watch::Sender<ConnectionState>,
    handlers: EventHandlers,
    supervisor: tokio::sync::Mutex<Option<Supervisor>>,
}

struct Supervisor {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl Supervisor {
    async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.task.await;
    }
}

impl RealtimeClient {
    pub fn new(cfg: ClientConfig) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(ClientInner {
                cfg,
                token: Mutex::new(None),
                current_room: Mutex::new(None),
                outbound: Mutex::new(None),
                state,
                handlers: EventHandlers::new(),
                supervisor: tokio::sync::Mutex::new(None),
            }),
        }
    }

    pub fn with_token(cfg: ClientConfig, token: impl Into<String>) -> Self {
        let client = Self::new(cfg);
        client.set_token(Some(token.into()));
        client
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.cfg
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.inner.token).clone()
    }

    /// Replaces the token used by the next connection attempt.
    pub fn set_token(&self, token: Option<String>) {
        *lock(&self.inner.token) = token.filter(|t| !t.trim().is_empty());
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn current_room(&self) -> Option<String> {
        lock(&self.inner.current_room).clone()
    }

    /// Connects and resolves once the default namespace is joined. Returns
    /// immediately when already connected. A failed attempt keeps retrying
    /// in the background when auto-reconnect is enabled.
    pub async fn connect(&self) -> Result<()> {
        if self.token().is_none() {
            return Err(RealtimeError::MissingToken);
        }

        let mut guard = self.inner.supervisor.lock().await;
        if self.is_connected() {
            return Ok(());
        }
        if let Some(previous) = guard.take() {
            previous.stop().await;
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(Arc::clone(&self.inner), shutdown_rx, ready_tx));
        *guard = Some(Supervisor { shutdown_tx, task });
        drop(guard);

        ready_rx.await.unwrap_or(Err(RealtimeError::Shutdown))
    }

    /// Closes the connection, stops reconnecting and forgets the current room.
    pub async fn disconnect(&self) {
        self.stop_supervisor().await;
        *lock(&self.inner.current_room) = None;
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Stores a new token and, when connected, reconnects with it. The
    /// current room is re-joined on the new connection.
    pub async fn update_token(&self, token: impl Into<String>) -> Result<()> {
        self.set_token(Some(token.into()));
        if !self.is_connected() {
            return Ok(());
        }
        tracing::info!("token updated; reconnecting realtime client");
        self.stop_supervisor().await;
        self.connect().await
    }

    /// Joins `room_id`, leaving the current room first if it differs.
    pub async fn join_room(&self, room_id: &str) -> Result<()> {
        self.ensure_connected()?;

        let previous = self.current_room();
        if let Some(previous) = previous.filter(|current| current != room_id) {
            self.leave_room(&previous).await?;
        }

        self.emit(&ClientEvent::JoinRoom {
            room_id: room_id.to_string(),
        })
        .await?;
        *lock(&self.inner.current_room) = Some(room_id.to_string());
        Ok(())
    }

    pub async fn leave_room(&self, room_id: &str) -> Result<()> {
        self.ensure_connected()?;
        self.emit(&ClientEvent::LeaveRoom {
            room_id: room_id.to_string(),
        })
        .await?;

        let mut current = lock(&self.inner.current_room);
        if current.as_deref() == Some(room_id) {
            *current = None;
        }
        Ok(())
    }

    pub async fn send_message(&self, data: SendMessageData) -> Result<()> {
        self.ensure_connected()?;
        if self.current_room().is_none() {
            return Err(RealtimeError::NotInRoom);
        }
        self.emit(&ClientEvent::SendMessage(data)).await
    }

    /// Sends the typing flag; a no-op unless connected and in a room.
    pub async fn send_typing(&self, typing: bool) -> Result<()> {
        if !self.is_connected() || self.current_room().is_none() {
            return Ok(());
        }
        self.emit(&ClientEvent::Typing { typing }).await
    }

    pub fn on<F>(&self, kind: EventKind, handler: F) -> HandlerId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.inner.handlers.register(Some(kind), handler)
    }

    pub fn on_any<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        self.inner.handlers.register(None, handler)
    }

    pub fn on_connected<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::Connected, move |event| {
            if let ServerEvent::Connected(data) = event {
                handler(&data.user_id);
            }
        })
    }

    pub fn on_joined_room<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::JoinedRoom, move |event| {
            if let ServerEvent::JoinedRoom(data) = event {
                handler(&data.room_id);
            }
        })
    }

    pub fn on_new_message<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&MessageData) + Send + Sync + 'static,
    {
        self.on(EventKind::NewMessage, move |event| {
            if let ServerEvent::NewMessage(data) = event {
                handler(data);
            }
        })
    }

    pub fn on_user_joined<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&UserJoinedData) + Send + Sync + 'static,
    {
        self.on(EventKind::UserJoined, move |event| {
            if let ServerEvent::UserJoined(data) = event {
                handler(data);
            }
        })
    }

    pub fn on_user_left<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::UserLeft, move |event| {
            if let ServerEvent::UserLeft(data) = event {
                handler(&data.user_id);
            }
        })
    }

    pub fn on_user_typing<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&TypingNotificationData) + Send + Sync + 'static,
    {
        self.on(EventKind::UserTyping, move |event| {
            if let ServerEvent::UserTyping(data) = event {
                handler(data);
            }
        })
    }

    pub fn on_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.on(EventKind::Error, move |event| {
            if let ServerEvent::Error(data) = event {
                handler(&data.message);
            }
        })
    }

    pub fn off(&self, id: HandlerId) -> bool {
        self.inner.handlers.remove(id)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RealtimeError::NotConnected)
        }
    }

    async fn emit(&self, event: &ClientEvent) -> Result<()> {
        let sender = lock(&self.inner.outbound)
            .clone()
            .ok_or(RealtimeError::NotConnected)?;
        tracing::debug!(event = event.name(), "realtime emit");
        sender
            .send(encode_event(event))
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }

    async fn stop_supervisor(&self) {
        let supervisor = self.inner.supervisor.lock().await.take();
        if let Some(supervisor) = supervisor {
            supervisor.stop().await;
        }
    }
}

impl ClientInner {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(?previous, current = ?state, "realtime state changed");
        }
    }

    async fn open_transport(&self) -> Result<Transport> {
        let token = lock(&self.token)
            .clone()
            .ok_or(RealtimeError::MissingToken)?;
        let url = self.cfg.endpoint(&token)?;
        timeout(self.cfg.connect_timeout, Transport::open(&url))
            .await
            .map_err(|_| RealtimeError::Timeout)?
    }

    /// Installs the outbound queue for a fresh transport and queues a
    /// re-join of the room the client was in.
    fn go_live(&self, transport: &Transport) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel(self.cfg.outbound_buffer.max(1));
        if let Some(room_id) = lock(&self.current_room).clone() {
            tracing::info!(%room_id, "re-joining room after reconnect");
            let _ = tx.try_send(encode_event(&ClientEvent::JoinRoom { room_id }));
        }
        *lock(&self.outbound) = Some(tx);
        self.set_state(ConnectionState::Connected);
        tracing::info!(sid = transport.sid(), "realtime connected");
        rx
    }

    /// Drops the outbound queue so emits fail with `NotConnected`, and
    /// leaves `Connected` for `next`.
    fn go_offline(&self, next: ConnectionState) {
        *lock(&self.outbound) = None;
        self.set_state(next);
    }
}

async fn supervise(
    inner: Arc<ClientInner>,
    mut shutdown_rx: watch::Receiver<bool>,
    ready_tx: oneshot::Sender<Result<()>>,
) {
    let policy = inner.cfg.reconnect_policy();
    let mut ready = Some(ready_tx);
    let mut attempt: u32 = 0;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }
        inner.set_state(if attempt == 0 {
            ConnectionState::Connecting
        } else {
            ConnectionState::Reconnecting
        });

        let opened = tokio::select! {
            opened = inner.open_transport() => opened,
            _ = shutdown_rx.changed() => break,
        };

        let end = match opened {
            Ok(transport) => {
                attempt = 0;
                let outbound_rx = inner.go_live(&transport);
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(()));
                }
                let end = transport
                    .run(&inner.handlers, outbound_rx, &mut shutdown_rx)
                    .await;
                inner.go_offline(
                    if inner.cfg.auto_reconnect && end != SessionEnd::ClientClosed {
                        ConnectionState::Reconnecting
                    } else {
                        ConnectionState::Disconnected
                    },
                );
                end
            }
            Err(err) => {
                tracing::warn!(error = %err, attempt, "realtime connect failed");
                let end = SessionEnd::Failed(err.to_string());
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(err));
                }
                end
            }
        };

        if end == SessionEnd::ClientClosed || *shutdown_rx.borrow() {
            break;
        }
        tracing::info!(reason = %end, "realtime connection lost");
        if !inner.cfg.auto_reconnect {
            break;
        }

        attempt += 1;
        let Some(delay) = policy.delay_for(attempt) else {
            tracing::error!(
                attempts = policy.max_attempts,
                "realtime reconnect attempts exhausted"
            );
            inner.set_state(ConnectionState::Disconnected);
            inner.handlers.dispatch(&ServerEvent::error(CONNECTION_LOST));
            break;
        };
        tracing::info!(
            attempt,
            max = policy.max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "reconnecting"
        );
        inner.set_state(ConnectionState::Reconnecting);

        tokio::select! {
            () = sleep(delay) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    inner.go_offline(ConnectionState::Disconnected);
}

fn encode_event(event: &ClientEvent) -> String {
    EnginePacket::Message(event.to_packet().encode()).encode()
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
