use std::fmt;

use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    time::{Instant, sleep},
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

use crate::protocol::{DEFAULT_NAMESPACE, EnginePacket, Handshake, ServerEvent, SocketPacket};

use super::{EventHandlers, RealtimeError, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;

/// Why a live session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    ClientClosed,
    ServerDisconnect,
    ServerClosed,
    TransportClosed,
    TransportError(String),
    HeartbeatTimeout,
    Failed(String),
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => f.write_str("client disconnect"),
            Self::ServerDisconnect => f.write_str("server disconnect"),
            Self::ServerClosed => f.write_str("server closed transport"),
            Self::TransportClosed => f.write_str("transport closed"),
            Self::TransportError(err) => write!(f, "transport error: {err}"),
            Self::HeartbeatTimeout => f.write_str("ping timeout"),
            Self::Failed(err) => write!(f, "connect failed: {err}"),
        }
    }
}

/// An Engine.IO connection whose default Socket.IO namespace is connected.
pub(crate) struct Transport {
    ws: WsStream,
    handshake: Handshake,
    backlog: Vec<ServerEvent>,
}

impl Transport {
    pub(crate) async fn open(url: &str) -> Result<Self> {
        let (mut ws, _) = connect_async(url)
            .await
            .map_err(|err| RealtimeError::Connection(err.to_string()))?;

        let handshake = loop {
            match next_engine_packet(&mut ws).await? {
                EnginePacket::Open(handshake) => break handshake,
                other => tracing::debug!(?other, "ignoring packet before engine.io open"),
            }
        };

        let connect = EnginePacket::Message(SocketPacket::connect().encode()).encode();
        ws.send(Message::Text(connect.into()))
            .await
            .map_err(|err| RealtimeError::Connection(err.to_string()))?;

        let mut backlog = Vec::new();
        loop {
            match next_engine_packet(&mut ws).await? {
                EnginePacket::Ping(data) => {
                    ws.send(Message::Text(EnginePacket::Pong(data).encode().into()))
                        .await
                        .map_err(|err| RealtimeError::Connection(err.to_string()))?;
                }
                EnginePacket::Close => return Err(server_closed()),
                EnginePacket::Message(payload) => match SocketPacket::decode(&payload)? {
                    SocketPacket::Connect { nsp, .. } if nsp == DEFAULT_NAMESPACE => break,
                    SocketPacket::ConnectError { message, .. } => {
                        return Err(RealtimeError::ConnectRejected(message));
                    }
                    SocketPacket::Disconnect { .. } => return Err(server_closed()),
                    SocketPacket::Event { name, args, .. } => {
                        match ServerEvent::from_event(&name, args) {
                            Ok(event) => backlog.push(event),
                            Err(err) => tracing::warn!(error = %err, "dropping malformed event"),
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        Ok(Self {
            ws,
            handshake,
            backlog,
        })
    }

    pub(crate) fn sid(&self) -> &str {
        &self.handshake.sid
    }

    /// Pumps frames until the connection ends. Outbound frames arrive already
    /// encoded as Engine.IO text.
    pub(crate) async fn run(
        self,
        handlers: &EventHandlers,
        mut outbound_rx: mpsc::Receiver<String>,
        shutdown_rx: &mut watch::Receiver<bool>,
    ) -> SessionEnd {
        let Self {
            ws,
            handshake,
            backlog,
        } = self;
        let (mut write, mut read) = ws.split();

        for event in &backlog {
            handlers.dispatch(event);
        }

        let deadline = handshake.heartbeat_deadline();
        let idle = sleep(deadline);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        close_gracefully(&mut write).await;
                        return SessionEnd::ClientClosed;
                    }
                }
                outbound = outbound_rx.recv() => {
                    let Some(frame) = outbound else {
                        close_gracefully(&mut write).await;
                        return SessionEnd::ClientClosed;
                    };
                    if let Err(err) = write.send(Message::Text(frame.into())).await {
                        return SessionEnd::TransportError(err.to_string());
                    }
                }
                incoming = read.next() => {
                    match incoming {
                        None => return SessionEnd::TransportClosed,
                        Some(Err(err)) => return SessionEnd::TransportError(err.to_string()),
                        Some(Ok(Message::Text(text))) => {
                            match handle_text(text.as_str(), &mut write, handlers).await {
                                Flow::Continue => {}
                                Flow::Pinged => idle.as_mut().reset(Instant::now() + deadline),
                                Flow::End(end) => return end,
                            }
                        }
                        Some(Ok(Message::Close(_))) => return SessionEnd::TransportClosed,
                        Some(Ok(_)) => {}
                    }
                }
                () = &mut idle => return SessionEnd::HeartbeatTimeout,
            }
        }
    }
}

async fn next_engine_packet(ws: &mut WsStream) -> Result<EnginePacket> {
    loop {
        match ws.next().await {
            None => {
                return Err(RealtimeError::Connection(
                    "connection closed during handshake".to_string(),
                ));
            }
            Some(Err(err)) => return Err(RealtimeError::Connection(err.to_string())),
            Some(Ok(Message::Text(text))) => return Ok(EnginePacket::decode(text.as_str())?),
            Some(Ok(Message::Close(_))) => return Err(server_closed()),
            Some(Ok(_)) => {}
        }
    }
}

/// What the read loop does after one inbound text frame.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    /// A server ping was answered. Only this pushes the heartbeat deadline.
    Pinged,
    End(SessionEnd),
}

async fn handle_text(text: &str, write: &mut WsWriter, handlers: &EventHandlers) -> Flow {
    let packet = match EnginePacket::decode(text) {
        Ok(packet) => packet,
        Err(err) => {
            tracing::warn!(error = %err, "invalid engine.io packet");
            return Flow::Continue;
        }
    };

    match packet {
        EnginePacket::Ping(data) => {
            let pong = EnginePacket::Pong(data).encode();
            if let Err(err) = write.send(Message::Text(pong.into())).await {
                return Flow::End(SessionEnd::TransportError(err.to_string()));
            }
            Flow::Pinged
        }
        EnginePacket::Close => Flow::End(SessionEnd::ServerClosed),
        EnginePacket::Message(payload) => {
            handle_socket_packet(&payload, handlers).map_or(Flow::Continue, Flow::End)
        }
        _ => Flow::Continue,
    }
}

fn handle_socket_packet(payload: &str, handlers: &EventHandlers) -> Option<SessionEnd> {
    let packet = match SocketPacket::decode(payload) {
        Ok(packet) => packet,
        Err(err) => {
            tracing::warn!(error = %err, "invalid socket.io packet");
            return None;
        }
    };
    if packet.namespace() != DEFAULT_NAMESPACE {
        return None;
    }

    match packet {
        SocketPacket::Event { name, args, .. } => {
            match ServerEvent::from_event(&name, args) {
                Ok(event) => {
                    tracing::debug!(event = %event.kind(), "realtime event");
                    handlers.dispatch(&event);
                }
                Err(err) => tracing::warn!(error = %err, "dropping malformed event"),
            }
            None
        }
        SocketPacket::Disconnect { .. } => Some(SessionEnd::ServerDisconnect),
        SocketPacket::ConnectError { message, .. } => {
            tracing::warn!(%message, "server rejected namespace");
            Some(SessionEnd::ServerDisconnect)
        }
        _ => None,
    }
}

async fn close_gracefully(write: &mut WsWriter) {
    let disconnect = EnginePacket::Message(SocketPacket::disconnect().encode()).encode();
    let _ = write.send(Message::Text(disconnect.into())).await;
    let _ = write.send(Message::Close(None)).await;
}

fn server_closed() -> RealtimeError {
    RealtimeError::ConnectRejected("server closed the connection".to_string())
}
