mod engine;
mod events;
mod socket;

pub use engine::{EnginePacket, Handshake};
pub use events::{
    ClientEvent, ConnectedData, ErrorData, EventKind, MessageData, MessageType, RoomRef,
    SendMessageData, ServerEvent, TypingNotificationData, UserJoinedData, UserLeftData,
};
pub use socket::{DEFAULT_NAMESPACE, SocketPacket};

/// Engine.IO protocol revision requested in the handshake query.
pub const ENGINE_IO_VERSION: u8 = 4;
/// Path the Socket.IO server is mounted on.
pub const SOCKET_IO_PATH: &str = "/socket.io/";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty packet")]
    Empty,
    #[error("unknown engine.io packet type `{0}`")]
    UnknownEngineType(char),
    #[error("unknown socket.io packet type `{0}`")]
    UnknownSocketType(char),
    #[error("binary socket.io packets are not supported")]
    BinaryUnsupported,
    #[error("invalid handshake: {0}")]
    InvalidHandshake(#[source] serde_json::Error),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("event packet has no event name")]
    MissingEventName,
    #[error("invalid `{event}` payload: {source}")]
    InvalidEventData {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}
