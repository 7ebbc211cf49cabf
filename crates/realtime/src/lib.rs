//! Realtime transport for the chat client.
//!
//! The backend speaks Socket.IO over the Engine.IO WebSocket transport.
//! [`protocol`] holds the wire codec and the typed chat events, [`client`]
//! holds the reconnecting client that tracks the current room and fans
//! events out to registered handlers.

pub mod client;
pub mod protocol;

pub use client::{
    ClientConfig, ConnectionState, HandlerId, RealtimeClient, RealtimeError, ReconnectPolicy,
    Result,
};
pub use protocol::{
    ClientEvent, EventKind, MessageData, MessageType, SendMessageData, ServerEvent,
    TypingNotificationData, UserJoinedData,
};
