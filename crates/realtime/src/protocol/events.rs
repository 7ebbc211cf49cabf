use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use super::{ProtocolError, SocketPacket};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    Emoji,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Image => "IMAGE",
            Self::Emoji => "EMOJI",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the `send_message` client event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageData {
    pub content: String,
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl SendMessageData {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_type: MessageType::Text,
            image_url: None,
        }
    }

    pub fn image(content: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            message_type: MessageType::Image,
            image_url: Some(image_url.into()),
        }
    }
}

/// A message as broadcast to everyone in the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_picture: String,
    pub content: String,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub image_url: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserJoinedData {
    pub user_id: String,
    pub user_name: String,
    #[serde(default)]
    pub user_picture: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeftData {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotificationData {
    pub user_id: String,
    pub user_name: String,
    pub typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedData {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub room_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorData {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    JoinedRoom,
    NewMessage,
    UserJoined,
    UserLeft,
    UserTyping,
    Error,
    Other,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::JoinedRoom => "joined_room",
            Self::NewMessage => "new_message",
            Self::UserJoined => "user_joined",
            Self::UserLeft => "user_left",
            Self::UserTyping => "user_typing",
            Self::Error => "error",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Connected(ConnectedData),
    JoinedRoom(RoomRef),
    NewMessage(MessageData),
    UserJoined(UserJoinedData),
    UserLeft(UserLeftData),
    UserTyping(TypingNotificationData),
    Error(ErrorData),
    Other { name: String, data: Value },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(ErrorData {
            message: message.into(),
        })
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected(_) => EventKind::Connected,
            Self::JoinedRoom(_) => EventKind::JoinedRoom,
            Self::NewMessage(_) => EventKind::NewMessage,
            Self::UserJoined(_) => EventKind::UserJoined,
            Self::UserLeft(_) => EventKind::UserLeft,
            Self::UserTyping(_) => EventKind::UserTyping,
            Self::Error(_) => EventKind::Error,
            Self::Other { .. } => EventKind::Other,
        }
    }

    pub fn from_event(name: &str, args: Vec<Value>) -> Result<Self, ProtocolError> {
        let data = args.into_iter().next().unwrap_or(Value::Null);
        let event = match name {
            "connected" => Self::Connected(parse(name, data)?),
            "joined_room" => Self::JoinedRoom(parse(name, data)?),
            "new_message" => Self::NewMessage(parse(name, data)?),
            "user_joined" => Self::UserJoined(parse(name, data)?),
            "user_left" => Self::UserLeft(parse(name, data)?),
            "user_typing" => Self::UserTyping(parse(name, data)?),
            "error" => Self::Error(parse(name, data)?),
            _ => Self::Other {
                name: name.to_string(),
                data,
            },
        };
        Ok(event)
    }
}

/// Events emitted by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    JoinRoom { room_id: String },
    LeaveRoom { room_id: String },
    SendMessage(SendMessageData),
    Typing { typing: bool },
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join_room",
            Self::LeaveRoom { .. } => "leave_room",
            Self::SendMessage(_) => "send_message",
            Self::Typing { .. } => "typing",
        }
    }

    pub fn payload(&self) -> Value {
        match self {
            Self::JoinRoom { room_id } | Self::LeaveRoom { room_id } => {
                json!({ "roomId": room_id })
            }
            Self::SendMessage(data) => json!({
                "content": data.content,
                "type": data.message_type,
                "imageUrl": data.image_url,
            }),
            Self::Typing { typing } => json!({ "typing": typing }),
        }
    }

    pub fn to_packet(&self) -> SocketPacket {
        SocketPacket::event(self.name(), self.payload())
    }
}

fn parse<T: for<'de> Deserialize<'de>>(event: &str, data: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::InvalidEventData {
        event: event.to_string(),
        source,
    })
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_new_message_with_blank_optional_fields() {
        let data = json!({
            "id": "m1",
            "roomId": "r1",
            "userId": "u1",
            "userName": "Alice",
            "userPicture": "",
            "content": "hello",
            "type": "TEXT",
            "imageUrl": "",
            "timestamp": "2024-01-01T10:00:00"
        });
        let event = ServerEvent::from_event("new_message", vec![data]).unwrap();
        let ServerEvent::NewMessage(message) = event else {
            panic!("expected new_message");
        };
        assert_eq!(message.user_name, "Alice");
        assert_eq!(message.message_type, MessageType::Text);
        assert_eq!(message.image_url, None);
    }

    #[test]
    fn unknown_events_are_kept_verbatim() {
        let event = ServerEvent::from_event("room_renamed", vec![json!({"name": "x"})]).unwrap();
        assert_eq!(event.kind(), EventKind::Other);
        assert_eq!(
            event,
            ServerEvent::Other {
                name: "room_renamed".to_string(),
                data: json!({"name": "x"}),
            }
        );
    }

    #[test]
    fn malformed_known_event_is_an_error() {
        let err = ServerEvent::from_event("user_typing", vec![json!({"userId": 1})]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidEventData { ref event, .. } if event == "user_typing"));
    }

    #[test]
    fn client_events_use_backend_field_names() {
        let join = ClientEvent::JoinRoom {
            room_id: "r1".to_string(),
        };
        assert_eq!(join.to_packet().encode(), r#"2["join_room",{"roomId":"r1"}]"#);

        let send = ClientEvent::SendMessage(SendMessageData::text("hi"));
        assert_eq!(
            send.payload(),
            json!({"content": "hi", "type": "TEXT", "imageUrl": null})
        );

        let typing = ClientEvent::Typing { typing: true };
        assert_eq!(typing.to_packet().encode(), r#"2["typing",{"typing":true}]"#);
    }
}
