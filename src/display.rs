//! Plain-text rendering for terminal output.

use chrono::{DateTime, Local, NaiveDateTime};

use crate::{
    chat::ChatUpdate,
    models::{AuthUser, ChatRoom, Message, MessageType, RoomMember, TypingNotificationData, User},
};

/// Formats a server timestamp for display. The backend sends local
/// date-times without an offset; RFC 3339 values are converted to local
/// time. Anything else is shown unchanged.
pub fn format_timestamp(raw: &str) -> String {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string();
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(at) => at.format("%Y-%m-%d %H:%M").to_string(),
        Err(_) => raw.to_string(),
    }
}

pub fn message_line(message: &Message) -> String {
    let body = match message.message_type {
        MessageType::Image => match message.image_url.as_deref() {
            Some(url) if message.content.is_empty() => format!("[image] {url}"),
            Some(url) => format!("{} [image] {url}", message.content),
            None => message.content.clone(),
        },
        _ => message.content.clone(),
    };
    format!(
        "[{}] {}: {}",
        format_timestamp(&message.created_at),
        message.user.name,
        body
    )
}

pub fn room_line(room: &ChatRoom) -> String {
    let mut line = format!("{}  {}", room.id, room.name);
    if room.is_private {
        line.push_str(" (private)");
    }
    if let Some(count) = room.member_count {
        line.push_str(&format!(" - {count} members"));
    }
    if let Some(description) = room.description.as_deref().filter(|d| !d.is_empty()) {
        line.push_str(&format!("\n    {description}"));
    }
    line
}

pub fn user_line(user: &User) -> String {
    if user.email.is_empty() {
        format!("{}  {}", user.id, user.name)
    } else {
        format!("{}  {} <{}>", user.id, user.name, user.email)
    }
}

pub fn auth_user_line(user: &AuthUser) -> String {
    if user.email.is_empty() {
        format!("{} ({})", user.name, user.id)
    } else {
        format!("{} <{}> ({})", user.name, user.email, user.id)
    }
}

pub fn member_line(member: &RoomMember) -> String {
    match member.joined_at.as_deref() {
        Some(joined) => format!(
            "{}  joined {}",
            user_line(&member.user),
            format_timestamp(joined)
        ),
        None => user_line(&member.user),
    }
}

pub fn typing_line(users: &[TypingNotificationData]) -> Option<String> {
    match users {
        [] => None,
        [one] => Some(format!("{} is typing...", one.user_name)),
        [first, second] => Some(format!(
            "{} and {} are typing...",
            first.user_name, second.user_name
        )),
        [first, rest @ ..] => Some(format!(
            "{} and {} others are typing...",
            first.user_name,
            rest.len()
        )),
    }
}

/// Line to print for a live update, if it is worth showing.
pub fn update_line(update: &ChatUpdate) -> Option<String> {
    match update {
        ChatUpdate::Connected { .. } => Some("* connected".to_string()),
        ChatUpdate::Joined { room_id } => Some(format!("* joined {room_id}")),
        ChatUpdate::HistoryLoaded { .. } => None,
        ChatUpdate::MessageAdded(message) => Some(message_line(message)),
        ChatUpdate::Typing(users) => typing_line(users),
        ChatUpdate::UserJoined(user) => Some(format!("* {} joined", user.user_name)),
        ChatUpdate::UserLeft { user_id } => Some(format!("* {user_id} left")),
        ChatUpdate::Error(message) => Some(format!("! {message}")),
    }
}
