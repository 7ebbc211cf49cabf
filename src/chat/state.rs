use std::collections::HashSet;

use realtime::ServerEvent;

use crate::models::{
    ChatRoom, Message, MessageData, Page, TypingNotificationData, UserJoinedData,
};

/// What changed after a history load or a realtime event.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatUpdate {
    Connected { user_id: String },
    Joined { room_id: String },
    HistoryLoaded { page: u32, count: usize, has_more: bool },
    MessageAdded(Message),
    Typing(Vec<TypingNotificationData>),
    UserJoined(UserJoinedData),
    UserLeft { user_id: String },
    Error(String),
}

/// Client-side view of the open room.
#[derive(Debug, Clone, Default)]
pub struct ChatState {
    current_user_id: Option<String>,
    room: Option<ChatRoom>,
    messages: Vec<Message>,
    typing_users: Vec<TypingNotificationData>,
    loading: bool,
    has_more: bool,
    page: u32,
    error: Option<String>,
}

impl ChatState {
    pub fn new(current_user_id: Option<String>) -> Self {
        Self {
            current_user_id,
            has_more: true,
            ..Self::default()
        }
    }

    pub fn room(&self) -> Option<&ChatRoom> {
        self.room.as_ref()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.room.as_ref().map(|room| room.id.as_str())
    }

    /// Messages oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn typing_users(&self) -> &[TypingNotificationData] {
        &self.typing_users
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn last_error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Switches to `room` and drops everything from the previous one.
    pub fn enter_room(&mut self, room: ChatRoom) {
        *self = Self {
            current_user_id: self.current_user_id.take(),
            room: Some(room),
            has_more: true,
            ..Self::default()
        };
    }

    /// Marks a history load as started. Returns false when one is already
    /// running.
    pub fn begin_loading(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        true
    }

    pub fn fail_loading(&mut self, error: impl Into<String>) {
        self.loading = false;
        self.error = Some(error.into());
    }

    /// Page to request for "load more", if any.
    pub fn next_page(&self) -> Option<u32> {
        if self.has_more && !self.loading && !self.messages.is_empty() {
            Some(self.page + 1)
        } else {
            None
        }
    }

    /// Applies a history page (newest first). Page 0 replaces the list,
    /// later pages are older and go in front. Pages are offset based, so
    /// live messages shift them and ids already shown are skipped. The
    /// reported count is the number of messages put in front.
    pub fn apply_history(&mut self, page_number: u32, page: Page<Message>) -> ChatUpdate {
        let has_more = page.has_more();
        let mut older = page.content;
        older.reverse();

        if page_number == 0 {
            self.messages.clear();
        }
        let known: HashSet<&str> = self.messages.iter().map(|m| m.id.as_str()).collect();
        let mut seen = HashSet::new();
        older.retain(|message| {
            !known.contains(message.id.as_str()) && seen.insert(message.id.clone())
        });
        let count = older.len();
        older.append(&mut self.messages);
        self.messages = older;

        self.loading = false;
        self.has_more = has_more;
        self.page = page_number;
        ChatUpdate::HistoryLoaded {
            page: page_number,
            count,
            has_more,
        }
    }

    pub fn push_message(&mut self, data: &MessageData) -> Option<ChatUpdate> {
        if self.room_id().is_some_and(|room_id| room_id != data.room_id) {
            tracing::debug!(room_id = %data.room_id, "ignoring message for another room");
            return None;
        }
        if self.messages.iter().any(|message| message.id == data.id) {
            return None;
        }
        let message = Message::from_realtime(data, self.room.as_ref());
        self.messages.push(message.clone());
        Some(ChatUpdate::MessageAdded(message))
    }

    pub fn set_typing(&mut self, data: &TypingNotificationData) -> Option<ChatUpdate> {
        if self.current_user_id.as_deref() == Some(data.user_id.as_str()) {
            return None;
        }
        self.typing_users.retain(|user| user.user_id != data.user_id);
        if data.typing {
            self.typing_users.push(data.clone());
        }
        Some(ChatUpdate::Typing(self.typing_users.clone()))
    }

    pub fn remove_user(&mut self, user_id: &str) -> ChatUpdate {
        self.typing_users.retain(|user| user.user_id != user_id);
        ChatUpdate::UserLeft {
            user_id: user_id.to_string(),
        }
    }

    /// Folds a realtime event into the state.
    pub fn apply_event(&mut self, event: &ServerEvent) -> Option<ChatUpdate> {
        match event {
            ServerEvent::Connected(data) => {
                if self.current_user_id.is_none() {
                    self.current_user_id = Some(data.user_id.clone());
                }
                Some(ChatUpdate::Connected {
                    user_id: data.user_id.clone(),
                })
            }
            ServerEvent::JoinedRoom(data) => Some(ChatUpdate::Joined {
                room_id: data.room_id.clone(),
            }),
            ServerEvent::NewMessage(data) => self.push_message(data),
            ServerEvent::UserTyping(data) => self.set_typing(data),
            ServerEvent::UserJoined(data) => Some(ChatUpdate::UserJoined(data.clone())),
            ServerEvent::UserLeft(data) => Some(self.remove_user(&data.user_id)),
            ServerEvent::Error(data) => {
                self.error = Some(data.message.clone());
                Some(ChatUpdate::Error(data.message.clone()))
            }
            ServerEvent::Other { name, .. } => {
                tracing::debug!(event = %name, "unhandled realtime event");
                None
            }
        }
    }
}
