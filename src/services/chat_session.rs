use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use realtime::{HandlerId, RealtimeClient, RealtimeError};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, interval},
};

use crate::{
    api::{ApiClient, HISTORY_PAGE_SIZE},
    chat::{ChatState, ChatUpdate, TypingTracker},
    error::AppError,
    forms::compose_message,
};

const TYPING_POLL: Duration = Duration::from_millis(100);

/// An open room: history from the REST API, live events from the realtime
/// client, both folded into one [`ChatState`]. Updates are forwarded to the
/// receiver returned by [`ChatSession::open`].
pub struct ChatSession {
    api: ApiClient,
    realtime: RealtimeClient,
    room_id: String,
    state: Arc<Mutex<ChatState>>,
    typing: Arc<Mutex<TypingTracker>>,
    updates: mpsc::UnboundedSender<ChatUpdate>,
    handler_id: HandlerId,
    typing_task: JoinHandle<()>,
}

impl ChatSession {
    pub async fn open(
        api: ApiClient,
        realtime: RealtimeClient,
        room_id: &str,
        current_user_id: Option<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<ChatUpdate>), AppError> {
        let room = api.rooms().get(room_id).await?;
        let mut state = ChatState::new(current_user_id);
        state.enter_room(room);
        let state = Arc::new(Mutex::new(state));
        let (updates, updates_rx) = mpsc::unbounded_channel();

        let handler_state = Arc::clone(&state);
        let handler_updates = updates.clone();
        let handler_id = realtime.on_any(move |event| {
            let update = lock(&handler_state).apply_event(event);
            if let Some(update) = update {
                let _ = handler_updates.send(update);
            }
        });

        let typing = Arc::new(Mutex::new(TypingTracker::default()));
        let typing_task = tokio::spawn(expire_typing(realtime.clone(), Arc::clone(&typing)));

        let session = Self {
            api,
            realtime,
            room_id: room_id.to_string(),
            state,
            typing,
            updates,
            handler_id,
            typing_task,
        };

        // Dropping the session on failure detaches the handler again.
        session.start().await?;
        tracing::info!(room_id = %session.room_id, "chat session opened");
        Ok((session, updates_rx))
    }

    async fn start(&self) -> Result<(), AppError> {
        self.load_page(0).await?;
        self.realtime.connect().await?;
        self.realtime.join_room(&self.room_id).await?;
        Ok(())
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn snapshot(&self) -> ChatState {
        lock(&self.state).clone()
    }

    /// Loads the next older page and returns how many messages were put in
    /// front. `None` when there is nothing more to load or a load is
    /// already running.
    pub async fn load_more(&self) -> Result<Option<usize>, AppError> {
        let next = lock(&self.state).next_page();
        match next {
            Some(page) => self.load_page(page).await,
            None => Ok(None),
        }
    }

    async fn load_page(&self, page: u32) -> Result<Option<usize>, AppError> {
        if !lock(&self.state).begin_loading() {
            return Ok(None);
        }

        match self
            .api
            .messages()
            .history(&self.room_id, page, HISTORY_PAGE_SIZE)
            .await
        {
            Ok(history) => {
                let update = lock(&self.state).apply_history(page, history);
                let count = match &update {
                    ChatUpdate::HistoryLoaded { count, .. } => *count,
                    _ => 0,
                };
                let _ = self.updates.send(update);
                Ok(Some(count))
            }
            Err(err) => {
                lock(&self.state).fail_loading(err.message());
                Err(err)
            }
        }
    }

    /// Sends composer input as a text message. Blank input is ignored and
    /// reported as `false`.
    pub async fn send(&self, input: &str) -> Result<bool, AppError> {
        let Some(message) = compose_message(input) else {
            return Ok(false);
        };
        self.realtime.send_message(message).await?;

        let stop = lock(&self.typing).on_submit();
        if let Some(typing) = stop {
            self.realtime.send_typing(typing).await?;
        }
        Ok(true)
    }

    /// Feeds the current composer text to the typing tracker.
    pub async fn input_changed(&self, text: &str) -> Result<(), AppError> {
        let start = lock(&self.typing).on_input(text, Instant::now());
        if let Some(typing) = start {
            self.realtime.send_typing(typing).await?;
        }
        Ok(())
    }

    /// Stops typing, leaves the room and detaches from the realtime client.
    /// The connection itself stays up for the next room.
    pub async fn close(self) -> Result<(), AppError> {
        let stop = lock(&self.typing).on_submit();
        if let Some(typing) = stop {
            self.realtime.send_typing(typing).await?;
        }

        let left = match self.realtime.leave_room(&self.room_id).await {
            Ok(()) | Err(RealtimeError::NotConnected) => Ok(()),
            Err(err) => Err(AppError::from(err)),
        };
        tracing::info!(room_id = %self.room_id, "chat session closed");
        left
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.typing_task.abort();
        self.realtime.off(self.handler_id);
    }
}

async fn expire_typing(realtime: RealtimeClient, typing: Arc<Mutex<TypingTracker>>) {
    let mut ticker = interval(TYPING_POLL);
    loop {
        ticker.tick().await;
        let stop = lock(&typing).poll(Instant::now());
        if let Some(flag) = stop
            && let Err(err) = realtime.send_typing(flag).await
        {
            tracing::debug!(error = %err, "typing stop not sent");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
