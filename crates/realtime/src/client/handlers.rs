use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
};

use crate::protocol::{EventKind, ServerEvent};

pub type HandlerId = u64;
type Handler = Arc<dyn Fn(&ServerEvent) + Send + Sync>;

struct HandlerEntry {
    id: HandlerId,
    kind: Option<EventKind>,
    handler: Handler,
}

/// Registry of event handlers, keyed by event kind. A `None` kind receives
/// every event.
#[derive(Default)]
pub struct EventHandlers {
    next_id: AtomicU64,
    entries: Mutex<Vec<HandlerEntry>>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, kind: Option<EventKind>, handler: F) -> HandlerId
    where
        F: Fn(&ServerEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock().push(HandlerEntry {
            id,
            kind,
            handler: Arc::new(handler),
        });
        id
    }

    pub fn remove(&self, id: HandlerId) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls every matching handler in registration order and returns how
    /// many ran to completion. A panicking handler is logged and skipped.
    pub fn dispatch(&self, event: &ServerEvent) -> usize {
        let kind = event.kind();
        let callbacks: Vec<Handler> = self
            .lock()
            .iter()
            .filter(|entry| entry.kind.is_none_or(|k| k == kind))
            .map(|entry| Arc::clone(&entry.handler))
            .collect();

        let mut completed = 0;
        for callback in callbacks {
            match catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(()) => completed += 1,
                Err(_) => tracing::error!(event = %kind, "realtime event handler panicked"),
            }
        }
        completed
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HandlerEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
