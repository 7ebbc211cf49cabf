use std::time::Duration;

use tokio::time::Instant;

/// Idle time after the last keystroke before "stopped typing" is sent.
pub const TYPING_IDLE: Duration = Duration::from_secs(1);

/// Turns composer input into typing start/stop transitions. Methods return
/// `Some(flag)` only when the flag should be sent to the room.
#[derive(Debug, Clone)]
pub struct TypingTracker {
    idle: Duration,
    typing: bool,
    last_input: Option<Instant>,
}

impl Default for TypingTracker {
    fn default() -> Self {
        Self::new(TYPING_IDLE)
    }
}

impl TypingTracker {
    pub fn new(idle: Duration) -> Self {
        Self {
            idle,
            typing: false,
            last_input: None,
        }
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    /// Every edit restarts the idle timer; the first non-blank edit starts
    /// typing.
    pub fn on_input(&mut self, text: &str, now: Instant) -> Option<bool> {
        self.last_input = Some(now);
        if !self.typing && !text.trim().is_empty() {
            self.typing = true;
            return Some(true);
        }
        None
    }

    pub fn poll(&mut self, now: Instant) -> Option<bool> {
        let deadline = self.deadline()?;
        if now >= deadline {
            self.typing = false;
            self.last_input = None;
            return Some(false);
        }
        None
    }

    /// When the pending stop is due, if typing.
    pub fn deadline(&self) -> Option<Instant> {
        if !self.typing {
            return None;
        }
        self.last_input.map(|at| at + self.idle)
    }

    /// Sending a message ends typing right away.
    pub fn on_submit(&mut self) -> Option<bool> {
        self.last_input = None;
        if self.typing {
            self.typing = false;
            return Some(false);
        }
        None
    }
}
