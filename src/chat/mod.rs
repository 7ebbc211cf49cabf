pub mod state;
pub mod typing;

pub use state::{ChatState, ChatUpdate};
pub use typing::{TYPING_IDLE, TypingTracker};
