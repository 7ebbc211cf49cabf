mod api;
mod backoff;
mod config;
mod error;
mod handlers;
mod transport;

pub use api::{ConnectionState, RealtimeClient};
pub use backoff::ReconnectPolicy;
pub use config::ClientConfig;
pub use error::{RealtimeError, Result};
pub use handlers::{EventHandlers, HandlerId};
