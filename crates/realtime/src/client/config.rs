use std::time::Duration;

use crate::protocol::{ENGINE_IO_VERSION, SOCKET_IO_PATH};

use super::{RealtimeError, ReconnectPolicy};

pub const DEFAULT_URL: &str = "http://localhost:8081";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Socket.IO server base URL; `http(s)` and `ws(s)` schemes are accepted.
    pub url: String,
    pub connect_timeout: Duration,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
    /// Base of the linear reconnect backoff.
    pub reconnect_delay: Duration,
    pub outbound_buffer: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            auto_reconnect: true,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
            outbound_buffer: 256,
        }
    }
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn no_reconnect(mut self) -> Self {
        self.auto_reconnect = false;
        self
    }

    pub fn reconnect(mut self, delay: Duration, max_attempts: u32) -> Self {
        self.reconnect_delay = delay;
        self.max_reconnect_attempts = max_attempts;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(self.reconnect_delay, self.max_reconnect_attempts)
    }

    /// WebSocket endpoint for the Engine.IO transport, carrying the token in
    /// the query string the way the backend reads it.
    pub fn endpoint(&self, token: &str) -> Result<String, RealtimeError> {
        let base = self.url.trim().trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            return Err(RealtimeError::Connection(format!(
                "unsupported realtime url `{}`",
                self.url
            )));
        };

        let path = if base.ends_with(SOCKET_IO_PATH.trim_end_matches('/')) {
            "/"
        } else {
            SOCKET_IO_PATH
        };

        Ok(format!(
            "{base}{path}?EIO={ENGINE_IO_VERSION}&transport=websocket&token={}",
            urlencoding::encode(token)
        ))
    }
}
