pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REALTIME_URL: &str = "http://localhost:8081";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 1000;
pub const DEFAULT_AUTO_RECONNECT: bool = true;
pub const DEFAULT_RUST_LOG: &str = "info";
pub const DEFAULT_SESSION_DIR: &str = ".chat-client";
pub const DEFAULT_SESSION_FILE: &str = "session.json";
