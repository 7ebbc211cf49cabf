use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use realtime::ClientConfig;
use serde::{Deserialize, Serialize};

use super::{defaults, envconfig::EnvConfig, validate};

// Top level stays open: CHAT_PASSWORD and friends share the prefix.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub realtime: RealtimeConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        <Self as EnvConfig>::from_env()
    }
}

impl EnvConfig for AppConfig {
    fn validate(&self) -> Result<()> {
        validate::validate(self)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: defaults::DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct RealtimeConfig {
    pub url: String,
    pub connect_timeout_secs: u64,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub auto_reconnect: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: defaults::DEFAULT_REALTIME_URL.to_string(),
            connect_timeout_secs: defaults::DEFAULT_CONNECT_TIMEOUT_SECS,
            max_reconnect_attempts: defaults::DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: defaults::DEFAULT_RECONNECT_DELAY_MS,
            auto_reconnect: defaults::DEFAULT_AUTO_RECONNECT,
        }
    }
}

impl RealtimeConfig {
    pub fn client_config(&self) -> ClientConfig {
        let mut cfg = ClientConfig::new(self.url.clone())
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .reconnect(
                Duration::from_millis(self.reconnect_delay_ms),
                self.max_reconnect_attempts,
            );
        cfg.auto_reconnect = self.auto_reconnect;
        cfg
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub rust_log: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log: defaults::DEFAULT_RUST_LOG.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub path: Option<PathBuf>,
}

impl SessionConfig {
    /// Configured session file, or `~/.chat-client/session.json`.
    pub fn resolved_path(&self) -> Result<PathBuf> {
        session_path(self.path.as_deref(), dirs::home_dir())
    }
}

fn session_path(configured: Option<&Path>, home: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }
    let home = home.context(
        "cannot locate the home directory for the session file; set CHAT_SESSION__PATH",
    )?;
    Ok(home
        .join(defaults::DEFAULT_SESSION_DIR)
        .join(defaults::DEFAULT_SESSION_FILE))
}
