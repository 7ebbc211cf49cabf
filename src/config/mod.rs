pub mod configs;
pub mod defaults;
pub mod envconfig;
pub mod validate;

pub use configs::{ApiConfig, AppConfig, LoggingConfig, RealtimeConfig, SessionConfig};
pub use envconfig::EnvConfig;
