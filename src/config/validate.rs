use anyhow::{Result, bail};

use super::AppConfig;

pub fn validate(cfg: &AppConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    if !has_scheme(&cfg.api.base_url, &["http://", "https://"]) {
        errors.push(format!(
            "api.base_url must start with http:// or https:// (got `{}`)",
            cfg.api.base_url
        ));
    }

    if cfg.api.timeout_secs == 0 {
        errors.push("api.timeout_secs must be > 0".to_string());
    }

    if !has_scheme(&cfg.realtime.url, &["http://", "https://", "ws://", "wss://"]) {
        errors.push(format!(
            "realtime.url must be an http(s) or ws(s) url (got `{}`)",
            cfg.realtime.url
        ));
    }

    if cfg.realtime.connect_timeout_secs == 0 {
        errors.push("realtime.connect_timeout_secs must be > 0".to_string());
    }

    if cfg.realtime.auto_reconnect && cfg.realtime.max_reconnect_attempts == 0 {
        errors.push(
            "realtime.max_reconnect_attempts must be > 0 when auto_reconnect is on".to_string(),
        );
    }

    if cfg.realtime.reconnect_delay_ms == 0 {
        errors.push("realtime.reconnect_delay_ms must be > 0".to_string());
    }

    if cfg.logging.rust_log.trim().is_empty() {
        errors.push("logging.rust_log must not be empty".to_string());
    }

    if cfg
        .session
        .path
        .as_ref()
        .is_some_and(|path| path.as_os_str().is_empty())
    {
        errors.push("session.path must not be empty when set".to_string());
    }

    if errors.is_empty() {
        return Ok(());
    }

    bail!("invalid app config:\n- {}", errors.join("\n- "))
}

fn has_scheme(url: &str, schemes: &[&str]) -> bool {
    let url = url.trim();
    schemes
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}
