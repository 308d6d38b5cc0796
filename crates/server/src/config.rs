use std::{fs, time::Duration};

use anyhow::Context;
use server_api::DEFAULT_UPSTREAM_BASE_URL;
use url::Url;

const CONFIG_FILE: &str = "relay.toml";
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_bind: String,
    pub upstream_base_url: String,
    pub max_body_bytes: usize,
    pub upstream_timeout_seconds: Option<u64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8787".into(),
            upstream_base_url: DEFAULT_UPSTREAM_BASE_URL.into(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            upstream_timeout_seconds: None,
        }
    }
}

impl Settings {
    pub fn upstream_timeout(&self) -> Option<Duration> {
        self.upstream_timeout_seconds.map(Duration::from_secs)
    }
}

pub fn load_settings() -> Settings {
    let file = fs::read_to_string(CONFIG_FILE).ok();
    resolve_settings(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `relay.toml`, then environment. Later sources win.
pub(crate) fn resolve_settings(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(file_cfg) = file.and_then(|raw| raw.parse::<toml::Table>().ok()) {
        if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
            settings.server_bind = v.to_string();
        }
        if let Some(v) = file_cfg.get("upstream_base_url").and_then(toml::Value::as_str) {
            settings.upstream_base_url = v.to_string();
        }
        if let Some(v) = file_cfg
            .get("max_body_bytes")
            .and_then(toml::Value::as_integer)
            .and_then(|v| usize::try_from(v).ok())
        {
            settings.max_body_bytes = v;
        }
        if let Some(v) = file_cfg
            .get("upstream_timeout_seconds")
            .and_then(toml::Value::as_integer)
            .and_then(|v| u64::try_from(v).ok())
        {
            settings.upstream_timeout_seconds = Some(v);
        }
    }

    if let Some(v) = env("RELAY_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("UPSTREAM_BASE_URL") {
        settings.upstream_base_url = v;
    }
    if let Some(v) = env("APP__UPSTREAM_BASE_URL") {
        settings.upstream_base_url = v;
    }

    if let Some(v) = env("APP__MAX_BODY_BYTES") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.max_body_bytes = parsed;
        }
    }

    if let Some(v) = env("APP__UPSTREAM_TIMEOUT_SECONDS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.upstream_timeout_seconds = Some(parsed);
        }
    }

    settings
}

pub fn prepare_upstream_base_url(raw: &str) -> anyhow::Result<String> {
    let normalized = normalize_upstream_base_url(raw);
    Url::parse(&normalized)
        .with_context(|| format!("invalid upstream base url '{normalized}'"))?;
    Ok(normalized)
}

fn normalize_upstream_base_url(raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        return Settings::default().upstream_base_url;
    }
    raw.trim_end_matches('/').to_string()
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
