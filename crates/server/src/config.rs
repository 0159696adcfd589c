use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::Deserialize;

pub const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub database_url: String,
    pub server_public_url: Option<String>,
    pub log_filter: String,
    pub max_body_bytes: usize,
    pub event_channel_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            database_url: "sqlite://./data/listing.db".into(),
            server_public_url: None,
            log_filter: "info".into(),
            max_body_bytes: 2 * 1024 * 1024,
            event_channel_capacity: 256,
        }
    }
}

/// Keys accepted in `server.toml`. Everything is optional.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    database_url: Option<String>,
    server_public_url: Option<String>,
    log_filter: Option<String>,
    max_body_bytes: Option<usize>,
    event_channel_capacity: Option<usize>,
}

/// Settings are loaded before logging is up, so a skipped file is reported
/// back to the caller instead of logged here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedSettings {
    pub settings: Settings,
    /// Why the settings file was ignored, when it exists but does not parse.
    pub ignored_file: Option<String>,
}

pub fn load_settings() -> LoadedSettings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then `file` when it exists and parses, then the environment.
pub fn load_settings_from(
    file: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> LoadedSettings {
    let mut settings = Settings::default();
    let mut ignored_file = None;

    if let Ok(raw) = fs::read_to_string(file) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => apply_file(&mut settings, file_cfg),
            Err(error) => ignored_file = Some(format!("{}: {error}", file.display())),
        }
    }

    for key in ["SERVER_BIND", "APP__BIND_ADDR"] {
        if let Some(v) = env(key) {
            settings.server_bind = v;
        }
    }
    for key in ["DATABASE_URL", "APP__DATABASE_URL"] {
        if let Some(v) = env(key) {
            settings.database_url = v;
        }
    }
    for key in ["SERVER_PUBLIC_URL", "APP__SERVER_PUBLIC_URL"] {
        if let Some(v) = env(key) {
            settings.server_public_url = Some(v);
        }
    }
    if let Some(v) = env("APP__LOG_FILTER") {
        settings.log_filter = v;
    }
    if let Some(parsed) = env("APP__MAX_BODY_BYTES").and_then(|v| v.parse().ok()) {
        settings.max_body_bytes = parsed;
    }
    if let Some(parsed) = env("APP__EVENT_CHANNEL_CAPACITY").and_then(|v| v.parse().ok()) {
        settings.event_channel_capacity = parsed;
    }

    LoadedSettings {
        settings,
        ignored_file,
    }
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.bind_addr {
        settings.server_bind = v;
    }
    if let Some(v) = file_cfg.database_url {
        settings.database_url = v;
    }
    if let Some(v) = file_cfg.server_public_url {
        settings.server_public_url = Some(v);
    }
    if let Some(v) = file_cfg.log_filter {
        settings.log_filter = v;
    }
    if let Some(v) = file_cfg.max_body_bytes {
        settings.max_body_bytes = v;
    }
    if let Some(v) = file_cfg.event_channel_capacity {
        settings.event_channel_capacity = v;
    }
}

pub fn prepare_database_url(raw_database_url: &str) -> anyhow::Result<String> {
    let database_url = normalize_database_url(raw_database_url);
    ensure_parent_dir_exists(&database_url)?;
    Ok(database_url)
}

fn normalize_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

fn ensure_parent_dir_exists(database_url: &str) -> anyhow::Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
