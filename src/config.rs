use crate::db::Database;
use crate::upload::ProgressMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";
pub const DEFAULT_CHAT_ID: &str = "1";
pub const DEFAULT_BOT_AVATAR: &str = "/images/bot-avatar.png";
pub const STORE_FILE_NAME: &str = "chatResponses.json";

pub const SETTING_KEYS: &[&str] = &[
    "backend_url",
    "store_url",
    "chat_id",
    "bot_avatar",
    "progress_mode",
    "store_file",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    pub backend_url: String,
    /// Persistence endpoint base URL. Transcript mirroring is off when unset.
    pub store_url: Option<String>,
    pub chat_id: String,
    pub bot_avatar: String,
    pub progress_mode: ProgressMode,
    pub store_file: PathBuf,
}

impl Settings {
    pub fn defaults(data_dir: &Path) -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            store_url: None,
            chat_id: DEFAULT_CHAT_ID.to_string(),
            bot_avatar: DEFAULT_BOT_AVATAR.to_string(),
            progress_mode: ProgressMode::Binary,
            store_file: data_dir.join(STORE_FILE_NAME),
        }
    }

    pub fn load(db: &Database, data_dir: &Path) -> rusqlite::Result<Self> {
        let mut settings = Self::defaults(data_dir);
        if let Some(v) = db.get_setting("backend_url")? {
            settings.backend_url = v.trim_end_matches('/').to_string();
        }
        settings.store_url = db
            .get_setting("store_url")?
            .map(|v| v.trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty());
        if let Some(v) = db.get_setting("chat_id")? {
            settings.chat_id = v;
        }
        if let Some(v) = db.get_setting("bot_avatar")? {
            settings.bot_avatar = v;
        }
        if let Some(v) = db.get_setting("progress_mode")? {
            match parse_progress_mode(&v) {
                Some(mode) => settings.progress_mode = mode,
                None => tracing::warn!(value = %v, "unknown progress_mode, using binary"),
            }
        }
        if let Some(v) = db.get_setting("store_file")? {
            settings.store_file = PathBuf::from(v);
        }
        Ok(settings)
    }
}

fn parse_progress_mode(value: &str) -> Option<ProgressMode> {
    match value {
        "binary" => Some(ProgressMode::Binary),
        "simulated" => Some(ProgressMode::Simulated {
            step: 10,
            tick: Duration::from_millis(500),
            ceiling: Duration::from_secs(5),
        }),
        _ => None,
    }
}

/// Validate a key/value pair before it is written to the settings table.
pub fn check_setting(key: &str, value: &str) -> Result<(), String> {
    if !SETTING_KEYS.contains(&key) {
        return Err(format!("Unknown setting key: {}", key));
    }
    match key {
        "backend_url" | "store_url" if !value.is_empty() => reqwest::Url::parse(value)
            .map(|_| ())
            .map_err(|e| format!("Invalid URL for {}: {}", key, e)),
        "progress_mode" if parse_progress_mode(value).is_none() => {
            Err(format!("progress_mode must be 'binary' or 'simulated', got '{}'", value))
        }
        _ => Ok(()),
    }
}
