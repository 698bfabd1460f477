//! Runtime configuration.
//!
//! Values come from the process environment (after loading an optional
//! `.env` file) and can be overridden by settings persisted in the store.

use crate::db::{Database, StoreError};
use crate::error::AppError;
use crate::llm::RetryPolicy;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.1-8b-instant";
pub const DEFAULT_TEMPERATURE: f32 = 0.3;
pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Settings keys the store may override, paired with their environment variable.
pub const SETTING_KEYS: &[(&str, &str)] = &[
    ("api_key", "GROQ_API_KEY"),
    ("model", "ALLYTICS_MODEL"),
    ("base_url", "ALLYTICS_BASE_URL"),
];

#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub llm: LlmSettings,
    /// Explicit database file; the app data dir is used when unset.
    pub db_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!(error = %err, "ignoring unreadable .env file");
            }
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self::default();
        config.llm.api_key = get("GROQ_API_KEY");
        if let Some(model) = get("ALLYTICS_MODEL") {
            config.llm.model = model;
        }
        if let Some(base_url) = get("ALLYTICS_BASE_URL") {
            config.llm.base_url = base_url;
        }
        config.db_path = get("ALLYTICS_DB_PATH").map(PathBuf::from);
        config
    }

    /// Layer settings saved in the store over the environment values. Blank
    /// stored values are ignored.
    pub fn with_stored_settings(mut self, db: &Database) -> Result<Self, StoreError> {
        let stored = |key: &str| -> Result<Option<String>, StoreError> {
            Ok(db
                .get_setting(key)?
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()))
        };
        if let Some(key) = stored("api_key")? {
            self.llm.api_key = Some(key);
        }
        if let Some(model) = stored("model")? {
            self.llm.model = model;
        }
        if let Some(base_url) = stored("base_url")? {
            self.llm.base_url = base_url;
        }
        Ok(self)
    }
}

pub fn is_setting_key(key: &str) -> bool {
    SETTING_KEYS.iter().any(|(k, _)| *k == key)
}

/// Store an override for `key`. A blank value removes the override so the
/// environment value applies again.
pub fn update_setting(db: &Database, key: &str, value: &str) -> Result<(), AppError> {
    if !is_setting_key(key) {
        return Err(AppError::InvalidInput(format!("Unknown setting key: {}", key)));
    }
    let value = value.trim();
    if value.is_empty() {
        db.delete_setting(key)?;
        tracing::info!(key, "setting cleared");
    } else {
        db.set_setting(key, value)?;
        tracing::info!(key, "setting updated");
    }
    Ok(())
}

/// Mask a secret for display, keeping four characters at each end.
pub fn mask_secret(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    } else {
        "*".repeat(chars.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_environment_is_empty() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.llm.api_key, None);
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.llm.timeout, Duration::from_secs(30));
        assert_eq!(config.db_path, None);
    }

    #[test]
    fn environment_values_are_trimmed_and_blank_ignored() {
        let env: HashMap<&str, &str> = [
            ("GROQ_API_KEY", " gsk_test "),
            ("ALLYTICS_MODEL", ""),
            ("ALLYTICS_DB_PATH", "/tmp/allytics.db"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("gsk_test"));
        assert_eq!(config.llm.model, DEFAULT_MODEL);
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/allytics.db")));
    }

    #[test]
    fn stored_settings_override_environment() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("model", "llama-3.3-70b-versatile").unwrap();
        let config = AppConfig::from_lookup(|_| None)
            .with_stored_settings(&db)
            .unwrap();
        assert_eq!(config.llm.model, "llama-3.3-70b-versatile");
    }

    #[test]
    fn blank_stored_settings_keep_environment_values() {
        let db = Database::open_in_memory().unwrap();
        db.set_setting("api_key", "").unwrap();
        db.set_setting("model", "  ").unwrap();
        let config = AppConfig::from_lookup(|k| (k == "GROQ_API_KEY").then(|| "gsk_real_key".to_string()))
            .with_stored_settings(&db)
            .unwrap();
        assert_eq!(config.llm.api_key.as_deref(), Some("gsk_real_key"));
        assert_eq!(config.llm.model, DEFAULT_MODEL);
    }

    #[test]
    fn clearing_a_setting_removes_the_override() {
        let db = Database::open_in_memory().unwrap();
        update_setting(&db, "model", " llama-3.3-70b-versatile ").unwrap();
        assert_eq!(db.get_setting("model").unwrap().as_deref(), Some("llama-3.3-70b-versatile"));
        update_setting(&db, "model", "   ").unwrap();
        assert_eq!(db.get_setting("model").unwrap(), None);
        assert!(matches!(
            update_setting(&db, "theme", "dark"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret("gsk_abcdefghijkl"), "gsk_...ijkl");
        assert_eq!(mask_secret("short"), "*****");
    }
}
