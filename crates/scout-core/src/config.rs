use serde::Deserialize;

use crate::error::AppError;
use crate::filter::FilterRules;
use crate::normalize::FieldMap;

/// Immutable application configuration, constructed once at start-up
/// and passed explicitly to every component that needs it.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    pub filters: FilterRules,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

impl AppConfig {
    /// Validate cross-field constraints that serde defaults can't express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.sources.is_empty() {
            return Err(AppError::ConfigError(
                "at least one [[sources]] entry is required".into(),
            ));
        }
        if self.sync.batch_size == 0 {
            return Err(AppError::ConfigError(
                "sync.batch_size must be at least 1".into(),
            ));
        }
        if self.delivery.max_retries == 0 {
            return Err(AppError::ConfigError(
                "delivery.max_retries must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite ledger file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "scout.db".to_string()
}

/// Kind of scraping backend behind a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Apify,
}

/// One configured job-listing source.
///
/// `input` is an opaque blob forwarded to the scraping backend.
/// `mapping` overrides the built-in field mapping for this source tag.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    #[serde(default = "default_source_kind")]
    pub kind: SourceKind,
    pub actor: String,
    #[serde(default = "default_source_input")]
    pub input: serde_json::Value,
    #[serde(default)]
    pub mapping: Option<FieldMap>,
}

fn default_source_kind() -> SourceKind {
    SourceKind::Apify
}

fn default_source_input() -> serde_json::Value {
    serde_json::json!({})
}

/// Notification channel settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// Attempts per listing before giving up (rate-limit waits excluded).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause after every successful send, to stay under sustained limits.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    /// Base unit for exponential backoff between failed attempts.
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
    /// Description truncation length in the rendered message.
    #[serde(default = "default_truncate")]
    pub truncate_description: usize,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            delay_ms: default_delay_ms(),
            backoff_ms: default_backoff_ms(),
            truncate_description: default_truncate(),
        }
    }
}

fn default_max_retries() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    1000
}

fn default_backoff_ms() -> u64 {
    1000
}

fn default_truncate() -> usize {
    300
}

/// Remote mirror settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_sync_table")]
    pub table: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            batch_size: default_batch_size(),
            table: default_sync_table(),
        }
    }
}

fn default_sync_enabled() -> bool {
    true
}

fn default_batch_size() -> usize {
    50
}

fn default_sync_table() -> String {
    "listings".to_string()
}

/// Credentials for the external collaborators, read from the
/// environment once at start-up. Every field is optional: a missing
/// credential degrades its integration to a warn-and-skip rather than
/// aborting the run.
#[derive(Debug, Clone, Default)]
pub struct Secrets {
    pub apify_token: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        Self {
            apify_token: read_secret("APIFY_TOKEN"),
            telegram_bot_token: read_secret("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: read_secret("TELEGRAM_CHAT_ID"),
            supabase_url: read_secret("SUPABASE_URL"),
            supabase_service_key: read_secret("SUPABASE_SERVICE_KEY"),
        }
    }
}

fn read_secret(key: &str) -> Option<String> {
    match std::env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value),
        _ => {
            tracing::warn!(%key, "Secret not set, the integration using it will be skipped");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> AppConfig {
        AppConfig {
            database: DatabaseConfig::default(),
            sources: vec![SourceConfig {
                name: "upwork".into(),
                kind: SourceKind::Apify,
                actor: "some/actor".into(),
                input: serde_json::json!({}),
                mapping: None,
            }],
            filters: FilterRules::default(),
            delivery: DeliveryConfig::default(),
            sync: SyncConfig::default(),
        }
    }

    #[test]
    fn test_validate_accepts_minimal_config() {
        assert!(minimal_config().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_sources() {
        let mut config = minimal_config();
        config.sources.clear();
        assert!(matches!(
            config.validate(),
            Err(AppError::ConfigError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = minimal_config();
        config.sync.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_defaults() {
        let delivery = DeliveryConfig::default();
        assert_eq!(delivery.max_retries, 3);
        assert_eq!(delivery.truncate_description, 300);
        let sync = SyncConfig::default();
        assert!(sync.enabled);
        assert_eq!(sync.batch_size, 50);
    }
}
