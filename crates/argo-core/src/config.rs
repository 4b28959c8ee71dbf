use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ArgoError, Result};

/// Top-level configuration for the Argo application.
///
/// Loaded from `~/.argo/config.toml` by default. Secrets are never stored in
/// the file; sections name the environment variables that hold them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArgoConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub bank: BankConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

impl ArgoConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ArgoConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.argo/data".to_string(),
            log_level: "info".to_string(),
            port: 3040,
        }
    }
}

/// Hosted language model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of the Messages API.
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Model identifier sent with every request.
    pub model_id: String,
    /// Value of the `anthropic-version` header.
    pub api_version: String,
    /// Output bound for assistant replies.
    pub max_output_tokens: u32,
    /// Output bound for the lookback-window extraction call.
    pub extraction_max_tokens: u32,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            model_id: "claude-3-5-sonnet-20240620".to_string(),
            api_version: "2023-06-01".to_string(),
            max_output_tokens: 1000,
            extraction_max_tokens: 100,
            timeout_secs: 60,
        }
    }
}

impl ModelConfig {
    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        read_secret(&self.api_key_env)
    }
}

/// Bank-data aggregation API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BankConfig {
    /// Base URL of the aggregation API (sandbox by default).
    pub base_url: String,
    /// Environment variable holding the client id.
    pub client_id_env: String,
    /// Environment variable holding the client secret.
    pub secret_env: String,
    /// Display name shown in the account-linking flow.
    pub client_name: String,
    /// Products requested when creating a link token.
    pub products: Vec<String>,
    /// Country codes requested when creating a link token.
    pub country_codes: Vec<String>,
    /// Language of the account-linking flow.
    pub language: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            base_url: "https://sandbox.plaid.com".to_string(),
            client_id_env: "PLAID_CLIENT_ID".to_string(),
            secret_env: "PLAID_SECRET".to_string(),
            client_name: "Argo AI Financial Helper".to_string(),
            products: vec![
                "auth".to_string(),
                "transactions".to_string(),
                "investments".to_string(),
            ],
            country_codes: vec!["US".to_string()],
            language: "en".to_string(),
            timeout_secs: 30,
        }
    }
}

impl BankConfig {
    /// Read `(client_id, secret)` from the configured environment variables.
    pub fn credentials(&self) -> Result<(String, String)> {
        Ok((read_secret(&self.client_id_env)?, read_secret(&self.secret_env)?))
    }
}

/// Storage identifiers.
///
/// Bucket names partition the object store; an empty name means the
/// operation that needs it cannot run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file name inside `general.data_dir`.
    pub database_file: String,
    /// Bucket holding `{conversationId}.json` transcripts.
    pub transcripts_bucket: String,
    /// Bucket holding attachments. Empty falls back to `transcripts_bucket`.
    pub attachments_bucket: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: "argo.db".to_string(),
            transcripts_bucket: "argo-conversations".to_string(),
            attachments_bucket: String::new(),
        }
    }
}

impl StorageConfig {
    /// Effective attachments bucket after applying the fallback.
    pub fn effective_attachments_bucket(&self) -> &str {
        if self.attachments_bucket.is_empty() {
            &self.transcripts_bucket
        } else {
            &self.attachments_bucket
        }
    }
}

/// Chat turn pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Lookback window used when the user names no period.
    pub default_lookback_days: u32,
    /// Largest window the bank collaborator is asked for.
    pub max_lookback_days: u32,
    /// Maximum transactions embedded in the grounding snapshot.
    pub transaction_cap: usize,
    /// Characters of the first message used as the conversation title.
    pub title_chars: usize,
    /// Debounce delay for transcript saves.
    pub autosave_delay_ms: u64,
    /// Maximum accepted user message length in characters.
    pub max_message_length: usize,
    /// Assistant greeting that opens every new conversation.
    pub greeting: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_lookback_days: 30,
            max_lookback_days: 730,
            transaction_cap: 50,
            title_chars: 30,
            autosave_delay_ms: 1000,
            max_message_length: 4000,
            greeting: "Hello! I analyze your finances. You can ask me to show your spending charts, check balances, list recent transactions, or review your portfolio.".to_string(),
        }
    }
}

fn read_secret(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ArgoError::ConfigurationMissing(format!(
            "environment variable {} is not set",
            var
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = ArgoConfig::default();
        assert_eq!(config.general.data_dir, "~/.argo/data");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.port, 3040);
        assert_eq!(config.model.max_output_tokens, 1000);
        assert_eq!(config.model.extraction_max_tokens, 100);
        assert_eq!(config.chat.default_lookback_days, 30);
        assert_eq!(config.chat.max_lookback_days, 730);
        assert_eq!(config.chat.transaction_cap, 50);
        assert_eq!(config.chat.title_chars, 30);
        assert_eq!(config.chat.autosave_delay_ms, 1000);
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/srv/argo"
log_level = "debug"
port = 8080

[model]
model_id = "claude-test"
max_output_tokens = 500

[storage]
transcripts_bucket = "chats"
attachments_bucket = "files"

[chat]
transaction_cap = 10
"#;
        let file = create_temp_config(content);
        let config = ArgoConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/srv/argo");
        assert_eq!(config.general.port, 8080);
        assert_eq!(config.model.model_id, "claude-test");
        assert_eq!(config.model.max_output_tokens, 500);
        // Unset fields in a present section keep their defaults.
        assert_eq!(config.model.extraction_max_tokens, 100);
        assert_eq!(config.storage.effective_attachments_bucket(), "files");
        assert_eq!(config.chat.transaction_cap, 10);
        assert_eq!(config.chat.title_chars, 30);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config("[general]\nlog_level = \"warn\"\n");
        let config = ArgoConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        assert_eq!(config.bank.base_url, "https://sandbox.plaid.com");
        assert_eq!(config.storage.transcripts_bucket, "argo-conversations");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[general\nport = ");
        let err = ArgoConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ArgoError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = ArgoConfig::load_or_default(Path::new("/nonexistent/argo.toml"));
        assert_eq!(config.general.data_dir, "~/.argo/data");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = ArgoConfig::default();
        config.chat.greeting = "Hi there".to_string();
        config.save(&path).unwrap();

        let reloaded = ArgoConfig::load(&path).unwrap();
        assert_eq!(reloaded.chat.greeting, "Hi there");
        assert_eq!(reloaded.bank.products, config.bank.products);
        assert_eq!(reloaded.general.port, config.general.port);
    }

    #[test]
    fn test_attachments_bucket_falls_back_to_transcripts() {
        let storage = StorageConfig::default();
        assert_eq!(storage.effective_attachments_bucket(), "argo-conversations");

        let storage = StorageConfig {
            transcripts_bucket: String::new(),
            attachments_bucket: String::new(),
            ..StorageConfig::default()
        };
        assert_eq!(storage.effective_attachments_bucket(), "");
    }

    #[test]
    fn test_missing_secret_is_configuration_missing() {
        let model = ModelConfig {
            api_key_env: "ARGO_TEST_SURELY_UNSET_KEY".to_string(),
            ..ModelConfig::default()
        };
        let err = model.api_key().unwrap_err();
        assert!(matches!(err, ArgoError::ConfigurationMissing(_)));
        assert!(err.to_string().contains("ARGO_TEST_SURELY_UNSET_KEY"));
    }
}
