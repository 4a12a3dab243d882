use serde::Deserialize;
use config::{Config, ConfigError, Environment, File};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub api: ApiConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub payments: PaymentsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    pub token_key: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PaymentsConfig {
    /// When set, receipts are downloaded into this directory instead of
    /// being handed back as URLs.
    pub receipt_dir: Option<PathBuf>,
    #[serde(default)]
    pub fail_closed_on_unknown_overdue: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("api.base_url", "http://localhost:8000")?
            .set_default("api.timeout_secs", 30)?
            .set_default("storage.database_url", "sqlite://tlc-client.db?mode=rwc")?
            .set_default("storage.token_key", "session_token")?
            .set_default("payments.fail_closed_on_unknown_overdue", false)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with TLC__ prefix, double underscore separates levels)
            .add_source(Environment::with_prefix("TLC").separator("__"))

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api: ApiConfig {
                base_url: "http://localhost:8000".to_string(),
                timeout_secs: 30,
            },
            storage: StorageConfig {
                database_url: "sqlite://tlc-client.db?mode=rwc".to_string(),
                token_key: "session_token".to_string(),
            },
            payments: PaymentsConfig {
                receipt_dir: None,
                fail_closed_on_unknown_overdue: false,
            },
        }
    }
}
