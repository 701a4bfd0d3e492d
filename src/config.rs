use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::local_db::LocalDatabase;
use crate::shared::config::{AppConfig, AppConfigBuilder, ConfigError};

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Default seconds between background drain attempts
const DEFAULT_SYNC_INTERVAL_SECS: u64 = 30;

const ENV_API_URL: &str = "FLOATPLAN_API_URL";
const ENV_TOKEN: &str = "FLOATPLAN_TOKEN";
const ENV_DB_PATH: &str = "FLOATPLAN_DB_PATH";
const ENV_PROBE_URL: &str = "FLOATPLAN_PROBE_URL";

/// Application configuration wrapper.
#[derive(Debug, Clone, Default)]
pub struct Config {
    app: AppConfig,
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_builder(builder: AppConfigBuilder) -> Result<Self, ConfigError> {
        Ok(Self { app: builder.build()? })
    }

    /// Configuration from `FLOATPLAN_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = AppConfig::builder();
        if let Ok(url) = std::env::var(ENV_API_URL) {
            builder = builder.server_url(url);
        }
        if let Ok(token) = std::env::var(ENV_TOKEN) {
            builder = builder.token(token);
        }
        if let Ok(path) = std::env::var(ENV_DB_PATH) {
            builder = builder.database_path(path);
        }
        if let Ok(url) = std::env::var(ENV_PROBE_URL) {
            builder = builder.probe_url(url);
        }
        Self::with_builder(builder)
    }

    /// Configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self {
            app: AppConfig::from_toml(&contents)?,
        })
    }

    /// `<config_dir>/floatplan/config.toml`
    pub fn default_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("floatplan").join("config.toml"))
    }

    /// Load the default config file if present, then overlay the environment
    pub fn load() -> Result<Self, ConfigError> {
        let file = match Self::default_file_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::from_file(path)?.app
            }
            _ => AppConfig::default(),
        };
        let env = Self::from_env()?.app;
        Ok(Self {
            app: file.merge(env),
        })
    }

    /// Get the API token
    pub fn get_token(&self) -> Option<&String> {
        self.app.token.as_ref()
    }

    pub fn server_url(&self) -> &str {
        self.app.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    /// URL polled by the connectivity probe, if one is configured
    pub fn probe_url(&self) -> Option<&str> {
        self.app.probe_url.as_deref()
    }

    /// Local database location; falls back to the platform data directory
    pub fn database_path(&self) -> PathBuf {
        self.app
            .database_path
            .clone()
            .unwrap_or_else(LocalDatabase::default_path)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(
            self.app
                .sync_interval_seconds
                .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
        )
    }
}
