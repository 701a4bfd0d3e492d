//! Application configuration module
//!
//! Provides the validated configuration values shared by the sync engine,
//! the remote client and the local database.

use std::path::PathBuf;

use serde::Deserialize;
use thiserror::Error;

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct AppConfig {
    /// Base URL of the float plan API
    pub server_url: Option<String>,
    /// URL polled by the connectivity probe
    pub probe_url: Option<String>,
    /// Path of the local SQLite database
    pub database_path: Option<PathBuf>,
    /// Bearer token for the float plan API
    pub token: Option<String>,
    /// Seconds between background drain attempts
    pub sync_interval_seconds: Option<u64>,
}

impl AppConfig {
    /// Create a new AppConfigBuilder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Parse a TOML document into a validated configuration
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        for url in [&self.server_url, &self.probe_url].into_iter().flatten() {
            validate_url(url)?;
        }
        if self.sync_interval_seconds == Some(0) {
            return Err(ConfigError::MissingValue("sync-interval-seconds must be positive"));
        }
        Ok(())
    }

    /// Overlay `other` onto `self`; set fields in `other` win
    pub fn merge(self, other: AppConfig) -> AppConfig {
        AppConfig {
            server_url: other.server_url.or(self.server_url),
            probe_url: other.probe_url.or(self.probe_url),
            database_path: other.database_path.or(self.database_path),
            token: other.token.or(self.token),
            sync_interval_seconds: other.sync_interval_seconds.or(self.sync_interval_seconds),
        }
    }
}

fn validate_url(url: &str) -> Result<(), ConfigError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| ConfigError::InvalidUrl(url.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        _ => Err(ConfigError::InvalidUrl(url.to_string())),
    }
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    server_url: Option<String>,
    probe_url: Option<String>,
    database_path: Option<PathBuf>,
    token: Option<String>,
    sync_interval_seconds: Option<u64>,
}

impl AppConfigBuilder {
    /// Set the server URL
    pub fn server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = Some(url.into());
        self
    }

    /// Set the connectivity probe URL
    pub fn probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = Some(url.into());
        self
    }

    /// Set the local database path
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Set the API token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the background drain interval
    pub fn sync_interval_seconds(mut self, seconds: u64) -> Self {
        self.sync_interval_seconds = Some(seconds);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let config = AppConfig {
            server_url: self.server_url,
            probe_url: self.probe_url,
            database_path: self.database_path,
            token: self.token,
            sync_interval_seconds: self.sync_interval_seconds,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config file: {0}")]
    Parse(String),
}
