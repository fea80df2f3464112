//! Configuration management for salesdesk

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Prefix for environment overrides, e.g. `SALESDESK__API__BASE_URL`
pub const ENV_PREFIX: &str = "SALESDESK";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct Config {
    /// Backend API configuration
    #[serde(default)]
    #[validate(nested)]
    pub api: ApiConfig,

    /// Persisted session storage
    #[serde(default)]
    pub session: SessionConfig,

    /// Client-side pagination limits
    #[serde(default)]
    #[validate(nested)]
    pub pagination: PaginationConfig,

    /// Post-login navigation
    #[serde(default)]
    #[validate(nested)]
    pub navigation: NavigationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ApiConfig {
    /// Base URL every endpoint path is joined onto
    #[serde(default = "default_base_url")]
    #[validate(url)]
    pub base_url: String,

    /// Total request timeout in seconds
    #[serde(default = "default_timeout")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    #[validate(range(min = 1))]
    pub connect_timeout_secs: u64,
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Directory holding one JSON file per persisted key
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,
}

/// Pagination limits for full-list scans
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PaginationConfig {
    /// Upper bound on pages walked by a single scan
    #[serde(default = "default_max_pages")]
    #[validate(range(min = 1))]
    pub max_pages: u32,
}

/// Navigation configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NavigationConfig {
    /// Landing path after login when nothing else applies
    #[serde(default = "default_destination")]
    #[validate(length(min = 1))]
    pub default_destination: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json or pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

const fn default_timeout() -> u64 {
    30
}

const fn default_connect_timeout() -> u64 {
    5
}

fn default_store_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "salesdesk").map_or_else(
        || {
            directories::UserDirs::new().map_or_else(
                || PathBuf::from(".salesdesk"),
                |dirs| dirs.home_dir().join(".salesdesk"),
            )
        },
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

const fn default_max_pages() -> u32 {
    500
}

fn default_destination() -> String {
    "/dashboard".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            store_dir: default_store_dir(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_pages: default_max_pages(),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            default_destination: default_destination(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from `salesdesk.toml`/`config.toml` in the working
    /// directory and `SALESDESK__*` environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded, parsed or validated.
    pub fn load() -> crate::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("salesdesk").required(false))
            .add_source(config::File::with_name("config").required(false));
        Self::build(builder)
    }

    /// Load configuration from an explicit file, still honouring environment overrides
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, malformed or fails validation.
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let builder =
            config::Config::builder().add_source(config::File::from(path.to_path_buf()));
        Self::build(builder)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> crate::Result<Self> {
        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        config.check()?;
        tracing::debug!(base_url = %config.api.base_url, "Configuration loaded");
        Ok(config)
    }

    /// Validate field constraints
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing every violated constraint.
    pub fn check(&self) -> crate::Result<()> {
        self.validate().map_err(|e| crate::Error::Configuration {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "http://localhost:8000/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.api.connect_timeout_secs, 5);
        assert_eq!(config.pagination.max_pages, 500);
        assert_eq!(config.navigation.default_destination, "/dashboard");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.format, "pretty");
        assert!(config.session.store_dir.ends_with("salesdesk") || config.session.store_dir.ends_with(".salesdesk"));
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_config_rejects_invalid_base_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();

        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_config_rejects_zero_page_bound() {
        let mut config = Config::default();
        config.pagination.max_pages = 0;
        assert!(config.check().is_err());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let toml_src = r#"
            [api]
            base_url = "https://crm.example.com/api"

            [pagination]
            max_pages = 20
        "#;

        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(toml_src, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.api.base_url, "https://crm.example.com/api");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.pagination.max_pages, 20);
        assert_eq!(config.navigation.default_destination, "/dashboard");
    }

    #[test]
    fn test_config_serialization_roundtrip_keeps_sections() {
        let config = Config::default();
        let json = serde_json::to_value(&config).expect("serialize");

        assert!(json.get("api").is_some());
        assert!(json.get("session").is_some());
        assert!(json.get("pagination").is_some());
        assert!(json.get("navigation").is_some());
        assert!(json.get("logging").is_some());
    }
}
