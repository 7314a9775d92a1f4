//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SHELTER_*)
//! 2. TOML config file (if SHELTER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SHELTER_*)
/// 2. TOML config file (if SHELTER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Version-tagged cache store name. Changing it on deploy invalidates
    /// every previously cached response once the new version activates.
    ///
    /// Set via SHELTER_CACHE_NAME environment variable.
    #[serde(default = "default_cache_name")]
    pub cache_name: String,

    /// Origin (scheme, host, port) of the documentation site.
    ///
    /// Set via SHELTER_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Same-origin paths fetched and stored at install time.
    ///
    /// Set via SHELTER_PRECACHE_URLS environment variable (array syntax).
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Path of the page served when a navigation fails offline.
    /// Must also appear in `precache_urls`.
    ///
    /// Set via SHELTER_OFFLINE_URL environment variable.
    #[serde(default = "default_offline_url")]
    pub offline_url: String,

    /// Path to SQLite cache database.
    ///
    /// Set via SHELTER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    ///
    /// Set via SHELTER_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum response body bytes accepted from the network.
    ///
    /// Set via SHELTER_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Network request timeout in milliseconds. Unset means no timeout.
    ///
    /// Set via SHELTER_TIMEOUT_MS environment variable.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Whether a freshly installed version asks to activate immediately
    /// instead of waiting for open pages to close.
    ///
    /// Set via SHELTER_SKIP_WAITING_ON_INSTALL environment variable.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,
}

fn default_cache_name() -> String {
    "shelter-v1".into()
}

fn default_origin() -> String {
    "http://127.0.0.1:4000".into()
}

fn default_precache_urls() -> Vec<String> {
    vec!["/".into(), "/offline.html".into()]
}

fn default_offline_url() -> String {
    "/offline.html".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./shelter-cache.sqlite")
}

fn default_user_agent() -> String {
    "shelter/0.1".into()
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_name: default_cache_name(),
            origin: default_origin(),
            precache_urls: default_precache_urls(),
            offline_url: default_offline_url(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            max_bytes: default_max_bytes(),
            timeout_ms: None,
            skip_waiting_on_install: true,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest, if one is configured.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SHELTER_`
    /// 2. TOML file from `SHELTER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file or environment cannot be parsed,
    /// or if validation fails after loading.
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SHELTER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SHELTER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::from_figment(&figment)
    }

    /// Extract and validate configuration from an already-assembled figment.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.cache_name, "shelter-v1");
        assert_eq!(config.origin, "http://127.0.0.1:4000");
        assert_eq!(config.precache_urls, vec!["/", "/offline.html"]);
        assert_eq!(config.offline_url, "/offline.html");
        assert_eq!(config.db_path, PathBuf::from("./shelter-cache.sqlite"));
        assert_eq!(config.user_agent, "shelter/0.1");
        assert_eq!(config.max_bytes, 5_242_880);
        assert!(config.timeout_ms.is_none());
        assert!(config.skip_waiting_on_install);
    }

    #[test]
    fn test_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.timeout(), None);

        let config = AppConfig { timeout_ms: Some(20_000), ..Default::default() };
        assert_eq!(config.timeout(), Some(Duration::from_millis(20_000)));
    }

    #[test]
    fn test_from_figment_toml_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::string(
            r#"
            cache_name = "course-v7"
            origin = "https://docs.example.org"
            precache_urls = ["/", "/syllabus", "/offline.html"]
            skip_waiting_on_install = false
            "#,
        ));

        let config = AppConfig::from_figment(&figment).unwrap();
        assert_eq!(config.cache_name, "course-v7");
        assert_eq!(config.origin, "https://docs.example.org");
        assert_eq!(config.precache_urls.len(), 3);
        assert!(!config.skip_waiting_on_install);
        assert_eq!(config.user_agent, "shelter/0.1");
    }

    #[test]
    fn test_example_config_file_is_valid() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../../shelter.example.toml");
        let figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(Toml::file(path));

        let config = AppConfig::from_figment(&figment).unwrap();
        assert_eq!(config.cache_name, "agentic-ai-v1");
        assert_eq!(config.precache_urls.len(), 8);
        assert!(config.precache_urls.contains(&config.offline_url));
    }

    #[test]
    fn test_from_figment_rejects_invalid() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default()))
            .merge(Toml::string(r#"offline_url = "/missing.html""#));

        let result = AppConfig::from_figment(&figment);
        assert!(matches!(result, Err(ConfigError::Invalid { field, .. }) if field == "offline_url"));
    }
}
