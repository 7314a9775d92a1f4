//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;
use url::Url;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Parsed origin URL.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an http(s) URL
    /// without a path, query or fragment.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin).map_err(|e| invalid("origin", e.to_string()))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("origin", format!("unsupported scheme: {}", url.scheme())));
        }
        if url.host_str().is_none() {
            return Err(invalid("origin", "must include a host"));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("origin", "must be scheme, host and port only"));
        }

        Ok(url)
    }

    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_name` is empty
    /// - `origin` is not a bare http(s) origin
    /// - a precache path or `offline_url` does not start with `/`, or starts with `//`
    /// - `offline_url` is not in `precache_urls`
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is set and outside 100ms..=5 minutes
    /// - `user_agent` is empty
    ///
    /// Returns `ConfigError::Missing` if `precache_urls` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_name.trim().is_empty() {
            return Err(invalid("cache_name", "must not be empty"));
        }

        self.origin_url()?;

        if self.precache_urls.is_empty() {
            return Err(ConfigError::Missing {
                field: "precache_urls".into(),
                hint: "list at least the offline page, e.g. [\"/offline.html\"]".into(),
            });
        }
        if let Some(path) = self.precache_urls.iter().find(|p| !is_origin_path(p)) {
            return Err(invalid("precache_urls", format!("path must start with a single '/': {path}")));
        }

        if !is_origin_path(&self.offline_url) {
            return Err(invalid("offline_url", "path must start with a single '/'"));
        }
        if !self.precache_urls.contains(&self.offline_url) {
            return Err(invalid("offline_url", "must be listed in precache_urls"));
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if let Some(timeout_ms) = self.timeout_ms {
            if timeout_ms < 100 {
                return Err(invalid("timeout_ms", "must be at least 100ms"));
            }
            if timeout_ms > 300_000 {
                return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
            }
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        let mut seen = std::collections::HashSet::new();
        let duplicates = self.precache_urls.iter().filter(|p| !seen.insert(p.as_str())).count();
        if duplicates > 0 {
            tracing::warn!(duplicates, "precache_urls contains duplicate paths; each is fetched once per entry");
        }

        Ok(())
    }
}

/// `//host/x` is protocol-relative and would leave the origin.
fn is_origin_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//")
}
