//! Host environment shared by all tool calls.
//!
//! The host owns the cache database, the network and the single
//! registration for the configured origin. The registration sits behind a
//! tokio `Mutex` so events are handled one at a time.

use std::sync::Arc;

use shelter_client::{ManagerConfig, Network, OfflineCacheManager, Registration};
use shelter_core::{AppConfig, CacheDb, Error};
use tokio::sync::Mutex;

pub struct HostState {
    pub config: AppConfig,
    pub cache: CacheDb,
    pub network: Arc<dyn Network>,
    pub registration: Mutex<Registration>,
}

impl HostState {
    pub fn new(config: AppConfig, cache: CacheDb, network: Arc<dyn Network>) -> Self {
        let registration = Mutex::new(Registration::new(network.clone()));
        Self { config, cache, network, registration }
    }

    /// Build a manager version from configuration, optionally renaming its store.
    pub fn manager(&self, cache_name: Option<&str>) -> Result<OfflineCacheManager, Error> {
        let mut config = ManagerConfig::from_app_config(&self.config)?;
        if let Some(name) = cache_name {
            let name = name.trim();
            if name.is_empty() {
                return Err(Error::InvalidInput("cache_name must not be empty".into()));
            }
            config.cache_name = name.to_string();
        }
        Ok(OfflineCacheManager::new(config, self.cache.clone(), self.network.clone()))
    }

    /// Install a version and let the registration promote it when allowed.
    pub async fn register(&self, cache_name: Option<&str>) -> Result<OfflineCacheManager, Error> {
        let manager = self.manager(cache_name)?;
        self.registration.lock().await.register(manager.clone()).await?;
        Ok(manager)
    }

    /// Name of the store the active version serves from, if any.
    pub async fn active_cache_name(&self) -> Option<String> {
        let registration = self.registration.lock().await;
        registration.active().map(|m| m.cache_name().to_string())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::host;
    use super::*;

    #[tokio::test]
    async fn test_register_from_config() {
        let (host, _network) = host().await;
        let manager = host.register(None).await.unwrap();

        assert_eq!(manager.cache_name(), "docs-v1");
        assert_eq!(host.active_cache_name().await.as_deref(), Some("docs-v1"));
        assert_eq!(host.cache.entry_count("docs-v1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_register_with_override() {
        let (host, _network) = host().await;
        host.register(Some("docs-v2")).await.unwrap();
        assert_eq!(host.active_cache_name().await.as_deref(), Some("docs-v2"));
    }

    #[tokio::test]
    async fn test_blank_override_rejected() {
        let (host, _network) = host().await;
        assert!(matches!(host.manager(Some("  ")), Err(Error::InvalidInput(_))));
    }
}
