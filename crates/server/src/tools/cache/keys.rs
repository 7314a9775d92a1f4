//! cache_keys tool implementation.
//!
//! Lists the URLs stored in a cache store.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_core::Error;

use crate::host::HostState;
use crate::tools::json_result;

/// Parameters for the cache_keys tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysParams {
    /// Store to list. Defaults to the active version's store, or the
    /// configured cache name when nothing is active.
    #[serde(default)]
    pub store: Option<String>,
}

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    pub store: String,
    /// Every store currently present, oldest first.
    pub stores: Vec<String>,
    pub urls: Vec<String>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(host: &HostState, params: CacheKeysParams) -> Result<CallToolResult, McpError> {
    let store = match params.store {
        Some(name) => name,
        None => host
            .active_cache_name()
            .await
            .unwrap_or_else(|| host.config.cache_name.clone()),
    };

    if !host.cache.has_store(&store).await? {
        return Err(Error::CacheMiss(format!("no cache store named {store}")).into());
    }

    let urls = host.cache.entry_urls(&store).await?;
    let stores = host.cache.store_names().await?;
    json_result(&CacheKeysOutput { store, stores, urls })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::{host, output};

    #[tokio::test]
    async fn test_keys_of_active_store() {
        let (host, _network) = host().await;
        host.register(None).await.unwrap();

        let result = keys_impl(&host, CacheKeysParams::default()).await.unwrap();
        let out = output(&result);

        assert_eq!(out["store"], "docs-v1");
        assert_eq!(
            out["urls"],
            serde_json::json!(["https://docs.test/", "https://docs.test/offline.html"])
        );
    }

    #[tokio::test]
    async fn test_keys_missing_store() {
        let (host, _network) = host().await;
        let params = CacheKeysParams { store: Some("nope".into()) };
        assert!(keys_impl(&host, params).await.is_err());
    }
}
