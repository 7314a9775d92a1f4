//! sw_status tool implementation.
//!
//! Reports worker states, open pages and cache stores.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;
use shelter_client::RegistrationStatus;

use crate::host::HostState;
use crate::tools::json_result;

#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub name: String,
    pub entries: u64,
}

/// Output from the sw_status tool.
#[derive(Debug, Clone, Serialize)]
pub struct SwStatusOutput {
    pub origin: String,
    #[serde(flatten)]
    pub registration: RegistrationStatus,
    pub stores: Vec<StoreInfo>,
}

/// Implementation of the sw_status tool.
pub async fn status_impl(host: &HostState) -> Result<CallToolResult, McpError> {
    let registration = host.registration.lock().await.status().await;

    let mut stores = Vec::new();
    for name in host.cache.store_names().await? {
        let entries = host.cache.entry_count(&name).await?;
        stores.push(StoreInfo { name, entries });
    }

    json_result(&SwStatusOutput { origin: host.config.origin.clone(), registration, stores })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::{host, output};

    #[tokio::test]
    async fn test_status_empty() {
        let (host, _network) = host().await;
        let out = output(&status_impl(&host).await.unwrap());

        assert!(out["active"].is_null());
        assert_eq!(out["stores"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_status_after_register() {
        let (host, _network) = host().await;
        host.register(None).await.unwrap();

        let out = output(&status_impl(&host).await.unwrap());

        assert_eq!(out["origin"], "https://docs.test");
        assert_eq!(out["active"]["cache_name"], "docs-v1");
        assert_eq!(out["active"]["state"], "activated");
        assert_eq!(out["stores"][0]["name"], "docs-v1");
        assert_eq!(out["stores"][0]["entries"], 2);
    }
}
