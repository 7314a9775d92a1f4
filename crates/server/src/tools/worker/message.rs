//! sw_message tool implementation.
//!
//! Posts a message from a page to the waiting or active version.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::host::HostState;
use crate::tools::json_result;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// Message payload. Only the string "skipWaiting" is acted on.
    pub data: Value,
}

/// Output from the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// Recognized command, if any.
    pub command: Option<String>,
    pub active: Option<String>,
    pub waiting: Option<String>,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(host: &HostState, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let mut registration = host.registration.lock().await;
    let command = registration.post_message(&params.data).await?;

    let output = SwMessageOutput {
        command: command.map(|c| c.as_str().to_string()),
        active: registration.active().map(|m| m.cache_name().to_string()),
        waiting: registration.waiting().map(|m| m.cache_name().to_string()),
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::{host, output};
    use serde_json::json;
    use shelter_client::{ManagerConfig, OfflineCacheManager};

    #[tokio::test]
    async fn test_skip_waiting_promotes_waiting_version() {
        let (host, _network) = host().await;
        host.register(None).await.unwrap();
        host.registration.lock().await.open_client();

        let mut config = ManagerConfig::from_app_config(&host.config)
            .unwrap()
            .with_skip_waiting_on_install(false);
        config.cache_name = "docs-v2".into();
        let v2 = OfflineCacheManager::new(config, host.cache.clone(), host.network.clone());
        host.registration.lock().await.register(v2).await.unwrap();
        assert_eq!(host.active_cache_name().await.as_deref(), Some("docs-v1"));

        let out = output(&message_impl(&host, SwMessageParams { data: json!("skipWaiting") }).await.unwrap());

        assert_eq!(out["command"], "skipWaiting");
        assert_eq!(out["active"], "docs-v2");
        assert!(out["waiting"].is_null());
    }

    #[tokio::test]
    async fn test_other_messages_ignored() {
        let (host, _network) = host().await;
        host.register(None).await.unwrap();

        let out = output(&message_impl(&host, SwMessageParams { data: json!({"type": "ping"}) }).await.unwrap());

        assert!(out["command"].is_null());
        assert_eq!(out["active"], "docs-v1");
    }
}
