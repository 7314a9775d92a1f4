//! sw_register tool implementation.
//!
//! Installs a new manager version built from configuration.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::host::HostState;
use crate::tools::json_result;

/// Parameters for the sw_register tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwRegisterParams {
    /// Cache name for the new version. Defaults to the configured name.
    #[serde(default)]
    pub cache_name: Option<String>,
}

/// Output from the sw_register tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwRegisterOutput {
    pub cache_name: String,
    /// Lifecycle state of the new version: `installed` while waiting, `activated` once in control.
    pub state: String,
    pub active: Option<String>,
    pub waiting: Option<String>,
    pub precached: u64,
}

/// Implementation of the sw_register tool.
pub async fn register_impl(host: &HostState, params: SwRegisterParams) -> Result<CallToolResult, McpError> {
    let manager = host.register(params.cache_name.as_deref()).await?;
    let precached = host.cache.entry_count(manager.cache_name()).await?;

    let registration = host.registration.lock().await;
    let output = SwRegisterOutput {
        cache_name: manager.cache_name().to_string(),
        state: manager.state().await.to_string(),
        active: registration.active().map(|m| m.cache_name().to_string()),
        waiting: registration.waiting().map(|m| m.cache_name().to_string()),
        precached,
    };
    json_result(&output)
}
