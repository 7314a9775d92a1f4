//! sw_clients tool implementation.
//!
//! Opens or closes a page on the origin.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_core::Error;

use crate::host::HostState;
use crate::tools::json_result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClientAction {
    Open,
    Close,
}

/// Parameters for the sw_clients tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwClientsParams {
    pub action: ClientAction,

    /// Page to close. Required for `close`.
    #[serde(default)]
    pub client: Option<u64>,
}

/// Output from the sw_clients tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwClientsOutput {
    pub client: u64,
    /// Version controlling the page after an open.
    pub controller: Option<String>,
    /// Active version after the action; closing the last page may promote a waiting one.
    pub active: Option<String>,
    pub open_clients: usize,
}

/// Implementation of the sw_clients tool.
pub async fn clients_impl(host: &HostState, params: SwClientsParams) -> Result<CallToolResult, McpError> {
    let mut registration = host.registration.lock().await;

    let (client, controller) = match params.action {
        ClientAction::Open => {
            let id = registration.open_client();
            (id, registration.active().map(|m| m.cache_name().to_string()))
        }
        ClientAction::Close => {
            let id = params
                .client
                .ok_or_else(|| Error::InvalidInput("client is required to close a page".into()))?;
            registration.close_client(id).await?;
            (id, None)
        }
    };

    let output = SwClientsOutput {
        client,
        controller,
        active: registration.active().map(|m| m.cache_name().to_string()),
        open_clients: registration.clients().len(),
    };
    json_result(&output)
}
