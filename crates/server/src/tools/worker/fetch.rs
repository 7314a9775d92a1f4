//! sw_fetch tool implementation.
//!
//! Issues a request from a page and reports where the response came from.

use std::collections::BTreeMap;

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use shelter_client::fetch::resolve;
use shelter_core::{Error, Request, RequestMode};

use crate::host::HostState;
use crate::tools::json_result;

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode (default: navigate).
    #[serde(default)]
    pub mode: RequestMode,

    /// Page issuing the request, as returned by sw_clients. Omit for a page
    /// controlled by the active version.
    #[serde(default)]
    pub client: Option<u64>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub url: String,
    /// Final URL of the response.
    pub final_url: String,
    pub status: u16,
    pub status_text: String,
    pub response_type: String,
    /// One of `cache`, `network`, `offline` or `passthrough`.
    pub source: String,
    pub redirected: bool,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(host: &HostState, params: SwFetchParams) -> Result<CallToolResult, McpError> {
    let origin = host
        .config
        .origin_url()
        .map_err(|e| Error::InvalidInput(e.to_string()))?;
    let url = resolve(&origin, &params.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;

    let method = params.method.trim();
    if method.is_empty() || !method.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(Error::InvalidInput(format!("invalid method: {:?}", params.method)).into());
    }

    let request = Request::get(url.clone()).with_method(method).with_mode(params.mode);
    // the registration lock covers routing and bookkeeping only, never network I/O
    let dispatch = host.registration.lock().await.dispatch(params.client, request);
    let (fetched, event) = dispatch.run().await?;
    if let Some(event) = event {
        host.registration.lock().await.track(event);
    }

    let response = fetched.response;
    let output = SwFetchOutput {
        url: url.to_string(),
        final_url: response.url.to_string(),
        status: response.status,
        status_text: response.status_text.clone(),
        response_type: response.response_type.to_string(),
        source: fetched.source.as_str().to_string(),
        redirected: response.redirected,
        headers: response
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect(),
        body: response.text(),
    };
    json_result(&output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::{host, output};
    use crate::tools::worker::status_impl;
    use shelter_client::{MemoryNetwork, Network, NetworkError};
    use shelter_core::Response;
    use std::sync::Arc;
    use std::time::Duration;

    fn params(url: &str) -> SwFetchParams {
        SwFetchParams { url: url.into(), method: default_method(), mode: RequestMode::Navigate, client: None }
    }

    #[tokio::test]
    async fn test_fetch_from_cache() {
        let (host, network) = host().await;
        host.register(None).await.unwrap();
        network.set_offline(true);

        let out = output(&fetch_impl(&host, params("/")).await.unwrap());

        assert_eq!(out["source"], "cache");
        assert_eq!(out["status"], 200);
        assert_eq!(out["body"], "<h1>Home</h1>");
        assert_eq!(out["headers"]["content-type"], "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn test_fetch_offline_page() {
        let (host, network) = host().await;
        host.register(None).await.unwrap();
        network.set_offline(true);

        let out = output(&fetch_impl(&host, params("/papers/unseen.html")).await.unwrap());

        assert_eq!(out["source"], "offline");
        assert_eq!(out["body"], "<h1>Offline</h1>");
    }

    #[tokio::test]
    async fn test_fetch_post_passes_through() {
        let (host, _network) = host().await;
        host.register(None).await.unwrap();

        let mut p = params("/feedback");
        p.method = "post".into();
        let out = output(&fetch_impl(&host, p).await.unwrap());

        assert_eq!(out["source"], "passthrough");
        assert_eq!(out["status"], 404);
    }

    /// Answers from the inner network except for `/slow`, which never completes.
    struct StallingNetwork(Arc<MemoryNetwork>);

    #[async_trait::async_trait]
    impl Network for StallingNetwork {
        async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
            if request.url.path() == "/slow" {
                std::future::pending::<()>().await;
            }
            self.0.fetch(request).await
        }
    }

    #[tokio::test]
    async fn test_stalled_fetch_does_not_block_other_tools() {
        let (memory_host, memory) = host().await;
        let network = Arc::new(StallingNetwork(memory));
        let host = Arc::new(HostState::new(memory_host.config.clone(), memory_host.cache.clone(), network));
        host.register(None).await.unwrap();

        let stalled = tokio::spawn({
            let host = Arc::clone(&host);
            async move { fetch_impl(&host, params("/slow")).await }
        });
        tokio::task::yield_now().await;

        let status = tokio::time::timeout(Duration::from_secs(2), status_impl(&host)).await;
        assert!(status.is_ok(), "status blocked behind an in-flight fetch");

        let cached = tokio::time::timeout(Duration::from_secs(2), fetch_impl(&host, params("/"))).await;
        assert_eq!(output(&cached.unwrap().unwrap())["source"], "cache");

        stalled.abort();
    }

    #[tokio::test]
    async fn test_fetch_rejects_bad_input() {
        let (host, _network) = host().await;

        assert!(fetch_impl(&host, params("ftp://docs.test/file")).await.is_err());

        let mut p = params("/");
        p.method = "GE T".into();
        assert!(fetch_impl(&host, p).await.is_err());
    }
}
