//! Network access for the offline cache manager.
//!
//! ### Network seam
//! - The manager only talks to the network through the [`Network`] trait.
//! - [`HttpNetwork`] is the reqwest-backed implementation.
//! - [`MemoryNetwork`] serves a fixed route table and can be switched offline.
//!
//! ### Failure model
//! - HTTP error statuses are successful fetches and come back as responses.
//! - Only connectivity failures (refused, reset, DNS, timeout, oversized body)
//!   are `NetworkError`s.
//!
//! ### Response classification
//! - `basic` when the final URL shares the page origin
//! - `opaque` for cross-origin `no-cors` requests (status 0, no body)
//! - `cors` otherwise

pub mod memory;
pub mod origin;

use std::time::{Duration, Instant};

use reqwest::Client;
use shelter_core::{AppConfig, Error, Request, RequestMode, Response, ResponseType};
use url::Url;

pub use memory::MemoryNetwork;
pub use origin::{UrlError, is_same_origin, resolve};

/// Connectivity-level fetch failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    #[error("failed to fetch {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("request timed out")]
    Timeout,

    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for NetworkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NetworkError::Timeout
        } else {
            NetworkError::Unreachable {
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
                reason: err.to_string(),
            }
        }
    }
}

impl From<NetworkError> for Error {
    fn from(err: NetworkError) -> Self {
        Error::Network(err.to_string())
    }
}

/// Network trait used by the cache manager.
///
/// Implementations must report connectivity failures as `Err` and every
/// HTTP response, whatever its status, as `Ok`.
#[async_trait::async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// Response type for a fetch issued from `page_origin` that ended at `final_url`.
pub fn classify(page_origin: &Url, final_url: &Url, mode: RequestMode) -> ResponseType {
    if is_same_origin(page_origin, final_url) {
        ResponseType::Basic
    } else if mode == RequestMode::NoCors {
        ResponseType::Opaque
    } else {
        ResponseType::Cors
    }
}

/// Hide status, headers and body of an opaque response.
pub(crate) fn make_opaque(mut response: Response) -> Response {
    response.status = 0;
    response.status_text = String::new();
    response.headers.clear();
    response.body = bytes::Bytes::new();
    response
}

/// Configuration for the HTTP network.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Origin of the pages issuing requests; decides `basic` vs cross-origin.
    pub origin: Url,

    /// User agent string (default: "shelter/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: none)
    pub timeout: Option<Duration>,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl NetworkConfig {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            user_agent: "shelter/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: None,
            max_redirects: 5,
        }
    }

    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::new(origin)
        })
    }
}

/// reqwest-backed network.
pub struct HttpNetwork {
    http: Client,
    config: NetworkConfig,
}

impl HttpNetwork {
    /// Create a new HTTP network with the given configuration.
    pub fn new(config: NetworkConfig) -> Result<Self, Error> {
        let mut builder = Client::builder()
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true);

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let http = builder
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }
}

#[async_trait::async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        let start = Instant::now();
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| NetworkError::InvalidRequest(e.to_string()))?;

        let mut builder = self.http.request(method, request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if request.is_navigation() && !request.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("accept")) {
            builder = builder.header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            );
        }

        let response = builder.send().await?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(NetworkError::TooLarge { size: len, limit: self.config.max_bytes });
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();

        let body = response.bytes().await?;

        if body.len() > self.config.max_bytes {
            return Err(NetworkError::TooLarge { size: body.len() as u64, limit: self.config.max_bytes });
        }

        let redirected = final_url != request.url;
        let response_type = classify(&self.config.origin, &final_url, request.mode);

        tracing::debug!(
            "fetched {} -> {} ({}, {}) in {}ms ({} bytes)",
            request.url,
            final_url,
            status.as_u16(),
            response_type,
            start.elapsed().as_millis(),
            body.len()
        );

        let response = Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            response_type,
            url: final_url,
            redirected,
            headers,
            body,
        };

        Ok(if response_type == ResponseType::Opaque { make_opaque(response) } else { response })
    }
}
