//! In-memory network serving a fixed route table.
//!
//! Used to drive the cache manager without real sockets: routes are
//! registered per URL, unknown URLs answer 404, and the whole network can be
//! switched offline to simulate lost connectivity. Every request is logged.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use shelter_core::{Error, Request, Response, ResponseType};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use super::origin::resolve;
use super::{Network, NetworkError, classify, make_opaque};

/// Route-table network with an offline switch.
pub struct MemoryNetwork {
    origin: Url,
    routes: RwLock<HashMap<String, Response>>,
    offline: AtomicBool,
    log: Mutex<Vec<String>>,
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit_once('.').map(|(_, ext)| ext) {
        Some("css") => "text/css",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        _ => "text/html; charset=utf-8",
    }
}

impl MemoryNetwork {
    /// Create an empty network for pages on `origin`.
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            routes: RwLock::new(HashMap::new()),
            offline: AtomicBool::new(false),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Serve `body` with `status` at a path or absolute URL.
    pub async fn route(&self, target: &str, status: u16, body: &str) -> Result<(), Error> {
        let url = resolve(&self.origin, target).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let response =
            Response::basic(url.clone(), status, body.to_string()).with_header("content-type", content_type_for(url.path()));
        self.routes.write().await.insert(url.to_string(), response);
        Ok(())
    }

    /// Serve an exact response at a path or absolute URL.
    pub async fn route_response(&self, target: &str, response: Response) -> Result<(), Error> {
        let url = resolve(&self.origin, target).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        self.routes.write().await.insert(url.to_string(), response);
        Ok(())
    }

    /// Remove a route; the URL answers 404 afterwards.
    pub async fn unroute(&self, target: &str) -> Result<(), Error> {
        let url = resolve(&self.origin, target).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        self.routes.write().await.remove(url.as_str());
        Ok(())
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Requests seen so far, as `METHOD url`.
    pub async fn requests(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.log.lock().await.len()
    }

    pub async fn clear_requests(&self) {
        self.log.lock().await.clear();
    }
}

#[async_trait::async_trait]
impl Network for MemoryNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
        self.log.lock().await.push(format!("{} {}", request.method, request.url));

        if self.is_offline() {
            return Err(NetworkError::Unreachable { url: request.url.to_string(), reason: "network offline".into() });
        }

        let routed = self.routes.read().await.get(request.url.as_str()).cloned();
        let mut response = routed.unwrap_or_else(|| Response::basic(request.url.clone(), 404, "Not Found"));

        if response.response_type == ResponseType::Basic {
            response.response_type = classify(&self.origin, &response.url, request.mode);
        }

        tracing::debug!("memory network {} {} -> {}", request.method, request.url, response.status);

        Ok(if response.response_type == ResponseType::Opaque { make_opaque(response) } else { response })
    }
}
