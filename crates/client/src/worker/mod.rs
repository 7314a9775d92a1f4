//! Offline cache manager for a single-origin documentation site.
//!
//! ### Install
//! - Fetch every precache URL; all must succeed with an OK status.
//! - Write them into the version's store in one transaction, or not at all.
//! - Optionally ask to skip waiting so the version takes over immediately.
//!
//! ### Activate
//! - Delete every cache store whose name is not this version's.
//! - Ask the host to claim already-open pages.
//!
//! ### Fetch
//! - Cross-origin and non-GET requests are not intercepted.
//! - Cache hit: served verbatim, no network, no freshness check.
//! - Miss: network; plain same-origin 200s are copied into the store in the
//!   background, everything else is returned uncached.
//! - Network failure: navigations get the precached offline page, other
//!   requests fail.

pub mod event;
pub mod lifecycle;
pub mod message;
pub mod registration;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::try_join_all;
use serde_json::Value;
use shelter_core::{AppConfig, CacheDb, CacheEntry, Error, Request};
use tokio::sync::RwLock;
use url::Url;

use crate::fetch::{Network, is_same_origin, resolve};

pub use event::{EventKind, ExtendableEvent, FetchEvent, FetchOutcome, ResponseSource};
pub use lifecycle::WorkerState;
pub use message::ClientCommand;
pub use registration::{ClientId, Dispatch, Fetched, Registration, RegistrationStatus};

/// Explicit manager configuration: version tag, origin and essential pages.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Version-tagged store name.
    pub cache_name: String,
    pub origin: Url,
    pub precache_urls: Vec<Url>,
    pub offline_url: Url,
    pub skip_waiting_on_install: bool,
}

fn resolve_path(origin: &Url, path: &str) -> Result<Url, Error> {
    resolve(origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
}

impl ManagerConfig {
    /// Config with no precache list and `/offline.html` as the offline page.
    pub fn new(cache_name: impl Into<String>, origin: Url) -> Self {
        let mut offline_url = origin.clone();
        offline_url.set_path("/offline.html");
        Self {
            cache_name: cache_name.into(),
            origin,
            precache_urls: Vec::new(),
            offline_url,
            skip_waiting_on_install: true,
        }
    }

    pub fn with_precache(mut self, paths: &[&str]) -> Result<Self, Error> {
        self.precache_urls = paths
            .iter()
            .map(|p| resolve_path(&self.origin, p))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn with_offline_page(mut self, path: &str) -> Result<Self, Error> {
        self.offline_url = resolve_path(&self.origin, path)?;
        Ok(self)
    }

    pub fn with_skip_waiting_on_install(mut self, skip: bool) -> Self {
        self.skip_waiting_on_install = skip;
        self
    }

    /// Build from validated application configuration.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let paths: Vec<&str> = config.precache_urls.iter().map(String::as_str).collect();
        Self::new(config.cache_name.clone(), origin)
            .with_precache(&paths)?
            .with_offline_page(&config.offline_url)
            .map(|c| c.with_skip_waiting_on_install(config.skip_waiting_on_install))
    }
}

struct Inner {
    config: ManagerConfig,
    cache: CacheDb,
    network: Arc<dyn Network>,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    claim_requested: AtomicBool,
}

impl Inner {
    /// Fetch the whole precache list, then commit it as one set.
    async fn precache(&self) -> Result<usize, Error> {
        let fetches = self.config.precache_urls.iter().map(|url| async move {
            let response = self
                .network
                .fetch(&Request::get(url.clone()))
                .await
                .map_err(|e| Error::PrecacheFailed { url: url.to_string(), reason: e.to_string() })?;

            if !response.ok() {
                return Err(Error::PrecacheFailed { url: url.to_string(), reason: format!("status {}", response.status) });
            }

            Ok::<_, Error>(CacheEntry::new("GET", url.clone(), response))
        });

        let entries = try_join_all(fetches).await?;
        self.cache.put_all(&self.config.cache_name, &entries).await
    }

    /// Delete every store that is not the current version's.
    async fn purge_stale_stores(&self) -> Result<Vec<String>, Error> {
        let mut purged = Vec::new();
        for name in self.cache.store_names().await? {
            if name != self.config.cache_name && self.cache.delete_store(&name).await? {
                purged.push(name);
            }
        }
        Ok(purged)
    }
}

/// One deployed version of the offline cache manager.
///
/// Cloning yields another handle to the same version.
#[derive(Clone)]
pub struct OfflineCacheManager {
    inner: Arc<Inner>,
}

impl OfflineCacheManager {
    pub fn new(config: ManagerConfig, cache: CacheDb, network: Arc<dyn Network>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                cache,
                network,
                state: RwLock::new(WorkerState::Registering),
                skip_waiting: AtomicBool::new(false),
                claim_requested: AtomicBool::new(false),
            }),
        }
    }

    pub fn cache_name(&self) -> &str {
        &self.inner.config.cache_name
    }

    pub async fn state(&self) -> WorkerState {
        *self.inner.state.read().await
    }

    /// Ask to be activated without waiting for controlled pages to close.
    pub fn skip_waiting(&self) {
        self.inner.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.inner.skip_waiting.load(Ordering::SeqCst)
    }

    /// Set once activation finished; the host then hands every open page to this version.
    pub fn claim_requested(&self) -> bool {
        self.inner.claim_requested.load(Ordering::SeqCst)
    }

    async fn transition(&self, next: WorkerState) -> Result<(), Error> {
        let mut state = self.inner.state.write().await;
        if state.is_terminal() {
            return Err(Error::InvalidState(format!("{} is {} and cannot become {}", self.cache_name(), *state, next)));
        }
        if !state.can_transition_to(next) {
            return Err(Error::InvalidState(format!("{}: {} -> {}", self.cache_name(), *state, next)));
        }
        tracing::info!(cache = %self.cache_name(), from = %*state, to = %next, "worker state change");
        *state = next;
        Ok(())
    }

    /// Install handler: registers the precache step on the event.
    pub fn handle_install(&self, event: &mut ExtendableEvent) {
        let inner = Arc::clone(&self.inner);
        event.wait_until(async move {
            let written = inner.precache().await?;
            tracing::info!(cache = %inner.config.cache_name, entries = written, "precached essential resources");
            if inner.config.skip_waiting_on_install {
                inner.skip_waiting.store(true, Ordering::SeqCst);
            }
            Ok(())
        });
    }

    /// Activate handler: registers stale-store cleanup and the claim request.
    pub fn handle_activate(&self, event: &mut ExtendableEvent) {
        let inner = Arc::clone(&self.inner);
        event.wait_until(async move {
            for name in inner.purge_stale_stores().await? {
                tracing::info!(cache = %inner.config.cache_name, stale = %name, "deleted stale cache store");
            }
            inner.claim_requested.store(true, Ordering::SeqCst);
            Ok(())
        });
    }

    /// Message handler. Only the literal `"skipWaiting"` is acted on.
    pub fn handle_message(&self, data: &Value) -> Option<ClientCommand> {
        let command = ClientCommand::parse(data);
        match command {
            Some(ClientCommand::SkipWaiting) => self.skip_waiting(),
            None => tracing::debug!(cache = %self.cache_name(), "ignoring unrecognized message: {}", data),
        }
        command
    }

    /// Fetch handler.
    ///
    /// A cache write for a network response is registered on `event` and
    /// never fails it; a failed write is only logged.
    pub async fn handle_fetch(&self, event: &mut FetchEvent) -> Result<FetchOutcome, Error> {
        let request = event.request().clone();
        let config = &self.inner.config;

        if !is_same_origin(&request.url, &config.origin) {
            tracing::debug!("passing through cross-origin request {}", request.url);
            return Ok(FetchOutcome::Passthrough);
        }
        if !request.is_get() {
            tracing::debug!("passing through {} {}", request.method, request.url);
            return Ok(FetchOutcome::Passthrough);
        }

        if let Some(response) = self.inner.cache.match_request(&config.cache_name, "GET", &request.url).await? {
            tracing::debug!("cache hit for {}", request.url);
            return Ok(FetchOutcome::Respond { response, source: ResponseSource::Cache });
        }

        match self.inner.network.fetch(&request).await {
            Ok(response) => {
                if response.is_cacheable() {
                    let cache = self.inner.cache.clone();
                    let store = config.cache_name.clone();
                    let entry = CacheEntry::new("GET", request.url.clone(), response.clone());
                    event.wait_until(async move {
                        match cache.put_if_store_exists(&store, &entry).await {
                            Ok(true) => {}
                            Ok(false) => tracing::debug!("store {} is gone, not caching {}", store, entry.url),
                            Err(e) => tracing::warn!("failed to cache {}: {}", entry.url, e),
                        }
                        Ok(())
                    });
                }
                Ok(FetchOutcome::Respond { response, source: ResponseSource::Network })
            }
            Err(err) if request.is_navigation() => {
                tracing::debug!("navigation to {} failed ({}), serving offline page", request.url, err);
                match self.inner.cache.match_request(&config.cache_name, "GET", &config.offline_url).await? {
                    Some(page) => Ok(FetchOutcome::Respond { response: page, source: ResponseSource::Offline }),
                    None => Err(Error::OfflineUnavailable(format!(
                        "{} failed and {} is not cached",
                        request.url, config.offline_url
                    ))),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Run the install phase to completion.
    ///
    /// On failure the worker ends in `install-failed` and nothing is stored.
    pub async fn install(&self) -> Result<(), Error> {
        self.transition(WorkerState::Installing).await?;

        let mut event = ExtendableEvent::new(EventKind::Install);
        self.handle_install(&mut event);

        match event.settle().await {
            Ok(()) => self.transition(WorkerState::Installed).await,
            Err(err) => {
                tracing::warn!(cache = %self.cache_name(), "install failed: {}", err);
                self.transition(WorkerState::InstallFailed).await?;
                Err(err)
            }
        }
    }

    /// Run the activate phase to completion.
    pub async fn activate(&self) -> Result<(), Error> {
        self.transition(WorkerState::Activating).await?;

        let mut event = ExtendableEvent::new(EventKind::Activate);
        self.handle_activate(&mut event);

        match event.settle().await {
            Ok(()) => self.transition(WorkerState::Activated).await,
            Err(err) => {
                tracing::warn!(cache = %self.cache_name(), "activate failed: {}", err);
                self.transition(WorkerState::ActivateFailed).await?;
                Err(err)
            }
        }
    }

    /// Mark this version as replaced by a newer one.
    pub async fn make_redundant(&self) -> Result<(), Error> {
        self.transition(WorkerState::Redundant).await
    }
}
