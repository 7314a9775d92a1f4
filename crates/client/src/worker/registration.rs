//! Host-side registration: active and waiting versions plus open pages.
//!
//! The registration plays the part of the browser for one origin. It runs
//! install and activate, decides when a waiting version may take over,
//! tracks which version controls each open page, and routes page fetches to
//! the controlling version. Background cache writes spawned by fetch events
//! are kept in a `JoinSet` until they settle.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use shelter_core::{Error, Request, Response};
use tokio::task::JoinSet;

use super::event::{FetchEvent, FetchOutcome, ResponseSource};
use super::lifecycle::WorkerState;
use super::message::ClientCommand;
use super::OfflineCacheManager;
use crate::fetch::Network;

pub type ClientId = u64;

/// An open page and the version controlling it, if any.
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub controller: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerInfo {
    pub cache_name: String,
    pub state: WorkerState,
    pub skip_waiting: bool,
}

impl WorkerInfo {
    async fn of(manager: &OfflineCacheManager) -> Self {
        Self {
            cache_name: manager.cache_name().to_string(),
            state: manager.state().await,
            skip_waiting: manager.skip_waiting_requested(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub active: Option<WorkerInfo>,
    pub waiting: Option<WorkerInfo>,
    pub clients: Vec<ClientInfo>,
}

/// A response delivered to a page.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub response: Response,
    pub source: ResponseSource,
}

/// A routed page request, ready to run without the registration.
pub struct Dispatch {
    handler: Option<OfflineCacheManager>,
    network: Arc<dyn Network>,
    request: Request,
}

impl Dispatch {
    /// Run the request. The fetch event is returned when it still has
    /// background work; hand it to [`Registration::track`].
    pub async fn run(self) -> Result<(Fetched, Option<FetchEvent>), Error> {
        let (outcome, event) = match self.handler {
            Some(manager) => {
                let mut event = FetchEvent::new(self.request.clone());
                let outcome = manager.handle_fetch(&mut event).await?;
                (outcome, (event.pending() > 0).then_some(event))
            }
            None => (FetchOutcome::Passthrough, None),
        };

        let fetched = match outcome {
            FetchOutcome::Respond { response, source } => Fetched { response, source },
            FetchOutcome::Passthrough => {
                let response = self.network.fetch(&self.request).await?;
                Fetched { response, source: ResponseSource::Passthrough }
            }
        };
        Ok((fetched, event))
    }
}

pub struct Registration {
    network: Arc<dyn Network>,
    active: Option<OfflineCacheManager>,
    waiting: Option<OfflineCacheManager>,
    clients: Vec<ClientInfo>,
    next_client: ClientId,
    background: JoinSet<()>,
}

impl Registration {
    /// `network` serves requests no version intercepts.
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self { network, active: None, waiting: None, clients: Vec::new(), next_client: 1, background: JoinSet::new() }
    }

    pub fn active(&self) -> Option<&OfflineCacheManager> {
        self.active.as_ref()
    }

    pub fn waiting(&self) -> Option<&OfflineCacheManager> {
        self.waiting.as_ref()
    }

    pub fn clients(&self) -> &[ClientInfo] {
        &self.clients
    }

    /// Install a new version and promote it if nothing holds it back.
    ///
    /// A failed install leaves the registration exactly as it was.
    pub async fn register(&mut self, manager: OfflineCacheManager) -> Result<(), Error> {
        if let Err(err) = manager.install().await {
            tracing::warn!(cache = %manager.cache_name(), "install failed, keeping current version: {}", err);
            return Err(err);
        }

        if let Some(previous) = self.waiting.replace(manager) {
            previous.make_redundant().await?;
        }

        self.try_promote().await
    }

    fn active_in_use(&self) -> bool {
        self.active.as_ref().is_some_and(|active| {
            self.clients
                .iter()
                .any(|c| c.controller.as_deref() == Some(active.cache_name()))
        })
    }

    /// Promote the waiting version if there is no active one, no page is
    /// controlled by the active one, or the waiting one asked to skip waiting.
    async fn try_promote(&mut self) -> Result<(), Error> {
        let Some(waiting) = &self.waiting else {
            return Ok(());
        };

        if self.active_in_use() && !waiting.skip_waiting_requested() {
            tracing::debug!(cache = %waiting.cache_name(), "waiting for controlled pages to close");
            return Ok(());
        }

        self.promote().await
    }

    async fn promote(&mut self) -> Result<(), Error> {
        let Some(next) = self.waiting.take() else {
            return Ok(());
        };

        // pending writes target the outgoing store; let them land before it is purged
        self.settle_background().await;

        if let Err(err) = next.activate().await {
            tracing::warn!(cache = %next.cache_name(), "activation failed, previous version stays in control: {}", err);
            return Err(err);
        }

        if let Some(previous) = self.active.replace(next.clone()) {
            previous.make_redundant().await?;
        }

        if next.claim_requested() {
            for client in &mut self.clients {
                client.controller = Some(next.cache_name().to_string());
            }
        }

        tracing::info!(cache = %next.cache_name(), clients = self.clients.len(), "version now controlling");
        Ok(())
    }

    /// Deliver a message to the waiting version, or the active one if none waits.
    pub async fn post_message(&mut self, data: &Value) -> Result<Option<ClientCommand>, Error> {
        let Some(target) = self.waiting.as_ref().or(self.active.as_ref()) else {
            tracing::debug!("message with no registered version dropped");
            return Ok(None);
        };

        let command = target.handle_message(data);
        if command == Some(ClientCommand::SkipWaiting) {
            self.try_promote().await?;
        }
        Ok(command)
    }

    /// Open a page; it is controlled by the active version, if any.
    pub fn open_client(&mut self) -> ClientId {
        let id = self.next_client;
        self.next_client += 1;
        let controller = self.active.as_ref().map(|a| a.cache_name().to_string());
        self.clients.push(ClientInfo { id, controller });
        id
    }

    /// Close a page; the last page of the active version closing lets a
    /// waiting version take over.
    pub async fn close_client(&mut self, id: ClientId) -> Result<(), Error> {
        let before = self.clients.len();
        self.clients.retain(|c| c.id != id);
        if self.clients.len() == before {
            return Err(Error::InvalidInput(format!("unknown client: {id}")));
        }
        self.try_promote().await
    }

    /// Version that handles `request` issued by `client`.
    ///
    /// Navigations go to the active version. Other requests go to the
    /// client's controller; `None` stands for a page controlled by the
    /// active version.
    fn handler_for(&self, client: Option<ClientId>, request: &Request) -> Option<OfflineCacheManager> {
        let active = self.active.as_ref()?;
        if request.is_navigation() {
            return Some(active.clone());
        }

        match client {
            None => Some(active.clone()),
            Some(id) => self
                .clients
                .iter()
                .find(|c| c.id == id)
                .and_then(|c| c.controller.as_deref())
                .filter(|name| *name == active.cache_name())
                .map(|_| active.clone()),
        }
    }

    /// Pick the version that handles a page request.
    ///
    /// Only bookkeeping happens here: finished background writes are reaped
    /// and a navigating client is handed to the active version. The returned
    /// [`Dispatch`] does the I/O and needs no access to the registration, so
    /// a host can release its lock while the request is in flight.
    pub fn dispatch(&mut self, client: Option<ClientId>, request: Request) -> Dispatch {
        while self.background.try_join_next().is_some() {}

        let handler = self.handler_for(client, &request);

        if request.is_navigation()
            && let (Some(id), Some(manager)) = (client, &handler)
            && let Some(info) = self.clients.iter_mut().find(|c| c.id == id)
        {
            info.controller = Some(manager.cache_name().to_string());
        }

        Dispatch { handler, network: Arc::clone(&self.network), request }
    }

    /// Keep a fetch event alive until its registered work settles.
    pub fn track(&mut self, event: FetchEvent) {
        if event.pending() == 0 {
            return;
        }
        self.background.spawn(async move {
            if let Err(e) = event.settle().await {
                tracing::warn!("fetch event settled with error: {}", e);
            }
        });
    }

    /// Route a page request through the controlling version.
    pub async fn fetch(&mut self, client: Option<ClientId>, request: Request) -> Result<Fetched, Error> {
        let (fetched, event) = self.dispatch(client, request).run().await?;
        if let Some(event) = event {
            self.track(event);
        }
        Ok(fetched)
    }

    /// Wait for every background cache write to finish.
    pub async fn settle_background(&mut self) {
        while self.background.join_next().await.is_some() {}
    }

    pub async fn status(&self) -> RegistrationStatus {
        let active = match &self.active {
            Some(m) => Some(WorkerInfo::of(m).await),
            None => None,
        };
        let waiting = match &self.waiting {
            Some(m) => Some(WorkerInfo::of(m).await),
            None => None,
        };
        RegistrationStatus { active, waiting, clients: self.clients.clone() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryNetwork;
    use crate::worker::ManagerConfig;
    use shelter_core::CacheDb;
    use url::Url;

    fn origin() -> Url {
        Url::parse("https://docs.test").unwrap()
    }

    fn manager(name: &str, cache: &CacheDb, network: &Arc<MemoryNetwork>, skip: bool) -> OfflineCacheManager {
        let config = ManagerConfig::new(name, origin())
            .with_precache(&["/", "/offline.html"])
            .unwrap()
            .with_skip_waiting_on_install(skip);
        OfflineCacheManager::new(config, cache.clone(), network.clone())
    }

    async fn setup() -> (Registration, CacheDb, Arc<MemoryNetwork>) {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let network = Arc::new(MemoryNetwork::new(origin()));
        network.route("/", 200, "home").await.unwrap();
        network.route("/offline.html", 200, "offline").await.unwrap();
        (Registration::new(network.clone()), cache, network)
    }

    #[tokio::test]
    async fn test_first_registration_activates() {
        let (mut reg, cache, network) = setup().await;
        reg.register(manager("docs-v1", &cache, &network, false)).await.unwrap();

        let active = reg.active().unwrap();
        assert_eq!(active.state().await, WorkerState::Activated);
        assert!(reg.waiting().is_none());
    }

    #[tokio::test]
    async fn test_update_waits_while_pages_open() {
        let (mut reg, cache, network) = setup().await;
        reg.register(manager("docs-v1", &cache, &network, false)).await.unwrap();
        let page = reg.open_client();

        reg.register(manager("docs-v2", &cache, &network, false)).await.unwrap();

        assert_eq!(reg.active().unwrap().cache_name(), "docs-v1");
        assert_eq!(reg.waiting().unwrap().state().await, WorkerState::Installed);

        reg.close_client(page).await.unwrap();
        assert_eq!(reg.active().unwrap().cache_name(), "docs-v2");
        assert!(reg.waiting().is_none());
    }

    #[tokio::test]
    async fn test_skip_waiting_message_promotes() {
        let (mut reg, cache, network) = setup().await;
        reg.register(manager("docs-v1", &cache, &network, false)).await.unwrap();
        let page = reg.open_client();
        let v1 = reg.active().unwrap().clone();
        reg.register(manager("docs-v2", &cache, &network, false)).await.unwrap();

        let command = reg.post_message(&serde_json::json!("skipWaiting")).await.unwrap();

        assert_eq!(command, Some(ClientCommand::SkipWaiting));
        assert_eq!(reg.active().unwrap().cache_name(), "docs-v2");
        assert_eq!(v1.state().await, WorkerState::Redundant);
        assert_eq!(reg.clients()[0].id, page);
        assert_eq!(reg.clients()[0].controller.as_deref(), Some("docs-v2"));
        assert_eq!(cache.store_names().await.unwrap(), vec!["docs-v2"]);
    }

    #[tokio::test]
    async fn test_unknown_message_does_not_promote() {
        let (mut reg, cache, network) = setup().await;
        reg.register(manager("docs-v1", &cache, &network, false)).await.unwrap();
        reg.open_client();
        reg.register(manager("docs-v2", &cache, &network, false)).await.unwrap();

        let command = reg.post_message(&serde_json::json!({"action": "refresh"})).await.unwrap();

        assert_eq!(command, None);
        assert_eq!(reg.active().unwrap().cache_name(), "docs-v1");
    }

    #[tokio::test]
    async fn test_failed_update_keeps_active() {
        let (mut reg, cache, network) = setup().await;
        reg.register(manager("docs-v1", &cache, &network, true)).await.unwrap();
        network.unroute("/offline.html").await.unwrap();

        let result = reg.register(manager("docs-v2", &cache, &network, true)).await;

        assert!(matches!(result, Err(Error::PrecacheFailed { .. })));
        assert_eq!(reg.active().unwrap().cache_name(), "docs-v1");
        assert!(reg.waiting().is_none());
        assert_eq!(cache.store_names().await.unwrap(), vec!["docs-v1"]);
    }

    #[tokio::test]
    async fn test_close_unknown_client() {
        let (mut reg, _cache, _network) = setup().await;
        assert!(matches!(reg.close_client(42).await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_fetch_without_active_passes_through() {
        let (mut reg, _cache, network) = setup().await;
        let fetched = reg.fetch(None, Request::navigate(origin())).await.unwrap();

        assert_eq!(fetched.source, ResponseSource::Passthrough);
        assert_eq!(fetched.response.text(), "home");
        assert_eq!(network.request_count().await, 1);
    }

    #[tokio::test]
    async fn test_uncontrolled_client_subresource_passes_through() {
        let (mut reg, cache, network) = setup().await;
        let page = reg.open_client();
        reg.register(manager("docs-v1", &cache, &network, false)).await.unwrap();
        network.clear_requests().await;

        // as if the page was opened before any version claimed it
        reg.clients[0].controller = None;

        let fetched = reg.fetch(Some(page), Request::get(origin())).await.unwrap();
        assert_eq!(fetched.source, ResponseSource::Passthrough);

        let fetched = reg.fetch(Some(page), Request::navigate(origin())).await.unwrap();
        assert_eq!(fetched.source, ResponseSource::Cache);
        assert_eq!(reg.clients()[0].controller.as_deref(), Some("docs-v1"));
    }

    #[tokio::test]
    async fn test_dispatch_runs_without_registration() {
        let (mut reg, cache, network) = setup().await;
        reg.register(manager("docs-v1", &cache, &network, false)).await.unwrap();
        network.route("/faq", 200, "faq").await.unwrap();

        let dispatch = reg.dispatch(None, Request::get(origin().join("/faq").unwrap()));
        // the registration stays usable while the request is in flight
        let page = reg.open_client();
        let (fetched, event) = dispatch.run().await.unwrap();

        assert_eq!(fetched.source, ResponseSource::Network);
        assert_eq!(reg.clients()[0].id, page);

        reg.track(event.unwrap());
        reg.settle_background().await;
        assert_eq!(cache.entry_count("docs-v1").await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_promotion_settles_pending_writes_first() {
        let (mut reg, cache, network) = setup().await;
        reg.register(manager("docs-v1", &cache, &network, true)).await.unwrap();
        network.route("/faq", 200, "faq").await.unwrap();

        reg.fetch(None, Request::get(origin().join("/faq").unwrap())).await.unwrap();
        reg.register(manager("docs-v2", &cache, &network, true)).await.unwrap();
        reg.settle_background().await;

        assert_eq!(cache.store_names().await.unwrap(), vec!["docs-v2"]);
    }

    #[tokio::test]
    async fn test_status() {
        let (mut reg, cache, network) = setup().await;
        reg.register(manager("docs-v1", &cache, &network, false)).await.unwrap();
        reg.open_client();

        let status = reg.status().await;
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["active"]["cache_name"], "docs-v1");
        assert_eq!(json["active"]["state"], "activated");
        assert!(json["waiting"].is_null());
        assert_eq!(json["clients"][0]["controller"], "docs-v1");
    }
}
