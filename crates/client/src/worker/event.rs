//! Lifecycle and fetch events delivered to the manager.
//!
//! An event is not finished when its handler returns: handlers register
//! futures through [`ExtendableEvent::wait_until`], and the host must await
//! [`ExtendableEvent::settle`] before it treats the event as done.

use std::future::Future;

use futures_util::future::{BoxFuture, try_join_all};
use serde::{Deserialize, Serialize};
use shelter_core::{Error, Request, Response};

/// Future registered to extend an event's lifetime.
pub type EventFuture = BoxFuture<'static, Result<(), Error>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Install,
    Activate,
    Fetch,
    Message,
}

/// An event whose completion can be extended by its handler.
pub struct ExtendableEvent {
    kind: EventKind,
    pending: Vec<EventFuture>,
}

impl ExtendableEvent {
    pub fn new(kind: EventKind) -> Self {
        Self { kind, pending: Vec::new() }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Keep the event alive until `fut` completes. A failing future fails the event.
    pub fn wait_until<F>(&mut self, fut: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.pending.push(Box::pin(fut));
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Await every registered future; the first error wins.
    pub async fn settle(self) -> Result<(), Error> {
        try_join_all(self.pending).await.map(|_| ())
    }
}

/// Where a response handed back to the page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
    /// Precached offline page substituted for a failed navigation.
    Offline,
    /// Not intercepted; fetched directly by the host.
    Passthrough,
}

impl ResponseSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Cache => "cache",
            ResponseSource::Network => "network",
            ResponseSource::Offline => "offline",
            ResponseSource::Passthrough => "passthrough",
        }
    }
}

/// Result of intercepting a fetch.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// Not intercepted; the host performs the request unmodified.
    Passthrough,
    Respond { response: Response, source: ResponseSource },
}

/// A fetch issued by a controlled page.
pub struct FetchEvent {
    request: Request,
    inner: ExtendableEvent,
}

impl FetchEvent {
    pub fn new(request: Request) -> Self {
        Self { request, inner: ExtendableEvent::new(EventKind::Fetch) }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn wait_until<F>(&mut self, fut: F)
    where
        F: Future<Output = Result<(), Error>> + Send + 'static,
    {
        self.inner.wait_until(fut);
    }

    pub fn pending(&self) -> usize {
        self.inner.pending()
    }

    pub async fn settle(self) -> Result<(), Error> {
        self.inner.settle().await
    }
}
