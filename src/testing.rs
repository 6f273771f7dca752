//! In-memory collaborators for tests.
//!
//! `MockTransport` answers from a route table keyed by exact URL, with
//! optional per-route delays, and records every URL it was asked for.
//! `MockAccountStore` keeps one collection and records pushes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::addon::{Addon, AddonError, AddonFlags, AddonResult, Manifest};
use crate::core::{Transport, TransportError, TransportResult};

#[derive(Debug, Clone)]
enum Reply {
    Body(Vec<u8>),
    Error(TransportError),
}

#[derive(Debug, Clone)]
struct Route {
    reply: Reply,
    delay: Option<Duration>,
}

#[derive(Debug, Default)]
struct MockTransportInner {
    routes: Mutex<HashMap<String, Route>>,
    requests: Mutex<Vec<String>>,
}

/// Transport answering from a fixed route table.
///
/// Unknown URLs answer with HTTP 404. Clones share routes and history.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<MockTransportInner>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn respond(self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        self.route(url, Reply::Body(body.into()), None);
        self
    }

    #[must_use]
    pub fn respond_json(self, url: impl Into<String>, body: &serde_json::Value) -> Self {
        self.respond(url, body.to_string())
    }

    #[must_use]
    pub fn respond_after(
        self,
        url: impl Into<String>,
        body: impl Into<Vec<u8>>,
        delay: Duration,
    ) -> Self {
        self.route(url, Reply::Body(body.into()), Some(delay));
        self
    }

    #[must_use]
    pub fn fail(self, url: impl Into<String>, err: TransportError) -> Self {
        self.route(url, Reply::Error(err), None);
        self
    }

    /// Replace or add a JSON route on a shared transport.
    pub fn set_json(&self, url: impl Into<String>, body: &serde_json::Value) {
        self.route(url, Reply::Body(body.to_string().into_bytes()), None);
    }

    /// Replace or add a failing route on a shared transport.
    pub fn set_error(&self, url: impl Into<String>, err: TransportError) {
        self.route(url, Reply::Error(err), None);
    }

    /// Every URL requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.inner.requests.lock().clone()
    }

    /// Number of requests whose URL starts with `prefix`.
    pub fn request_count(&self, prefix: &str) -> usize {
        self.inner.requests.lock().iter().filter(|u| u.starts_with(prefix)).count()
    }

    fn route(&self, url: impl Into<String>, reply: Reply, delay: Option<Duration>) {
        self.inner.routes.lock().insert(url.into(), Route { reply, delay });
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str) -> TransportResult<Vec<u8>> {
        self.inner.requests.lock().push(url.to_string());
        let route = self.inner.routes.lock().get(url).cloned();

        let Some(route) = route else {
            return Err(TransportError::Status { url: url.to_string(), status: 404 });
        };

        if let Some(delay) = route.delay {
            tokio::time::sleep(delay).await;
        }

        match route.reply {
            Reply::Body(body) => Ok(body),
            Reply::Error(err) => Err(err),
        }
    }
}

#[derive(Debug, Default)]
struct MockAccountInner {
    collection: Mutex<Vec<Addon>>,
    pushes: Mutex<Vec<Vec<Addon>>>,
    failing: Mutex<bool>,
}

/// Account store holding one collection in memory.
#[derive(Debug, Clone, Default)]
pub struct MockAccountStore {
    inner: Arc<MockAccountInner>,
}

impl MockAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collection(addons: Vec<Addon>) -> Self {
        let store = Self::default();
        *store.inner.collection.lock() = addons;
        store
    }

    /// Make every call fail with an account error.
    pub fn set_failing(&self, failing: bool) {
        *self.inner.failing.lock() = failing;
    }

    /// Collections pushed so far.
    pub fn pushes(&self) -> Vec<Vec<Addon>> {
        self.inner.pushes.lock().clone()
    }

    fn check(&self) -> AddonResult<()> {
        if *self.inner.failing.lock() {
            return Err(AddonError::Account("account service unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl crate::lifecycle::AccountStore for MockAccountStore {
    async fn get_addon_collection(&self, _auth_key: &str) -> AddonResult<Vec<Addon>> {
        self.check()?;
        Ok(self.inner.collection.lock().clone())
    }

    async fn set_addon_collection(&self, _auth_key: &str, addons: &[Addon]) -> AddonResult<()> {
        self.check()?;
        *self.inner.collection.lock() = addons.to_vec();
        self.inner.pushes.lock().push(addons.to_vec());
        Ok(())
    }
}

/// Transport URL used for test addons: `https://<id>.test`.
pub fn test_transport_url(id: &str) -> String {
    format!("https://{id}.test")
}

/// Build an installed addon from manifest JSON.
///
/// # Panics
///
/// Panics when `manifest` is not a valid manifest.
pub fn addon_from_json(manifest: serde_json::Value) -> Addon {
    let manifest: Manifest = match serde_json::from_value(manifest) {
        Ok(m) => m,
        Err(e) => panic!("invalid test manifest: {e}"),
    };
    Addon {
        transport_url: test_transport_url(&manifest.id),
        manifest,
        flags: AddonFlags::default(),
    }
}

/// Manifest JSON for an addon with the given catalogs.
pub fn catalog_manifest(id: &str, catalogs: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "version": "1.0.0",
        "name": id.to_uppercase(),
        "types": ["movie", "series"],
        "resources": ["catalog"],
        "catalogs": catalogs,
    })
}

/// Manifest JSON for an addon serving one resource for movies and series.
pub fn resource_manifest(id: &str, resource: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "version": "1.0.0",
        "name": id.to_uppercase(),
        "types": ["movie", "series"],
        "resources": [resource],
    })
}
