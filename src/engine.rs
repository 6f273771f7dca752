//! Engine facade.
//!
//! Wires the store, dispatcher, aggregators and lifecycle manager together
//! and exposes the calls a UI or the CLI needs. Every aggregation call is
//! one cancellable unit: dropping the returned future cancels the addon
//! requests it started.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::addon::{
    Addon, AddonError, AddonResult, CatalogDecl, CatalogResponse, DiscoverRow, ExtraValue,
    MetaItem, SearchResult, Stream, Subtitles,
};
use crate::aggregate::{Aggregator, SearchSession};
use crate::core::{
    AddonStorage, AddonStore, Dispatcher, EngineConfig, HttpTransport, JsonFileStorage, Transport,
};
use crate::lifecycle::{AccountStore, AddonManager, AuthState, InstallOutcome};

/// The addon resolution and aggregation engine.
#[derive(Debug)]
pub struct Engine {
    config: Arc<EngineConfig>,
    store: Arc<AddonStore>,
    aggregator: Aggregator,
    manager: AddonManager,
}

impl Engine {
    /// Build an engine over explicit collaborators.
    pub fn new(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        storage: Arc<dyn AddonStorage>,
    ) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(AddonStore::new(storage));
        let dispatcher = Dispatcher::new(Arc::clone(&transport));
        let aggregator = Aggregator::new(Arc::clone(&store), dispatcher, Arc::clone(&config));
        let manager = AddonManager::new(Arc::clone(&store), transport, Arc::clone(&config));

        Self { config, store, aggregator, manager }
    }

    /// Build an engine with the HTTP transport and file storage from `config`.
    pub fn from_config(config: EngineConfig) -> AddonResult<Self> {
        let transport = HttpTransport::new(config.network.timeout(), &config.network.user_agent)
            .map_err(|e| AddonError::Config(e.to_string()))?;
        let dir = config.storage_dir().ok_or_else(|| {
            AddonError::Config("Could not determine data directory".to_string())
        })?;
        let storage = JsonFileStorage::new(dir, config.storage.namespace.clone());

        Ok(Self::new(config, Arc::new(transport), Arc::new(storage)))
    }

    /// Attach the remote account store.
    #[must_use]
    pub fn with_account(mut self, account: Arc<dyn AccountStore>, auth: Arc<AuthState>) -> Self {
        self.manager = self.manager.with_account(account, auth);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn manager(&self) -> &AddonManager {
        &self.manager
    }

    pub fn auth(&self) -> &AuthState {
        self.manager.auth()
    }

    /// Load persisted addons, sync when logged in, install defaults if empty.
    pub async fn initialize(&self) -> AddonResult<usize> {
        self.manager.initialize().await
    }

    /// Load the persisted set only, without touching the network.
    pub fn load(&self) -> AddonResult<usize> {
        self.store.load()
    }

    pub async fn install_addon(&self, url: &str) -> AddonResult<InstallOutcome> {
        self.manager.install(url).await
    }

    pub async fn uninstall_addon(&self, id: &str) -> AddonResult<()> {
        self.manager.uninstall(id).await
    }

    pub fn installed_addons(&self) -> Arc<Vec<Addon>> {
        self.store.snapshot()
    }

    pub fn get_addon(&self, id: &str) -> Option<Addon> {
        self.manager.get_addon(id)
    }

    /// Whether the last write of the installed set failed.
    pub fn is_persist_pending(&self) -> bool {
        self.store.is_persist_pending()
    }

    pub async fn sync_addons_from_server(&self) -> AddonResult<Arc<Vec<Addon>>> {
        self.manager.sync_from_server().await
    }

    /// One catalog page. `None` when the addon gave no usable answer.
    pub async fn get_catalog(
        &self,
        addon: &Addon,
        catalog: &CatalogDecl,
        extra: Vec<ExtraValue>,
        skip: u32,
    ) -> Option<CatalogResponse> {
        let cancel = CancellationToken::new();
        self.aggregator.get_catalog(addon, catalog, extra, skip, &cancel).await
    }

    /// Look up an installed addon and one of its catalogs.
    pub fn find_catalog(
        &self,
        addon_id: &str,
        media_type: &str,
        catalog_id: &str,
    ) -> AddonResult<(Addon, CatalogDecl)> {
        let addon =
            self.get_addon(addon_id).ok_or_else(|| AddonError::NotInstalled(addon_id.to_string()))?;
        let catalog = addon.manifest.catalog(media_type, catalog_id).cloned().ok_or_else(|| {
            AddonError::UnknownCatalog {
                addon: addon_id.to_string(),
                media_type: media_type.to_string(),
                catalog: catalog_id.to_string(),
            }
        })?;
        Ok((addon, catalog))
    }

    pub async fn get_streams(
        &self,
        media_type: &str,
        id: &str,
        video_id: Option<&str>,
    ) -> Vec<(Addon, Stream)> {
        let cancel = CancellationToken::new();
        self.aggregator.get_streams(media_type, id, video_id, &cancel).await
    }

    pub async fn get_subtitles(
        &self,
        media_type: &str,
        id: &str,
        extra: Vec<ExtraValue>,
    ) -> Vec<(Addon, Subtitles)> {
        let cancel = CancellationToken::new();
        self.aggregator.get_subtitles(media_type, id, extra, &cancel).await
    }

    pub async fn get_meta(&self, media_type: &str, id: &str) -> Option<(Addon, MetaItem)> {
        let cancel = CancellationToken::new();
        self.aggregator.get_meta(media_type, id, &cancel).await
    }

    /// Federated search. Empty `media_types` searches the configured types.
    pub async fn search(&self, query: &str, media_types: &[String]) -> Vec<SearchResult> {
        let cancel = CancellationToken::new();
        let media_types =
            if media_types.is_empty() { &self.config.search.types[..] } else { media_types };
        self.aggregator.search(query, media_types, &cancel).await
    }

    /// Discovery rows for one media type.
    pub async fn discover(&self, media_type: &str) -> Vec<DiscoverRow> {
        let cancel = CancellationToken::new();
        self.aggregator.discover(media_type, &cancel).await
    }

    /// Discovery rows for the configured media types.
    pub async fn discover_all(&self) -> Vec<DiscoverRow> {
        let cancel = CancellationToken::new();
        self.aggregator.discover_all(&self.config.discovery.types, &cancel).await
    }

    /// A new search-as-you-type session.
    pub fn search_session(&self) -> SearchSession {
        SearchSession::new(self.aggregator.clone())
    }
}
