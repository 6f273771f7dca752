//! Addon lifecycle: install, uninstall, sync and defaults.

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Mutex;

use super::{AccountStore, AuthState};
use crate::addon::{
    manifest_url, normalize_base_url, Addon, AddonError, AddonFlags, AddonResult, Manifest,
};
use crate::core::{
    retry_async, AddonStore, DefaultAddon, EngineConfig, RetryConfig, Transport, TransportError,
};

/// Result of an install request.
#[derive(Debug, Clone, PartialEq)]
pub enum InstallOutcome {
    /// The addon was added to the installed set.
    Installed(Addon),
    /// An addon with this id was already installed; nothing changed.
    AlreadyInstalled(String),
}

impl InstallOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, Self::Installed(_))
    }
}

/// Owns every change to the installed set.
///
/// Mutations are serialized through one async lock so pushes to the account
/// store go out in the same order the local set changed.
pub struct AddonManager {
    store: Arc<AddonStore>,
    transport: Arc<dyn Transport>,
    config: Arc<EngineConfig>,
    account: Option<Arc<dyn AccountStore>>,
    auth: Arc<AuthState>,
    retry: RetryConfig,
    write_lock: Mutex<()>,
}

impl AddonManager {
    pub fn new(
        store: Arc<AddonStore>,
        transport: Arc<dyn Transport>,
        config: Arc<EngineConfig>,
    ) -> Self {
        let retry = RetryConfig::network(config.network.retry_attempts);
        Self {
            store,
            transport,
            config,
            account: None,
            auth: Arc::new(AuthState::new()),
            retry,
            write_lock: Mutex::new(()),
        }
    }

    /// Attach the remote account store and the auth state it is keyed by.
    #[must_use]
    pub fn with_account(mut self, account: Arc<dyn AccountStore>, auth: Arc<AuthState>) -> Self {
        self.account = Some(account);
        self.auth = auth;
        self
    }

    /// Override the retry policy for manifest and account fetches.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn auth(&self) -> &AuthState {
        &self.auth
    }

    /// Installed addons, in installation order.
    pub fn installed(&self) -> Arc<Vec<Addon>> {
        self.store.snapshot()
    }

    pub fn get_addon(&self, id: &str) -> Option<Addon> {
        self.store.snapshot().iter().find(|a| a.id() == id).cloned()
    }

    /// Startup sequence: load the persisted set, sync when logged in, and
    /// fall back to the default addons if the set is still empty.
    ///
    /// Returns the size of the resulting set. Load and sync failures are
    /// logged; only a failure to get any default addon is returned.
    pub async fn initialize(&self) -> AddonResult<usize> {
        if let Err(e) = self.store.load() {
            tracing::warn!(error = %e, "Failed to load installed addons");
        }

        if self.auth.is_logged_in() {
            if let Err(e) = self.sync_from_server().await {
                tracing::warn!(error = %e, "Addon sync failed, keeping local set");
            }
        }

        if self.store.snapshot().is_empty() {
            self.install_defaults().await?;
        }

        let count = self.store.snapshot().len();
        tracing::info!(count, "Addon manager ready");
        Ok(count)
    }

    /// Fetch and validate the manifest behind `url` without installing it.
    pub async fn fetch_addon(&self, url: &str) -> AddonResult<Addon> {
        let transport_url = normalize_base_url(url);
        let manifest_url = manifest_url(url);

        let transport = &self.transport;
        let target = manifest_url.as_str();
        let body = retry_async(&self.retry, TransportError::is_transient, move || {
            transport.get(target)
        })
        .await
        .map_err(|e| AddonError::fetch(&manifest_url, &e))?;

        let manifest = Manifest::from_json(&body).map_err(|e| AddonError::Fetch {
            url: manifest_url.clone(),
            reason: e.to_string(),
        })?;

        let flags = AddonFlags { official: self.is_official(&manifest.id), protected: false };
        Ok(Addon { manifest, transport_url, flags })
    }

    /// Install the addon published at `url`.
    ///
    /// A fetch failure leaves the installed set untouched. Installing an id
    /// that is already present is not an error.
    pub async fn install(&self, url: &str) -> AddonResult<InstallOutcome> {
        let addon = self.fetch_addon(url).await?;
        let id = addon.id().to_string();

        let _guard = self.write_lock.lock().await;
        let changed = self.store.update(|current| {
            if current.iter().any(|a| a.id() == id) {
                return None;
            }
            let mut next = current.to_vec();
            next.push(addon.clone());
            Some((next, ()))
        });

        match changed {
            Some((snapshot, ())) => {
                tracing::info!(addon = %id, url = %addon.transport_url, "Installed addon");
                self.push(&snapshot).await;
                Ok(InstallOutcome::Installed(addon))
            }
            None => {
                tracing::info!(addon = %id, "Addon already installed");
                Ok(InstallOutcome::AlreadyInstalled(id))
            }
        }
    }

    /// Remove an installed addon. Official and protected addons are refused.
    pub async fn uninstall(&self, id: &str) -> AddonResult<()> {
        let _guard = self.write_lock.lock().await;

        let mut refusal = None;
        let changed = self.store.update(|current| {
            let Some(addon) = current.iter().find(|a| a.id() == id) else {
                refusal = Some(AddonError::NotInstalled(id.to_string()));
                return None;
            };
            if addon.flags.is_locked() {
                refusal = Some(AddonError::Protected(id.to_string()));
                return None;
            }
            Some((current.iter().filter(|a| a.id() != id).cloned().collect(), ()))
        });

        match (changed, refusal) {
            (Some((snapshot, ())), _) => {
                tracing::info!(addon = %id, "Uninstalled addon");
                self.push(&snapshot).await;
                Ok(())
            }
            (None, Some(err)) => Err(err),
            (None, None) => Err(AddonError::NotInstalled(id.to_string())),
        }
    }

    /// Replace the installed set with the account's collection.
    ///
    /// The server is authoritative: nothing is merged. An empty collection
    /// installs the default addons instead. On failure the local set is left
    /// as it was.
    pub async fn sync_from_server(&self) -> AddonResult<Arc<Vec<Addon>>> {
        let auth_key = self.auth.auth_key().ok_or(AddonError::NotLoggedIn)?;
        let account = self.account.as_ref().ok_or(AddonError::NotLoggedIn)?;

        let key = auth_key.as_str();
        let remote = retry_async(
            &self.retry,
            |e: &AddonError| matches!(e, AddonError::Timeout(_) | AddonError::Fetch { .. }),
            move || account.get_addon_collection(key),
        )
        .await?;

        let _guard = self.write_lock.lock().await;

        if remote.is_empty() {
            tracing::info!("Account has no addons, installing defaults");
            return self.install_defaults_locked().await;
        }

        let mut addons: Vec<Addon> = Vec::with_capacity(remote.len());
        for mut addon in remote {
            if addons.iter().any(|a| a.id() == addon.id()) {
                continue;
            }
            addon.transport_url = normalize_base_url(&addon.transport_url);
            addon.flags.official |= self.is_official(addon.id());
            addons.push(addon);
        }

        tracing::info!(count = addons.len(), "Synced addons from account");
        Ok(self.store.replace(addons))
    }

    /// Replace the installed set with the configured default addons.
    pub async fn install_defaults(&self) -> AddonResult<Arc<Vec<Addon>>> {
        let _guard = self.write_lock.lock().await;
        self.install_defaults_locked().await
    }

    async fn install_defaults_locked(&self) -> AddonResult<Arc<Vec<Addon>>> {
        let defaults = &self.config.default_addons;
        let fetched = join_all(defaults.iter().map(|d| self.fetch_default(d))).await;

        let mut addons = Vec::with_capacity(defaults.len());
        let mut last_error = None;
        for result in fetched {
            match result {
                Ok(addon) => addons.push(addon),
                Err(e) => last_error = Some(e),
            }
        }

        if addons.is_empty() {
            if let Some(err) = last_error {
                return Err(err);
            }
        }

        tracing::info!(count = addons.len(), "Installed default addons");
        let snapshot = self.store.replace(addons);
        self.push(&snapshot).await;
        Ok(snapshot)
    }

    async fn fetch_default(&self, default: &DefaultAddon) -> AddonResult<Addon> {
        let mut addon = self.fetch_addon(&default.url).await.inspect_err(|e| {
            tracing::warn!(addon = %default.id, error = %e, "Failed to fetch default addon");
        })?;
        addon.flags.official = true;
        Ok(addon)
    }

    /// Push the collection to the account store when logged in.
    async fn push(&self, addons: &[Addon]) {
        let (Some(account), Some(auth_key)) = (self.account.as_ref(), self.auth.auth_key()) else {
            return;
        };

        if let Err(e) = account.set_addon_collection(&auth_key, addons).await {
            tracing::warn!(error = %e, "Failed to push addons to account");
        }
    }

    fn is_official(&self, id: &str) -> bool {
        self.config.default_addons.iter().any(|d| d.id == id)
    }
}

impl std::fmt::Debug for AddonManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddonManager")
            .field("store", &self.store)
            .field("logged_in", &self.auth.is_logged_in())
            .finish_non_exhaustive()
    }
}
