//! Fan-out policies over the dispatcher.
//!
//! Each aggregator takes one capability snapshot, picks its candidates,
//! dispatches, and shapes the outcomes. None of them ever fails: an addon
//! that errors simply contributes nothing.

mod discovery;
mod meta;
mod search;
mod session;
mod streams;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::addon::{
    Addon, CapabilityIndex, CatalogDecl, CatalogResponse, ExtraValue, ResourceRequest,
    RESOURCE_CATALOG,
};
use crate::core::{AbsentReason, AddonStore, Dispatcher, EngineConfig, RequiredExtraPolicy};

pub use discovery::type_label;
pub use session::SearchSession;

/// Runs aggregation calls against the installed set.
#[derive(Debug, Clone)]
pub struct Aggregator {
    store: Arc<AddonStore>,
    dispatcher: Dispatcher,
    config: Arc<EngineConfig>,
}

impl Aggregator {
    pub fn new(store: Arc<AddonStore>, dispatcher: Dispatcher, config: Arc<EngineConfig>) -> Self {
        Self { store, dispatcher, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Capability index over the current snapshot.
    pub fn index(&self) -> CapabilityIndex {
        self.store.index()
    }

    /// Fetch one catalog page from one addon.
    ///
    /// Returns `None` when the addon fails, the body is malformed or a
    /// required extra is missing under the enforce policy. An empty page is
    /// still `Some`.
    pub async fn get_catalog(
        &self,
        addon: &Addon,
        catalog: &CatalogDecl,
        extra: Vec<ExtraValue>,
        skip: u32,
        cancel: &CancellationToken,
    ) -> Option<CatalogResponse> {
        let request = match self.catalog_request(catalog, extra) {
            Ok(request) => request.with_skip(skip),
            Err(reason) => {
                tracing::debug!(addon = %addon.id(), catalog = %catalog.id, %reason, "Catalog skipped");
                return None;
            }
        };

        let url = request.url(&addon.transport_url);
        let mut outcomes = self
            .dispatcher
            .dispatch::<_, CatalogResponse, _>(vec![()], |_| Ok(url.clone()), cancel)
            .await;

        outcomes.pop().and_then(|(_, outcome)| outcome.present())
    }

    /// Build a catalog request, applying the required-extra policy.
    pub(crate) fn catalog_request(
        &self,
        catalog: &CatalogDecl,
        extra: Vec<ExtraValue>,
    ) -> Result<ResourceRequest, AbsentReason> {
        let extra = match self.config.catalogs.required_extras {
            RequiredExtraPolicy::Tolerate => extra,
            RequiredExtraPolicy::Enforce => with_required_defaults(catalog, extra)?,
        };

        Ok(ResourceRequest::new(RESOURCE_CATALOG, &catalog.media_type, &catalog.id)
            .with_extra(extra))
    }
}

/// Fill missing required extras from their first option, then fail if any
/// required extra is still unset.
fn with_required_defaults(
    catalog: &CatalogDecl,
    mut extra: Vec<ExtraValue>,
) -> Result<Vec<ExtraValue>, AbsentReason> {
    for default in catalog.default_extra() {
        if !extra.iter().any(|e| e.name == default.name) {
            extra.push(default);
        }
    }

    let missing = catalog.missing_required(&extra);
    if missing.is_empty() {
        Ok(extra)
    } else {
        Err(AbsentReason::Unsupported(format!("missing required extra: {}", missing.join(", "))))
    }
}
