//! Capability queries over a snapshot of installed addons.

use std::sync::Arc;

use super::{Addon, CatalogDecl};

/// An addon paired with one of its catalogs.
pub type CatalogPair = (Addon, CatalogDecl);

/// Answers "which addons or catalogs support X" for one installed-set
/// snapshot.
///
/// Building an index is a pointer copy; every query is a linear scan in
/// installation order, so results are deterministic for a given snapshot.
#[derive(Debug, Clone, Default)]
pub struct CapabilityIndex {
    addons: Arc<Vec<Addon>>,
}

impl CapabilityIndex {
    pub fn new(addons: Arc<Vec<Addon>>) -> Self {
        Self { addons }
    }

    /// All addons in the snapshot, in installation order.
    pub fn addons(&self) -> &[Addon] {
        &self.addons
    }

    pub fn len(&self) -> usize {
        self.addons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addons.is_empty()
    }

    /// Look up an addon by manifest id.
    pub fn get(&self, id: &str) -> Option<&Addon> {
        self.addons.iter().find(|a| a.id() == id)
    }

    /// Addons whose manifest supports `resource` for this type and id.
    pub fn addons_supporting(&self, resource: &str, media_type: &str, id: &str) -> Vec<Addon> {
        self.addons.iter().filter(|a| a.manifest.supports(resource, media_type, id)).cloned().collect()
    }

    /// Addons declaring at least one catalog of this type.
    pub fn addons_with_catalog(&self, media_type: &str) -> Vec<Addon> {
        self.addons.iter().filter(|a| a.manifest.has_catalog_of_type(media_type)).cloned().collect()
    }

    /// Every `(addon, catalog)` pair, addon order then catalog order.
    pub fn all_catalog_pairs(&self) -> Vec<CatalogPair> {
        self.pairs_where(|_| true)
    }

    /// Catalog pairs of one media type.
    pub fn catalog_pairs_for_type(&self, media_type: &str) -> Vec<CatalogPair> {
        self.pairs_where(|c| c.media_type == media_type)
    }

    /// Catalog pairs of one media type whose catalog declares `search`.
    pub fn searchable_catalog_pairs(&self, media_type: &str) -> Vec<CatalogPair> {
        self.pairs_where(|c| c.media_type == media_type && c.is_searchable())
    }

    fn pairs_where<F>(&self, keep: F) -> Vec<CatalogPair>
    where
        F: Fn(&CatalogDecl) -> bool,
    {
        self.addons
            .iter()
            .flat_map(|addon| {
                addon
                    .manifest
                    .catalogs
                    .iter()
                    .filter(|c| keep(c))
                    .map(move |c| (addon.clone(), c.clone()))
            })
            .collect()
    }
}
