//! Search federation over catalogs that declare the `search` extra.

use tokio_util::sync::CancellationToken;

use super::Aggregator;
use crate::addon::{CatalogPair, CatalogResponse, ExtraValue, SearchResult, EXTRA_SEARCH};

impl Aggregator {
    /// One result bucket per searchable catalog that returned items.
    ///
    /// Catalogs without a `search` extra are never asked. Buckets keep type
    /// order, then catalog order; they are not merged across addons.
    pub async fn search(
        &self,
        query: &str,
        media_types: &[String],
        cancel: &CancellationToken,
    ) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let index = self.index();
        let pairs: Vec<CatalogPair> =
            media_types.iter().flat_map(|t| index.searchable_catalog_pairs(t)).collect();

        tracing::debug!(query, catalogs = pairs.len(), "Searching");

        let outcomes = self
            .dispatcher
            .dispatch::<_, CatalogResponse, _>(
                pairs,
                |(addon, catalog)| {
                    let extra = vec![ExtraValue::new(EXTRA_SEARCH, query)];
                    self.catalog_request(catalog, extra).map(|r| r.url(&addon.transport_url))
                },
                cancel,
            )
            .await;

        if cancel.is_cancelled() {
            return Vec::new();
        }

        outcomes
            .into_iter()
            .filter_map(|((addon, _), outcome)| {
                let page = outcome.non_empty(|page| page.metas.is_empty()).present()?;
                Some(SearchResult { query: query.to_string(), items: page.metas, addon })
            })
            .collect()
    }
}
