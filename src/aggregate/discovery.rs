//! Discovery rows: the first few catalogs of each media type.

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use super::Aggregator;
use crate::addon::{Addon, CatalogDecl, CatalogPair, CatalogResponse, DiscoverRow};

/// Human label for a media type, used in fallback row titles.
pub fn type_label(media_type: &str) -> String {
    match media_type {
        "movie" => "Movies".to_string(),
        "series" => "Series".to_string(),
        "channel" => "Channels".to_string(),
        "tv" => "TV".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

fn row_title(addon: &Addon, catalog: &CatalogDecl) -> String {
    catalog
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} - {}", addon.name(), type_label(&catalog.media_type)))
}

fn deep_link(scheme: &str, addon: &Addon, catalog: &CatalogDecl) -> String {
    format!("{scheme}:///discover/{}/{}/{}", addon.id(), catalog.media_type, catalog.id)
}

impl Aggregator {
    /// Rows for one media type.
    ///
    /// Only the first `catalogs_per_type` catalogs are queried. Rows keep
    /// catalog enumeration order and empty catalogs produce no row.
    pub async fn discover(&self, media_type: &str, cancel: &CancellationToken) -> Vec<DiscoverRow> {
        let discovery = &self.config.discovery;
        let pairs: Vec<CatalogPair> = self
            .index()
            .catalog_pairs_for_type(media_type)
            .into_iter()
            .take(discovery.catalogs_per_type)
            .collect();

        if pairs.is_empty() {
            tracing::debug!(media_type, "No catalogs to discover");
            return Vec::new();
        }

        let outcomes = self
            .dispatcher
            .dispatch::<_, CatalogResponse, _>(
                pairs,
                |(addon, catalog)| {
                    self.catalog_request(catalog, Vec::new()).map(|r| r.url(&addon.transport_url))
                },
                cancel,
            )
            .await;

        outcomes
            .into_iter()
            .filter_map(|((addon, catalog), outcome)| {
                let mut page = outcome.non_empty(|page| page.metas.is_empty()).present()?;
                if discovery.max_items_per_row > 0 {
                    page.metas.truncate(discovery.max_items_per_row);
                }

                Some(DiscoverRow {
                    title: row_title(&addon, &catalog),
                    deep_link: deep_link(&discovery.deep_link_scheme, &addon, &catalog),
                    items: page.metas,
                    addon,
                    catalog,
                })
            })
            .collect()
    }

    /// Rows for several media types, concatenated in type order.
    pub async fn discover_all(
        &self,
        media_types: &[String],
        cancel: &CancellationToken,
    ) -> Vec<DiscoverRow> {
        let per_type = join_all(media_types.iter().map(|t| self.discover(t, cancel))).await;
        per_type.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::{AddonStore, Dispatcher, EngineConfig, TransportError};
    use crate::testing::{addon_from_json, catalog_manifest, MockTransport};

    fn metas(ids: &[&str]) -> serde_json::Value {
        let items: Vec<_> = ids
            .iter()
            .map(|id| serde_json::json!({"id": id, "type": "movie", "name": id}))
            .collect();
        serde_json::json!({ "metas": items })
    }

    fn aggregator(addons: Vec<Addon>, transport: MockTransport, config: EngineConfig) -> Aggregator {
        let store = AddonStore::in_memory();
        store.replace(addons);
        Aggregator::new(Arc::new(store), Dispatcher::new(Arc::new(transport)), Arc::new(config))
    }

    #[test]
    fn test_type_labels() {
        assert_eq!(type_label("movie"), "Movies");
        assert_eq!(type_label("series"), "Series");
        assert_eq!(type_label("channel"), "Channels");
        assert_eq!(type_label("tv"), "TV");
        assert_eq!(type_label("anime"), "Anime");
        assert_eq!(type_label(""), "");
    }

    #[tokio::test]
    async fn test_rows_skip_empty_and_failed_catalogs() {
        let addons = vec![
            addon_from_json(catalog_manifest(
                "a",
                serde_json::json!([
                    {"id": "top", "type": "movie", "name": "Popular"},
                    {"id": "new", "type": "movie"}
                ]),
            )),
            addon_from_json(catalog_manifest("b", serde_json::json!([{"id": "top", "type": "movie"}]))),
            addon_from_json(catalog_manifest("c", serde_json::json!([{"id": "top", "type": "movie"}]))),
        ];
        let transport = MockTransport::new()
            .respond_json("https://a.test/catalog/movie/top.json", &metas(&["tt1", "tt2"]))
            .respond_json("https://a.test/catalog/movie/new.json", &metas(&[]))
            .fail("https://b.test/catalog/movie/top.json", TransportError::Network("down".into()))
            .respond_json("https://c.test/catalog/movie/top.json", &metas(&["tt3"]));

        let rows = aggregator(addons, transport, EngineConfig::default())
            .discover("movie", &CancellationToken::new())
            .await;

        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Popular", "C - Movies"]);
        assert_eq!(rows[0].deep_link, "stremio:///discover/a/movie/top");
        assert_eq!(rows[1].items.len(), 1);
    }

    #[tokio::test]
    async fn test_catalog_bound_and_item_cap() {
        let addons = vec![addon_from_json(catalog_manifest(
            "a",
            serde_json::json!([
                {"id": "one", "type": "movie"},
                {"id": "two", "type": "movie"},
                {"id": "three", "type": "movie"}
            ]),
        ))];
        let transport = MockTransport::new()
            .respond_json("https://a.test/catalog/movie/one.json", &metas(&["1", "2", "3"]))
            .respond_json("https://a.test/catalog/movie/two.json", &metas(&["4"]))
            .respond_json("https://a.test/catalog/movie/three.json", &metas(&["5"]));
        let mut config = EngineConfig::default();
        config.discovery.catalogs_per_type = 2;
        config.discovery.max_items_per_row = 2;

        let rows = aggregator(addons, transport.clone(), config)
            .discover("movie", &CancellationToken::new())
            .await;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].items.len(), 2);
        assert_eq!(transport.request_count("https://a.test/catalog/movie/three"), 0);
    }

    #[tokio::test]
    async fn test_discover_all_keeps_type_order() {
        let addons = vec![addon_from_json(catalog_manifest(
            "a",
            serde_json::json!([
                {"id": "top", "type": "series"},
                {"id": "top", "type": "movie"}
            ]),
        ))];
        let transport = MockTransport::new()
            .respond_json("https://a.test/catalog/movie/top.json", &metas(&["m"]))
            .respond_json("https://a.test/catalog/series/top.json", &metas(&["s"]));

        let rows = aggregator(addons, transport, EngineConfig::default())
            .discover_all(&["movie".to_string(), "series".to_string()], &CancellationToken::new())
            .await;

        let titles: Vec<_> = rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["A - Movies", "A - Series"]);
    }
}
