//! Search-as-you-type session.
//!
//! Each submitted query gets a request id and its own cancellation token.
//! Submitting again cancels the previous token, so an older search stops its
//! network calls and can never hand back results after a newer query was
//! issued.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use super::Aggregator;
use crate::addon::SearchResult;

/// Debounced, superseding search over an [`Aggregator`].
#[derive(Debug)]
pub struct SearchSession {
    aggregator: Aggregator,
    delay: Duration,
    min_query_len: usize,
    media_types: Vec<String>,

    /// Id of the latest submitted query.
    current_id: AtomicU64,

    /// Token of the latest submitted query.
    current: Mutex<CancellationToken>,
}

impl SearchSession {
    /// Session using the aggregator's search settings.
    pub fn new(aggregator: Aggregator) -> Self {
        let search = &aggregator.config().search;
        let delay = search.debounce();
        let min_query_len = search.min_query_len;
        let media_types = search.types.clone();

        Self {
            aggregator,
            delay,
            min_query_len,
            media_types,
            current_id: AtomicU64::new(0),
            current: Mutex::new(CancellationToken::new()),
        }
    }

    /// Search these media types instead of the configured ones.
    #[must_use]
    pub fn with_types(mut self, media_types: Vec<String>) -> Self {
        self.media_types = media_types;
        self
    }

    /// Submit the current text of the search box.
    ///
    /// Returns `None` when a newer query superseded this one. Queries shorter
    /// than the minimum length return an empty result immediately, which also
    /// clears whatever was in flight.
    pub async fn submit(&self, query: &str) -> Option<Vec<SearchResult>> {
        let (request_id, token) = self.trigger();

        let query = query.trim();
        if query.chars().count() < self.min_query_len {
            return Some(Vec::new());
        }

        tokio::select! {
            () = tokio::time::sleep(self.delay) => {}
            () = token.cancelled() => return None,
        }

        let results = self.aggregator.search(query, &self.media_types, &token).await;

        if self.is_valid(request_id) && !token.is_cancelled() {
            Some(results)
        } else {
            tracing::debug!(query, request_id, "Dropping superseded search results");
            None
        }
    }

    /// Cancel whatever query is in flight.
    pub fn cancel(&self) {
        self.current_id.fetch_add(1, Ordering::SeqCst);
        self.current.lock().cancel();
    }

    /// Id of the latest submitted query.
    pub fn current_id(&self) -> u64 {
        self.current_id.load(Ordering::SeqCst)
    }

    pub fn is_valid(&self, request_id: u64) -> bool {
        self.current_id() == request_id
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn trigger(&self) -> (u64, CancellationToken) {
        let token = CancellationToken::new();
        let mut current = self.current.lock();
        current.cancel();
        *current = token.clone();
        let id = self.current_id.fetch_add(1, Ordering::SeqCst) + 1;
        (id, token)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::{AddonStore, Dispatcher, EngineConfig};
    use crate::testing::{addon_from_json, catalog_manifest, MockTransport};

    fn session(transport: MockTransport) -> Arc<SearchSession> {
        let store = AddonStore::in_memory();
        store.replace(vec![addon_from_json(catalog_manifest(
            "b",
            serde_json::json!([{"id": "top", "type": "movie", "extra": [{"name": "search"}]}]),
        ))]);
        let aggregator = Aggregator::new(
            Arc::new(store),
            Dispatcher::new(Arc::new(transport)),
            Arc::new(EngineConfig::default()),
        );
        Arc::new(SearchSession::new(aggregator).with_types(vec!["movie".to_string()]))
    }

    fn hits(id: &str) -> String {
        serde_json::json!({"metas": [{"id": id, "type": "movie", "name": id}]}).to_string()
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_query_after_debounce() {
        let transport = MockTransport::new()
            .respond("https://b.test/catalog/movie/top/search=batman.json", hits("tt1"));
        let session = session(transport);

        let results = session.submit("batman").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(session.delay(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_query_clears_without_request() {
        let transport = MockTransport::new();
        let session = session(transport.clone());

        assert_eq!(session.submit(" b ").await.map(|r| r.len()), Some(0));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_within_debounce_sends_only_latest() {
        let transport = MockTransport::new()
            .respond("https://b.test/catalog/movie/top/search=bat.json", hits("old"))
            .respond("https://b.test/catalog/movie/top/search=batman.json", hits("new"));
        let session = session(transport.clone());

        let first = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.submit("bat").await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = session.submit("batman").await;

        assert!(first.await.unwrap().is_none());
        assert_eq!(second.unwrap()[0].items[0].id, "new");
        assert_eq!(transport.request_count("https://b.test/catalog/movie/top/search=bat.json"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_query_is_superseded() {
        let transport = MockTransport::new()
            .respond_after(
                "https://b.test/catalog/movie/top/search=slow.json",
                hits("old"),
                Duration::from_secs(5),
            )
            .respond("https://b.test/catalog/movie/top/search=fresh.json", hits("new"));
        let session = session(transport);

        let first = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.submit("slow").await }
        });
        // Past the debounce, so the slow request is on the wire.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let second = session.submit("fresh").await;

        assert!(first.await.unwrap().is_none());
        assert_eq!(second.unwrap()[0].items[0].id, "new");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_query() {
        let transport = MockTransport::new()
            .respond("https://b.test/catalog/movie/top/search=batman.json", hits("tt1"));
        let session = session(transport);

        let pending = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.submit("batman").await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        session.cancel();

        assert!(pending.await.unwrap().is_none());
    }
}
