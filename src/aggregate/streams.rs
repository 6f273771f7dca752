//! Stream and subtitle aggregation.
//!
//! Every supporting addon is asked and every answer is kept. Results are
//! flattened addon by addon, item by item, without deduplication: two addons
//! offering the same URL produce two entries.

use tokio_util::sync::CancellationToken;

use super::Aggregator;
use crate::addon::{
    Addon, ExtraValue, ResourceRequest, Stream, StreamsResponse, Subtitles, SubtitlesResponse,
    RESOURCE_STREAM, RESOURCE_SUBTITLES,
};

impl Aggregator {
    /// Streams for a title, or for one video of it when `video_id` is set.
    ///
    /// Addons are selected by the title id; the request itself is keyed by
    /// the video id.
    pub async fn get_streams(
        &self,
        media_type: &str,
        id: &str,
        video_id: Option<&str>,
        cancel: &CancellationToken,
    ) -> Vec<(Addon, Stream)> {
        let candidates = self.index().addons_supporting(RESOURCE_STREAM, media_type, id);
        let request = ResourceRequest::new(RESOURCE_STREAM, media_type, video_id.unwrap_or(id));

        let outcomes = self
            .dispatcher
            .dispatch::<_, StreamsResponse, _>(
                candidates,
                |addon| Ok(request.url(&addon.transport_url)),
                cancel,
            )
            .await;

        outcomes
            .into_iter()
            .filter_map(|(addon, outcome)| outcome.present().map(|body| (addon, body.streams)))
            .flat_map(|(addon, streams)| streams.into_iter().map(move |s| (addon.clone(), s)))
            .collect()
    }

    /// Subtitles for a title, forwarding `extra` (hash, size, filename).
    pub async fn get_subtitles(
        &self,
        media_type: &str,
        id: &str,
        extra: Vec<ExtraValue>,
        cancel: &CancellationToken,
    ) -> Vec<(Addon, Subtitles)> {
        let candidates = self.index().addons_supporting(RESOURCE_SUBTITLES, media_type, id);
        let request = ResourceRequest::new(RESOURCE_SUBTITLES, media_type, id).with_extra(extra);

        let outcomes = self
            .dispatcher
            .dispatch::<_, SubtitlesResponse, _>(
                candidates,
                |addon| Ok(request.url(&addon.transport_url)),
                cancel,
            )
            .await;

        outcomes
            .into_iter()
            .filter_map(|(addon, outcome)| outcome.present().map(|body| (addon, body.subtitles)))
            .flat_map(|(addon, subs)| subs.into_iter().map(move |s| (addon.clone(), s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::core::{AddonStore, Dispatcher, EngineConfig};
    use crate::testing::{addon_from_json, resource_manifest, MockTransport};

    fn aggregator(addons: Vec<Addon>, transport: MockTransport) -> Aggregator {
        let store = AddonStore::in_memory();
        store.replace(addons);
        Aggregator::new(
            Arc::new(store),
            Dispatcher::new(Arc::new(transport)),
            Arc::new(EngineConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_streams_keep_addon_order_and_duplicates() {
        let addons = vec![
            addon_from_json(resource_manifest("slow", "stream")),
            addon_from_json(resource_manifest("fast", "stream")),
        ];
        let body = serde_json::json!({"streams": [{"url": "https://cdn/x.mp4"}]}).to_string();
        let transport = MockTransport::new()
            .respond_after(
                "https://slow.test/stream/movie/tt0111161.json",
                body.clone(),
                Duration::from_millis(30),
            )
            .respond("https://fast.test/stream/movie/tt0111161.json", body);

        let streams = aggregator(addons, transport)
            .get_streams("movie", "tt0111161", None, &CancellationToken::new())
            .await;

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].0.id(), "slow");
        assert_eq!(streams[1].0.id(), "fast");
        assert_eq!(streams[0].1.url, streams[1].1.url);
    }

    #[tokio::test]
    async fn test_streams_for_video_use_video_id() {
        let addons = vec![addon_from_json(serde_json::json!({
            "id": "eps", "version": "1.0.0", "name": "Episodes",
            "types": ["series"],
            "resources": [{"name": "stream", "idPrefixes": ["tt"]}]
        }))];
        let transport = MockTransport::new().respond_json(
            "https://eps.test/stream/series/tt1:1:2.json",
            &serde_json::json!({"streams": [{"infoHash": "aa"}, {"ytId": "bb"}]}),
        );

        let streams = aggregator(addons, transport)
            .get_streams("series", "tt1", Some("tt1:1:2"), &CancellationToken::new())
            .await;

        assert_eq!(streams.len(), 2);
        assert_eq!(streams[0].1.info_hash.as_deref(), Some("aa"));
    }

    #[tokio::test]
    async fn test_unsupported_addons_are_not_asked() {
        let addons = vec![
            addon_from_json(resource_manifest("meta-only", "meta")),
            addon_from_json(resource_manifest("subs", "subtitles")),
        ];
        let transport = MockTransport::new().respond_json(
            "https://subs.test/subtitles/movie/tt1/videoHash=abc.json",
            &serde_json::json!({"subtitles": [
                {"id": "1", "url": "https://s/1.srt", "lang": "eng"},
                {"id": "2", "url": "https://s/2.srt", "lang": "fre"}
            ]}),
        );

        let agg = aggregator(addons, transport.clone());
        let subtitles = agg
            .get_subtitles(
                "movie",
                "tt1",
                vec![ExtraValue::new("videoHash", "abc")],
                &CancellationToken::new(),
            )
            .await;
        let streams = agg.get_streams("movie", "tt1", None, &CancellationToken::new()).await;

        assert_eq!(subtitles.len(), 2);
        assert_eq!(subtitles[1].1.lang, "fre");
        assert!(streams.is_empty());
        assert_eq!(transport.request_count("https://meta-only.test"), 0);
    }
}
