//! Engine Integration Tests
//!
//! Drives the full engine (store, dispatcher, aggregators, lifecycle) over
//! in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use addonhub::core::{MemoryStorage, TransportError};
use addonhub::testing::{catalog_manifest, resource_manifest, MockAccountStore, MockTransport};
use addonhub::{AddonError, AuthState, Engine, EngineConfig, InstallOutcome};

// ============================================================================
// Fixtures
// ============================================================================

fn engine(transport: &MockTransport) -> Engine {
    Engine::new(EngineConfig::default(), Arc::new(transport.clone()), Arc::new(MemoryStorage::new()))
}

fn metas(ids: &[&str]) -> serde_json::Value {
    let items: Vec<_> = ids
        .iter()
        .map(|id| serde_json::json!({"id": id, "type": "movie", "name": format!("Title {id}")}))
        .collect();
    serde_json::json!({ "metas": items })
}

/// Register a manifest route and install the addon.
async fn install(engine: &Engine, transport: &MockTransport, manifest: serde_json::Value) {
    let id = manifest["id"].as_str().unwrap().to_string();
    let url = format!("https://{id}.test/manifest.json");
    transport.set_json(&url, &manifest);
    let outcome = engine.install_addon(&url).await.unwrap();
    assert!(outcome.is_installed(), "{id} should install");
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_install_same_manifest_twice() {
    let transport = MockTransport::new();
    let engine = engine(&transport);
    install(&engine, &transport, resource_manifest("a", "stream")).await;

    let again = engine.install_addon("https://a.test/").await.unwrap();

    assert_eq!(again, InstallOutcome::AlreadyInstalled("a".to_string()));
    assert_eq!(engine.installed_addons().iter().filter(|a| a.id() == "a").count(), 1);
}

#[tokio::test]
async fn test_uninstall_official_is_rejected() {
    let transport = MockTransport::new();
    let engine = engine(&transport);
    install(&engine, &transport, resource_manifest("org.stremio.local", "stream")).await;

    // Official status follows the id, not the URL it was installed from.
    let err = engine.uninstall_addon("org.stremio.local").await.unwrap_err();

    assert!(matches!(err, AddonError::Protected(_)));
    assert_eq!(engine.installed_addons().len(), 1);
}

#[tokio::test]
async fn test_failed_sync_leaves_installed_set() {
    let transport = MockTransport::new();
    let account = MockAccountStore::new();
    let engine = engine(&transport)
        .with_account(Arc::new(account.clone()), Arc::new(AuthState::logged_in("key")));
    install(&engine, &transport, resource_manifest("a", "stream")).await;

    account.set_failing(true);
    let result = engine.sync_addons_from_server().await;

    assert!(result.is_err());
    assert!(engine.get_addon("a").is_some());
}

#[tokio::test]
async fn test_sync_without_login() {
    let engine = engine(&MockTransport::new())
        .with_account(Arc::new(MockAccountStore::new()), Arc::new(AuthState::new()));

    assert!(matches!(engine.sync_addons_from_server().await, Err(AddonError::NotLoggedIn)));
}

#[tokio::test]
async fn test_persisted_set_survives_restart() {
    let transport = MockTransport::new();
    let storage = Arc::new(MemoryStorage::new());
    let first = Engine::new(EngineConfig::default(), Arc::new(transport.clone()), storage.clone());
    install(&first, &transport, resource_manifest("a", "stream")).await;
    drop(first);

    let second = Engine::new(EngineConfig::default(), Arc::new(transport), storage);
    assert_eq!(second.load().unwrap(), 1);
    assert!(second.get_addon("a").is_some());
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn test_search_only_reaches_searchable_catalog() {
    let transport = MockTransport::new();
    let engine = engine(&transport);
    install(
        &engine,
        &transport,
        catalog_manifest("a", serde_json::json!([{"id": "top", "type": "movie", "extra": []}])),
    )
    .await;
    install(
        &engine,
        &transport,
        catalog_manifest(
            "b",
            serde_json::json!([{"id": "top", "type": "movie", "extra": [{"name": "search"}]}]),
        ),
    )
    .await;
    transport.set_json("https://b.test/catalog/movie/top/search=batman.json", &metas(&["tt1"]));

    let results = engine.search("batman", &["movie".to_string()]).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].addon.id(), "b");
    assert_eq!(transport.request_count("https://a.test/catalog"), 0);
}

#[tokio::test]
async fn test_streams_from_two_addons_are_not_deduplicated() {
    let transport = MockTransport::new();
    let engine = engine(&transport);
    install(&engine, &transport, resource_manifest("first", "stream")).await;
    install(&engine, &transport, resource_manifest("second", "stream")).await;
    let body = serde_json::json!({"streams": [{"url": "https://cdn.test/same.mp4"}]});
    transport.set_json("https://first.test/stream/movie/tt0111161.json", &body);
    transport.set_json("https://second.test/stream/movie/tt0111161.json", &body);

    let streams = engine.get_streams("movie", "tt0111161", None).await;

    assert_eq!(streams.len(), 2);
    assert_eq!(streams[0].0.id(), "first");
    assert_eq!(streams[1].0.id(), "second");
    assert_eq!(streams[0].1.url, streams[1].1.url);
}

#[tokio::test]
async fn test_discovery_never_emits_empty_rows() {
    let transport = MockTransport::new();
    let engine = engine(&transport);
    install(
        &engine,
        &transport,
        catalog_manifest(
            "a",
            serde_json::json!([
                {"id": "empty", "type": "movie"},
                {"id": "full", "type": "movie", "name": "Full"}
            ]),
        ),
    )
    .await;
    transport.set_json("https://a.test/catalog/movie/empty.json", &metas(&[]));
    transport.set_json("https://a.test/catalog/movie/full.json", &metas(&["tt1"]));

    let rows = engine.discover("movie").await;

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].title, "Full");
    assert!(rows.iter().all(|r| !r.items.is_empty()));
}

#[tokio::test]
async fn test_one_broken_addon_does_not_affect_others() {
    let transport = MockTransport::new();
    let engine = engine(&transport);
    for id in ["one", "two", "three"] {
        install(&engine, &transport, resource_manifest(id, "stream")).await;
    }
    let body = serde_json::json!({"streams": [{"url": "https://cdn.test/x.mp4"}]});
    transport.set_json("https://one.test/stream/movie/tt1.json", &body);
    transport.set_error(
        "https://two.test/stream/movie/tt1.json",
        TransportError::Timeout("https://two.test".to_string()),
    );
    transport.set_json("https://three.test/stream/movie/tt1.json", &body);

    let streams = engine.get_streams("movie", "tt1", None).await;

    let ids: Vec<_> = streams.iter().map(|(a, _)| a.id()).collect();
    assert_eq!(ids, vec!["one", "three"]);
}

#[tokio::test]
async fn test_meta_from_catalog_addon() {
    let transport = MockTransport::new();
    let engine = engine(&transport);
    install(
        &engine,
        &transport,
        serde_json::json!({
            "id": "cinemeta", "version": "3.0.0", "name": "Cinemeta",
            "types": ["movie", "series"],
            "idPrefixes": ["tt"],
            "resources": ["catalog", "meta"],
            "catalogs": []
        }),
    )
    .await;
    transport.set_json(
        "https://cinemeta.test/meta/series/tt2.json",
        &serde_json::json!({"meta": {
            "id": "tt2", "type": "series", "name": "Show",
            "videos": [{"id": "tt2:1:1", "season": 1, "episode": 1}]
        }}),
    );

    let (addon, meta) = engine.get_meta("series", "tt2").await.unwrap();
    assert_eq!(addon.id(), "cinemeta");
    assert_eq!(meta.seasons(), vec![1]);

    assert!(engine.get_meta("series", "kitsu:1").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_new_query_supersedes_in_flight_search() {
    let transport = MockTransport::new().respond_after(
        "https://b.test/catalog/movie/top/search=stale.json",
        metas(&["old"]).to_string(),
        Duration::from_secs(10),
    );
    let engine = engine(&transport);
    install(
        &engine,
        &transport,
        catalog_manifest(
            "b",
            serde_json::json!([{"id": "top", "type": "movie", "extra": [{"name": "search"}]}]),
        ),
    )
    .await;
    transport.set_json("https://b.test/catalog/movie/top/search=fresh.json", &metas(&["new"]));

    let session = Arc::new(engine.search_session().with_types(vec!["movie".to_string()]));
    let stale = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.submit("stale").await }
    });
    // Past the debounce window, so the stale request is already on the wire.
    tokio::time::sleep(Duration::from_secs(1)).await;
    let fresh = session.submit("fresh").await;

    assert!(stale.await.unwrap().is_none());
    assert_eq!(fresh.unwrap()[0].items[0].id, "new");
}
