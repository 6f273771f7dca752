//! Core addon types and response bodies.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::Manifest;

/// Resource name for catalogs.
pub const RESOURCE_CATALOG: &str = "catalog";

/// Resource name for full metadata.
pub const RESOURCE_META: &str = "meta";

/// Resource name for streams.
pub const RESOURCE_STREAM: &str = "stream";

/// Resource name for subtitles.
pub const RESOURCE_SUBTITLES: &str = "subtitles";

/// Extra name used for full-text search.
pub const EXTRA_SEARCH: &str = "search";

/// Extra name used for pagination.
pub const EXTRA_SKIP: &str = "skip";

/// Manifest file name appended to transport URLs.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Flags attached to an installed addon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddonFlags {
    /// Shipped with the application.
    pub official: bool,
    /// Must not be removed by the user.
    pub protected: bool,
}

impl AddonFlags {
    /// Whether uninstalling this addon must be refused.
    pub fn is_locked(&self) -> bool {
        self.official || self.protected
    }
}

/// An installed addon: its manifest plus where to reach it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Addon {
    pub manifest: Manifest,
    /// Base URL without the trailing `/manifest.json`.
    pub transport_url: String,
    #[serde(default)]
    pub flags: AddonFlags,
}

impl Addon {
    /// Identity key of the addon.
    pub fn id(&self) -> &str {
        &self.manifest.id
    }

    /// Display name from the manifest.
    pub fn name(&self) -> &str {
        &self.manifest.name
    }
}

/// A `(name, value)` pair passed as catalog or subtitles extra.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtraValue {
    pub name: String,
    pub value: String,
}

impl ExtraValue {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }

    /// Parse a `name=value` string, as accepted on the command line.
    pub fn parse(pair: &str) -> Option<Self> {
        let (name, value) = pair.split_once('=')?;
        if name.is_empty() {
            return None;
        }
        Some(Self::new(name, value))
    }
}

/// Poster aspect hint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosterShape {
    Square,
    Landscape,
    #[default]
    Poster,
}

/// External link attached to a meta item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub category: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetaBehaviorHints {
    pub default_video_id: Option<String>,
    pub featured_video_id: Option<String>,
    pub has_scheduled_videos: bool,
}

/// Catalog entry, as returned in `metas`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaItemPreview {
    pub id: String,
    #[serde(rename = "type")]
    pub media_type: String,
    pub name: String,
    #[serde(default)]
    pub poster: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub release_info: Option<String>,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub released: Option<String>,
    #[serde(default)]
    pub poster_shape: PosterShape,
    #[serde(default)]
    pub links: Vec<Link>,
    #[serde(default)]
    pub trailer_streams: Vec<Stream>,
    #[serde(default)]
    pub behavior_hints: MetaBehaviorHints,
}

/// Episode or part of a meta item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub released: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub streams: Vec<Stream>,
    #[serde(default)]
    pub season: Option<u32>,
    #[serde(default)]
    pub episode: Option<u32>,
}

/// Full metadata for one title.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaItem {
    #[serde(flatten)]
    pub preview: MetaItemPreview,
    #[serde(default)]
    pub videos: Vec<Video>,
}

impl MetaItem {
    pub fn id(&self) -> &str {
        &self.preview.id
    }

    pub fn to_preview(&self) -> MetaItemPreview {
        self.preview.clone()
    }

    /// Videos of one season, in declaration order.
    pub fn videos_for_season(&self, season: u32) -> Vec<&Video> {
        self.videos.iter().filter(|v| v.season == Some(season)).collect()
    }

    /// Distinct season numbers, ascending.
    pub fn seasons(&self) -> Vec<u32> {
        let mut seasons: Vec<u32> = self.videos.iter().filter_map(|v| v.season).collect();
        seasons.sort_unstable();
        seasons.dedup();
        seasons
    }
}

/// Kind of source a stream points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Url,
    YouTube,
    Torrent,
    External,
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyHeaders {
    pub request: HashMap<String, String>,
    pub response: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamBehaviorHints {
    pub not_web_ready: bool,
    pub binge_group: Option<String>,
    pub country_whitelist: Option<Vec<String>>,
    pub proxy_headers: Option<ProxyHeaders>,
    pub filename: Option<String>,
    pub video_size: Option<u64>,
    pub video_hash: Option<String>,
}

/// A playable source offered by an addon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Stream {
    pub url: Option<String>,
    pub yt_id: Option<String>,
    pub info_hash: Option<String>,
    pub file_idx: Option<u32>,
    pub external_url: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub subtitles: Vec<Subtitles>,
    pub behavior_hints: StreamBehaviorHints,
}

impl Stream {
    pub fn kind(&self) -> StreamKind {
        if self.url.is_some() {
            StreamKind::Url
        } else if self.yt_id.is_some() {
            StreamKind::YouTube
        } else if self.info_hash.is_some() {
            StreamKind::Torrent
        } else if self.external_url.is_some() {
            StreamKind::External
        } else {
            StreamKind::Unknown
        }
    }

    /// URL a player can open directly. Torrents need a streaming server and
    /// return `None`.
    pub fn playable_url(&self) -> Option<String> {
        match self.kind() {
            StreamKind::Url => self.url.clone(),
            StreamKind::YouTube => {
                self.yt_id.as_ref().map(|id| format!("https://www.youtube.com/watch?v={id}"))
            }
            StreamKind::External => self.external_url.clone(),
            StreamKind::Torrent | StreamKind::Unknown => None,
        }
    }

    pub fn magnet_url(&self) -> Option<String> {
        let hash = self.info_hash.as_ref()?;
        let mut magnet = format!("magnet:?xt=urn:btih:{hash}");
        if let Some(ref group) = self.behavior_hints.binge_group {
            magnet.push_str("&dn=");
            magnet.push_str(group);
        }
        Some(magnet)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitles {
    pub id: String,
    pub url: String,
    pub lang: String,
}

/// Body of a `catalog` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CatalogResponse {
    pub metas: Vec<MetaItemPreview>,
    pub has_more: bool,
    pub cache_max_age: Option<u64>,
}

/// Body of a `meta` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MetaResponse {
    pub meta: Option<MetaItem>,
    pub cache_max_age: Option<u64>,
}

/// Body of a `stream` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamsResponse {
    pub streams: Vec<Stream>,
    pub cache_max_age: Option<u64>,
}

/// Body of a `subtitles` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SubtitlesResponse {
    pub subtitles: Vec<Subtitles>,
    pub cache_max_age: Option<u64>,
}

/// One discovery row: the non-empty result of one `(addon, catalog)` pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverRow {
    pub title: String,
    pub items: Vec<MetaItemPreview>,
    pub addon: Addon,
    pub catalog: super::CatalogDecl,
    pub deep_link: String,
}

/// Search hits from one addon catalog.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub query: String,
    pub items: Vec<MetaItemPreview>,
    pub addon: Addon,
}

impl SearchResult {
    /// Flatten buckets and drop repeated item ids, keeping first occurrence.
    ///
    /// Presentation helper; the engine itself never merges buckets.
    pub fn flatten_unique(results: &[Self]) -> Vec<MetaItemPreview> {
        let mut seen = HashSet::new();
        results
            .iter()
            .flat_map(|r| r.items.iter())
            .filter(|item| seen.insert(item.id.clone()))
            .cloned()
            .collect()
    }
}
