//! Addon model: manifests, capability queries and request building.
//!
//! Addons are remote services that describe themselves with a manifest.
//! This module holds the pure, synchronous half of the engine: the typed
//! model of manifests and responses, the capability checks that decide
//! which addons are eligible for a request, and the builder that turns a
//! request into an addon URL.

mod error;
mod index;
mod manifest;
mod request;
mod types;

pub use error::{AddonError, AddonResult};
pub use index::{CapabilityIndex, CatalogPair};
pub use manifest::{CatalogDecl, ExtraDecl, Manifest, ManifestBehaviorHints, ResourceDecl};
pub use request::{manifest_url, normalize_base_url, ResourceRequest};
pub use types::{
    Addon, AddonFlags, CatalogResponse, DiscoverRow, ExtraValue, Link, MetaBehaviorHints,
    MetaItem, MetaItemPreview, MetaResponse, PosterShape, ProxyHeaders, SearchResult, Stream,
    StreamBehaviorHints, StreamKind, StreamsResponse, Subtitles, SubtitlesResponse, Video,
    EXTRA_SEARCH, EXTRA_SKIP, MANIFEST_FILE, RESOURCE_CATALOG, RESOURCE_META, RESOURCE_STREAM,
    RESOURCE_SUBTITLES,
};
