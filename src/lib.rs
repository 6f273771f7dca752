#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]

//! # Addonhub
//!
//! Addon resolution and aggregation engine for media addons.
//!
//! Addons are independent remote services that describe themselves with a
//! manifest and answer catalog, meta, stream and subtitle requests. Addonhub
//! keeps the set of installed addons, works out which of them can answer a
//! given request, fans the request out to all of them concurrently, and
//! merges the answers without letting one slow or broken addon spoil the
//! rest.
//!
//! ## Features
//!
//! - **Capability index**: pick addons by resource, media type and id prefix
//! - **Isolated fan-out**: per-addon failures become absent outcomes, never errors
//! - **Aggregators**: discovery rows, stream/subtitle merge, federated search, first-match meta
//! - **Lifecycle**: install, uninstall, account sync and default addons
//! - **Search sessions**: debounced search-as-you-type with stale-result suppression
//!
//! ## Quick Start
//!
//! ```bash
//! # Install an addon
//! addonhub install https://v3-cinemeta.strem.io/manifest.json
//!
//! # Search every searchable catalog
//! addonhub search "the matrix"
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::redundant_clone)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::future_not_send)]

pub mod addon;
pub mod aggregate;
pub mod core;
pub mod engine;
pub mod lifecycle;
pub mod testing;

// Re-export commonly used types
pub use addon::{
    Addon, AddonError, AddonFlags, AddonResult, CapabilityIndex, CatalogDecl, CatalogResponse,
    DiscoverRow, ExtraValue, Manifest, MetaItem, MetaItemPreview, ResourceRequest, SearchResult,
    Stream, Subtitles,
};
pub use aggregate::{Aggregator, SearchSession};
pub use core::{AbsentReason, Dispatcher, EngineConfig, Outcome, Transport, TransportError};
pub use engine::Engine;
pub use lifecycle::{AccountStore, AddonManager, AuthState, InstallOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "addonhub";
