//! Core runtime for addonhub.
//!
//! Configuration, the network collaborator, the concurrent dispatcher and
//! the installed-addon store.

mod config;
mod dispatcher;
mod retry;
mod store;
mod transport;

pub use config::{
    CatalogConfig, DefaultAddon, DiscoveryConfig, EngineConfig, NetworkConfig,
    RequiredExtraPolicy, SearchConfig, StorageConfig,
};
pub use dispatcher::{AbsentReason, Dispatcher, Outcome, Outcomes};
pub use retry::{retry_async, RetryConfig};
pub use store::{AddonStorage, AddonStore, JsonFileStorage, MemoryStorage};
pub use transport::{HttpTransport, Transport, TransportError, TransportResult};
