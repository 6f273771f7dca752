//! Configuration management for addonhub.
//!
//! Handles loading and saving configuration from TOML files.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Network settings
    pub network: NetworkConfig,

    /// Discovery row settings
    pub discovery: DiscoveryConfig,

    /// Search settings
    pub search: SearchConfig,

    /// Catalog request settings
    pub catalogs: CatalogConfig,

    /// Where the installed set is persisted
    pub storage: StorageConfig,

    /// Addons installed when nothing else is available
    pub default_addons: Vec<DefaultAddon>,
}

/// Network settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Per-call timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent sent with every request
    pub user_agent: String,

    /// Retries for manifest and account fetches
    pub retry_attempts: u32,
}

/// Discovery row settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Catalogs queried per media type
    pub catalogs_per_type: usize,

    /// Items kept per row (0 keeps all)
    pub max_items_per_row: usize,

    /// Media types shown by default
    pub types: Vec<String>,

    /// Scheme of row deep links
    pub deep_link_scheme: String,
}

/// Search settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Quiet period before a typed query is sent
    pub debounce_ms: u64,

    /// Queries shorter than this are ignored
    pub min_query_len: usize,

    /// Media types searched by default
    pub types: Vec<String>,
}

/// How catalog requests handle required extras the caller did not supply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequiredExtraPolicy {
    /// Send the request as given.
    #[default]
    Tolerate,
    /// Fill defaults, then skip the catalog if something is still missing.
    Enforce,
}

/// Catalog request settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub required_extras: RequiredExtraPolicy,
}

/// Persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for the persisted set; defaults to the data dir
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Key the installed set is stored under
    pub namespace: String,
}

/// An addon shipped with the application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultAddon {
    pub id: String,
    pub name: String,
    pub url: String,
}

impl DefaultAddon {
    fn new(id: &str, name: &str, url: &str) -> Self {
        Self { id: id.to_string(), name: name.to_string(), url: url.to_string() }
    }
}

fn default_addons() -> Vec<DefaultAddon> {
    vec![
        DefaultAddon::new(
            "com.linvo.cinemeta",
            "Cinemeta",
            "https://v3-cinemeta.strem.io/manifest.json",
        ),
        DefaultAddon::new(
            "org.stremio.opensubtitles",
            "OpenSubtitles",
            "https://opensubtitles-v3.strem.io/manifest.json",
        ),
        DefaultAddon::new(
            "org.stremio.local",
            "Local Files",
            "http://127.0.0.1:11470/local-addon/manifest.json",
        ),
        DefaultAddon::new(
            "com.stremio.youtube",
            "YouTube",
            "https://youtube-addon.strem.io/manifest.json",
        ),
    ]
}

const MIN_TIMEOUT_SECS: u64 = 1;
const MAX_TIMEOUT_SECS: u64 = 120;

impl EngineConfig {
    /// Load configuration from the default location.
    ///
    /// Looks for config in:
    /// 1. `.addonhub.toml` in current directory
    /// 2. `~/.config/addonhub/config.toml`
    /// 3. Falls back to defaults
    pub fn load() -> anyhow::Result<Self> {
        let local_config = PathBuf::from(".addonhub.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(config_dir) = Self::config_dir() {
            let global_config = config_dir.join("config.toml");
            if global_config.exists() {
                return Self::load_from_file(&global_config);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty TOML.
    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.discovery.catalogs_per_type == 0 {
            anyhow::bail!("discovery.catalogs_per_type must be at least 1");
        }

        if self.storage.namespace.trim().is_empty() {
            anyhow::bail!("storage.namespace must not be empty");
        }

        Ok(())
    }

    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("addonhub"))
    }

    /// Get the data directory path.
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("addonhub"))
    }

    /// Directory the installed set is persisted in.
    pub fn storage_dir(&self) -> Option<PathBuf> {
        self.storage.path.clone().or_else(Self::data_dir)
    }
}

impl NetworkConfig {
    /// Per-call timeout, clamped to a sane range.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
    }
}

impl SearchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            discovery: DiscoveryConfig::default(),
            search: SearchConfig::default(),
            catalogs: CatalogConfig::default(),
            storage: StorageConfig::default(),
            default_addons: default_addons(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: format!("addonhub/{}", env!("CARGO_PKG_VERSION")),
            retry_attempts: 2,
        }
    }
}

fn default_types() -> Vec<String> {
    vec!["movie".to_string(), "series".to_string()]
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            catalogs_per_type: 4,
            max_items_per_row: 20,
            types: default_types(),
            deep_link_scheme: "stremio".to_string(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { debounce_ms: 300, min_query_len: 2, types: default_types() }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { path: None, namespace: "installed_addons".to_string() }
    }
}
