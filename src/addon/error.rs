//! Addon engine error types.

use thiserror::Error;

use crate::core::TransportError;

/// Result type for addon engine operations.
pub type AddonResult<T> = Result<T, AddonError>;

/// Errors surfaced by whole-operation calls (install, sync, persistence).
///
/// Failures of individual addons during aggregation never show up here; the
/// dispatcher turns them into [`crate::core::Outcome::Absent`].
#[derive(Debug, Error)]
pub enum AddonError {
    /// Manifest could not be fetched or parsed.
    #[error("Failed to fetch addon from {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Response body was not valid for the expected shape.
    #[error("Malformed response body: {0}")]
    Decode(String),

    /// Network call exceeded its timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Operation requires an authenticated account.
    #[error("Not logged in")]
    NotLoggedIn,

    /// Installed set could not be loaded or saved.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No addon with this id is installed.
    #[error("Addon '{0}' is not installed")]
    NotInstalled(String),

    /// The addon does not declare this catalog.
    #[error("Addon '{addon}' has no {media_type} catalog '{catalog}'")]
    UnknownCatalog { addon: String, media_type: String, catalog: String },

    /// Addon is official or protected and cannot be removed.
    #[error("Addon '{0}' is protected and cannot be uninstalled")]
    Protected(String),

    /// Manifest parsed but is not usable.
    #[error("Invalid addon manifest: {0}")]
    InvalidManifest(String),

    /// Remote account store rejected or failed the request.
    #[error("Account API error: {0}")]
    Account(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AddonError {
    /// Wrap a transport failure for the given manifest URL.
    pub fn fetch(url: impl Into<String>, err: &TransportError) -> Self {
        let url = url.into();
        match err {
            TransportError::Timeout(_) => Self::Timeout(url),
            other => Self::Fetch { url, reason: other.to_string() },
        }
    }
}

impl From<serde_json::Error> for AddonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
