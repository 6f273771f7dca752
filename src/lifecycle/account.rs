//! Remote account collaborator.
//!
//! The account service keeps the user's addon collection so it follows them
//! across devices. Its wire format lives outside this crate; the engine only
//! needs to read and replace the collection.

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::addon::{Addon, AddonResult};

/// Reads and replaces the addon collection stored with a user account.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch the collection saved for this account.
    async fn get_addon_collection(&self, auth_key: &str) -> AddonResult<Vec<Addon>>;

    /// Replace the collection saved for this account.
    async fn set_addon_collection(&self, auth_key: &str, addons: &[Addon]) -> AddonResult<()>;
}

/// Current authentication, if any.
#[derive(Debug, Default)]
pub struct AuthState {
    auth_key: RwLock<Option<String>>,
}

impl AuthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logged_in(auth_key: impl Into<String>) -> Self {
        Self { auth_key: RwLock::new(Some(auth_key.into())) }
    }

    pub fn login(&self, auth_key: impl Into<String>) {
        *self.auth_key.write() = Some(auth_key.into());
    }

    pub fn logout(&self) {
        *self.auth_key.write() = None;
    }

    pub fn auth_key(&self) -> Option<String> {
        self.auth_key.read().clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.auth_key.read().is_some()
    }
}
