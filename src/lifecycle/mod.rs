//! Addon lifecycle management and the remote account collaborator.

mod account;
mod manager;

pub use account::{AccountStore, AuthState};
pub use manager::{AddonManager, InstallOutcome};
