//! The two stateful ports a launcher needs: a [`Registry`] of known
//! deployments, and an [`EphemeralStore`] for the short-lived OIDC state
//! records used to detect replay. Kept as separate traits (rather than one
//! `Store`) because a deployment installs a real database behind the
//! registry while still wanting the ephemeral store to stay in-process.

mod memory;

pub use memory::InMemoryStore;

use crate::domain::{Deployment, LaunchState};
use crate::error::LtiError;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Registry: Send + Sync {
    async fn get_deployment(&self, client_id: &str, deployment_id: &str) -> Result<Deployment, LtiError>;
    async fn add_deployment(&self, deployment: Deployment) -> Result<(), LtiError>;
}

#[async_trait]
pub trait EphemeralStore: Send + Sync {
    /// Stores `state` under `state_id`, to be forgotten after `ttl` even if
    /// nobody calls [`EphemeralStore::delete_state`].
    async fn save_state(&self, state_id: &str, state: LaunchState, ttl: Duration) -> Result<(), LtiError>;

    /// Looks up `state_id`. Once its TTL has elapsed this returns
    /// [`LtiError::NotFound`] regardless of whether anything has physically
    /// garbage-collected the record yet.
    async fn get_state(&self, state_id: &str) -> Result<LaunchState, LtiError>;

    /// Removes `state_id`, enforcing the one-time-use property of the OIDC
    /// state parameter. Idempotent: deleting an absent or expired id is not
    /// an error.
    async fn delete_state(&self, state_id: &str) -> Result<(), LtiError>;
}

/// A store that is both a [`Registry`] and an [`EphemeralStore`] — the shape
/// `InMemoryStore` implements, and the shape most `Launcher` configurations
/// want to pass a single value for.
pub trait EphemeralRegistry: Registry + EphemeralStore {}
impl<T: Registry + EphemeralStore + ?Sized> EphemeralRegistry for T {}
