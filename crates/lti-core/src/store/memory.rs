use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{EphemeralStore, Registry};
use crate::domain::{Deployment, LaunchState};
use crate::error::LtiError;

struct StateRecord {
    state: LaunchState,
    expires_at: Instant,
}

/// A process-local registry and ephemeral store, suitable for the demo
/// binary and for tests. A production deployment with more than one tool
/// instance behind a load balancer wants a shared backend instead, since
/// state records written on one instance must be readable (and
/// single-use-deletable) from whichever instance receives the launch POST.
#[derive(Default)]
pub struct InMemoryStore {
    deployments: RwLock<HashMap<String, Deployment>>,
    state: RwLock<HashMap<String, StateRecord>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Registry for InMemoryStore {
    async fn get_deployment(&self, client_id: &str, deployment_id: &str) -> Result<Deployment, LtiError> {
        let key = Deployment::registry_key(client_id, deployment_id);
        self.deployments
            .read()
            .get(&key)
            .cloned()
            .ok_or_else(|| LtiError::NotFound(format!("no deployment registered for {key}")))
    }

    async fn add_deployment(&self, deployment: Deployment) -> Result<(), LtiError> {
        let key = Deployment::registry_key(&deployment.client_id, &deployment.deployment_id);
        self.deployments.write().insert(key, deployment);
        Ok(())
    }
}

#[async_trait]
impl EphemeralStore for InMemoryStore {
    async fn save_state(&self, state_id: &str, state: LaunchState, ttl: Duration) -> Result<(), LtiError> {
        self.state.write().insert(
            state_id.to_string(),
            StateRecord { state, expires_at: Instant::now() + ttl },
        );
        Ok(())
    }

    async fn get_state(&self, state_id: &str) -> Result<LaunchState, LtiError> {
        let now = Instant::now();
        let mut map = self.state.write();
        let Some(record) = map.get(state_id) else {
            return Err(LtiError::NotFound("unknown or already-consumed launch state".into()));
        };
        if record.expires_at <= now {
            map.remove(state_id);
            return Err(LtiError::NotFound("launch state has expired".into()));
        }
        Ok(record.state.clone())
    }

    async fn delete_state(&self, state_id: &str) -> Result<(), LtiError> {
        self.state.write().remove(state_id);
        Ok(())
    }
}
