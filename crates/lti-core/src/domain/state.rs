use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// A transient record created during OIDC initiation and consumed exactly once
/// at launch. Binds the `state` and `nonce` anti-CSRF/anti-replay tokens to the
/// deployment that originated the login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchState {
    pub issuer: String,
    pub client_id: String,
    pub deployment_id: String,
    pub nonce: String,
    pub tenant_id: String,
    pub created_at: SystemTime,
}
