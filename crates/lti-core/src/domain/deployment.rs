use serde::{Deserialize, Serialize};

/// One registered integration of this tool with a platform tenant.
///
/// Looked up by the pair `(client_id, deployment_id)`; immutable once registered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    pub internal_id: String,
    pub tenant_id: String,
    pub issuer: String,
    pub client_id: String,
    pub deployment_id: String,
    pub jwks_url: String,
    pub auth_endpoint: String,
    pub token_endpoint: String,
}

impl Deployment {
    #[must_use]
    pub fn registry_key(client_id: &str, deployment_id: &str) -> String {
        format!("{client_id}|{deployment_id}")
    }
}
