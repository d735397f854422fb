use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore as _;

use super::{Launcher, OidcRequest};
use crate::domain::LaunchState;
use crate::error::LtiError;
use crate::store::{EphemeralStore, Registry};

fn random_url_safe_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

impl Launcher {
    /// Step 1 of the handshake: validates the third-party-initiated login
    /// request and returns the URL to redirect the browser to.
    pub async fn handle_oidc(&self, req: &OidcRequest) -> Result<String, LtiError> {
        let deployment = self
            .store
            .get_deployment(&req.client_id, &req.lti_deployment_id)
            .await?;

        if req.iss != deployment.issuer {
            return Err(LtiError::AuthFailure(format!(
                "oidc iss {} does not match registered issuer for this deployment",
                req.iss
            )));
        }

        let expected_prefix = format!("{}/lti/", self.base_url);
        if !req.target_link_uri.starts_with(&expected_prefix) {
            return Err(LtiError::RequestMalformed(
                "target_link_uri is not under this tool's launch path".into(),
            ));
        }

        let state_id = random_url_safe_token(32);
        let nonce = random_url_safe_token(32);

        let state = LaunchState {
            issuer: deployment.issuer.clone(),
            client_id: deployment.client_id.clone(),
            deployment_id: deployment.deployment_id.clone(),
            nonce: nonce.clone(),
            tenant_id: deployment.tenant_id.clone(),
            created_at: std::time::SystemTime::now(),
        };
        self.store.save_state(&state_id, state, self.state_ttl).await?;

        let mut url = reqwest::Url::parse(&deployment.auth_endpoint)
            .map_err(|e| LtiError::Config(format!("deployment auth_endpoint is not a valid URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "id_token")
                .append_pair("response_mode", "form_post")
                .append_pair("scope", "openid")
                .append_pair("client_id", &req.client_id)
                .append_pair("redirect_uri", &req.target_link_uri)
                .append_pair("login_hint", &req.login_hint)
                .append_pair("state", &state_id)
                .append_pair("nonce", &nonce);
            if let Some(hint) = &req.lti_message_hint {
                query.append_pair("lti_message_hint", hint);
            }
        }

        Ok(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Deployment;
    use std::sync::Arc;

    fn launcher() -> Launcher {
        let signer: Arc<dyn crate::crypto::SignerVerifier> = Arc::new(crate::crypto::HmacSigner::new(
            "kid",
            b"a-string-secret-at-least-256-bits-long".to_vec(),
            "tool.example",
        ));
        Launcher::builder()
            .with_base_url("https://tool.example")
            .with_audience(vec!["tool-aud".into()])
            .with_signer(signer)
            .build()
            .expect("builds")
    }

    #[tokio::test]
    async fn redirects_to_auth_endpoint_with_state_and_nonce() {
        let launcher = launcher();
        launcher
            .store
            .add_deployment(Deployment {
                internal_id: "dep-1".into(),
                tenant_id: "tenant-1".into(),
                issuer: "https://platform.example".into(),
                client_id: "client-1".into(),
                deployment_id: "deployment-1".into(),
                jwks_url: "https://platform.example/jwks".into(),
                auth_endpoint: "https://platform.example/auth".into(),
                token_endpoint: "https://platform.example/token".into(),
            })
            .await
            .unwrap();

        let redirect = launcher
            .handle_oidc(&OidcRequest {
                iss: "https://platform.example".into(),
                client_id: "client-1".into(),
                lti_deployment_id: "deployment-1".into(),
                login_hint: "user-1".into(),
                target_link_uri: "https://tool.example/lti/app/resource".into(),
                lti_message_hint: None,
            })
            .await
            .expect("handle_oidc");

        assert!(redirect.starts_with("https://platform.example/auth?"));
        assert!(redirect.contains("state="));
        assert!(redirect.contains("nonce="));
    }

    #[tokio::test]
    async fn rejects_issuer_mismatch() {
        let launcher = launcher();
        launcher
            .store
            .add_deployment(Deployment {
                internal_id: "dep-1".into(),
                tenant_id: "tenant-1".into(),
                issuer: "https://platform.example".into(),
                client_id: "client-1".into(),
                deployment_id: "deployment-1".into(),
                jwks_url: "https://platform.example/jwks".into(),
                auth_endpoint: "https://platform.example/auth".into(),
                token_endpoint: "https://platform.example/token".into(),
            })
            .await
            .unwrap();

        let err = launcher
            .handle_oidc(&OidcRequest {
                iss: "https://attacker.example".into(),
                client_id: "client-1".into(),
                lti_deployment_id: "deployment-1".into(),
                login_hint: "user-1".into(),
                target_link_uri: "https://tool.example/lti/app/resource".into(),
                lti_message_hint: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LtiError::AuthFailure(_)));
    }

    #[tokio::test]
    async fn rejects_target_link_uri_outside_launch_path() {
        let launcher = launcher();
        launcher
            .store
            .add_deployment(Deployment {
                internal_id: "dep-1".into(),
                tenant_id: "tenant-1".into(),
                issuer: "https://platform.example".into(),
                client_id: "client-1".into(),
                deployment_id: "deployment-1".into(),
                jwks_url: "https://platform.example/jwks".into(),
                auth_endpoint: "https://platform.example/auth".into(),
                token_endpoint: "https://platform.example/token".into(),
            })
            .await
            .unwrap();

        let err = launcher
            .handle_oidc(&OidcRequest {
                iss: "https://platform.example".into(),
                client_id: "client-1".into(),
                lti_deployment_id: "deployment-1".into(),
                login_hint: "user-1".into(),
                target_link_uri: "https://evil.example/phish".into(),
                lti_message_hint: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, LtiError::RequestMalformed(_)));
    }
}
