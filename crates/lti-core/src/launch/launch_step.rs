use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore as _;

use super::{LaunchOutcome, LaunchRequest, Launcher};
use crate::domain::{
    CourseInfo, DeepLinkContext, DeepLinkingSettingsClaim, LaunchType, Role, SessionClaims, ToolPlatform, UserInfo,
};
use crate::crypto::Signer as _;
use crate::error::LtiError;
use crate::jwks::has_unsupported_crit_header;
use crate::store::{EphemeralStore, Registry};

const CLAIM_MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
const CLAIM_CONTEXT: &str = "https://purl.imsglobal.org/spec/lti/claim/context";
const CLAIM_ROLES: &str = "https://purl.imsglobal.org/spec/lti/claim/roles";
const CLAIM_CUSTOM: &str = "https://purl.imsglobal.org/spec/lti/claim/custom";
const CLAIM_TOOL_PLATFORM: &str = "https://purl.imsglobal.org/spec/lti/claim/tool_platform";
const CLAIM_RESOURCE_LINK: &str = "https://purl.imsglobal.org/spec/lti/claim/resource_link";
const CLAIM_DEEP_LINKING_SETTINGS: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/deep_linking_settings";

fn random_id(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

impl Launcher {
    /// Step 2 of the handshake: verifies the platform's `id_token` against
    /// the state saved during `handle_oidc` and mints a tool session.
    pub async fn handle_launch(&self, req: &LaunchRequest) -> Result<LaunchOutcome, LtiError> {
        if let Some(preseeded) = &self.pre_seeded_session {
            return self.mint_session(preseeded.clone()).await.map(|(session_token, claims)| {
                LaunchOutcome::Session { session_token, claims }
            });
        }

        if req.id_token.is_empty() || req.state.is_empty() {
            return Err(LtiError::RequestMalformed("launch requires id_token and state".into()));
        }

        let state = self.store.get_state(&req.state).await?;
        self.store.delete_state(&req.state).await?;

        let deployment = self
            .store
            .get_deployment(&state.client_id, &state.deployment_id)
            .await?;

        if has_unsupported_crit_header(&req.id_token)? {
            return Err(LtiError::AuthFailure("id_token uses an unsupported crit header".into()));
        }
        let header = jsonwebtoken::decode_header(&req.id_token)
            .map_err(|e| LtiError::AuthFailure(format!("malformed id_token header: {e}")))?;
        let kid = header
            .kid
            .ok_or_else(|| LtiError::AuthFailure("id_token header is missing kid".into()))?;

        let (decoding_key, algorithm) = self.jwks_resolver.resolve(&deployment.jwks_url, &kid).await?;
        let mut validation = jsonwebtoken::Validation::new(algorithm);
        validation.set_issuer(&[deployment.issuer.as_str()]);
        validation.set_audience(&[deployment.client_id.as_str()]);
        let decoded = jsonwebtoken::decode::<serde_json::Value>(&req.id_token, &decoding_key, &validation)
            .map_err(|e| LtiError::AuthFailure(format!("id_token failed verification: {e}")))?;
        let claims = decoded.claims;

        let nonce = claims.get("nonce").and_then(|v| v.as_str()).unwrap_or_default();
        if nonce != state.nonce {
            return Err(LtiError::AuthFailure("id_token nonce does not match launch state".into()));
        }

        let message_type = claims
            .get(CLAIM_MESSAGE_TYPE)
            .and_then(|v| v.as_str())
            .ok_or_else(|| LtiError::RequestMalformed("id_token is missing message_type".into()))?;
        let launch_type = LaunchType::from_message_type(message_type)
            .ok_or_else(|| LtiError::RequestMalformed(format!("unsupported message_type {message_type}")))?;
        if launch_type == LaunchType::DeepLinking && !self.deep_linking_enabled {
            return Err(LtiError::Forbidden("deep linking is not enabled for this tool".into()));
        }

        let session_claims = self.build_session_claims(&state, &deployment, &claims, launch_type);
        let (session_token, minted) = self.mint_session(session_claims).await?;

        if launch_type == LaunchType::DeepLinking {
            let deep_link = self.capture_deep_link_context(&claims, &deployment, &minted)?;
            let deep_link_token = self.sign_deep_link_context(&deep_link).await?;
            return Ok(LaunchOutcome::DeepLinkCapture {
                session_token,
                claims: minted,
                deep_link_token,
                deep_link,
            });
        }

        Ok(LaunchOutcome::Session { session_token, claims: minted })
    }

    fn build_session_claims(
        &self,
        state: &crate::domain::LaunchState,
        deployment: &crate::domain::Deployment,
        claims: &serde_json::Value,
        launch_type: LaunchType,
    ) -> SessionClaims {
        let roles = claims
            .get(CLAIM_ROLES)
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).map(Role::parse_uri).collect())
            .unwrap_or_default();

        let context = claims.get(CLAIM_CONTEXT);
        let course_info = CourseInfo {
            id: context.and_then(|c| c.get("id")).and_then(|v| v.as_str()).map(str::to_string),
            label: context.and_then(|c| c.get("label")).and_then(|v| v.as_str()).map(str::to_string),
            title: context.and_then(|c| c.get("title")).and_then(|v| v.as_str()).map(str::to_string),
        };

        let user_info = UserInfo {
            user_id: claims.get("sub").and_then(|v| v.as_str()).map(str::to_string),
            name: claims.get("name").and_then(|v| v.as_str()).map(str::to_string),
            given_name: claims.get("given_name").and_then(|v| v.as_str()).map(str::to_string),
            family_name: claims.get("family_name").and_then(|v| v.as_str()).map(str::to_string),
            middle_name: claims.get("middle_name").and_then(|v| v.as_str()).map(str::to_string),
            picture: claims.get("picture").and_then(|v| v.as_str()).map(str::to_string),
            email: claims.get("email").and_then(|v| v.as_str()).map(str::to_string),
            locale: claims.get("locale").and_then(|v| v.as_str()).map(str::to_string),
        };

        let platform = claims.get(CLAIM_TOOL_PLATFORM).map(|p| ToolPlatform {
            guid: p.get("guid").and_then(|v| v.as_str()).map(str::to_string),
            name: p.get("name").and_then(|v| v.as_str()).map(str::to_string),
            product_family_code: p.get("product_family_code").and_then(|v| v.as_str()).map(str::to_string),
            url: p.get("url").and_then(|v| v.as_str()).map(str::to_string),
            version: p.get("version").and_then(|v| v.as_str()).map(str::to_string),
        });

        let linked_resource_id = claims
            .get(CLAIM_RESOURCE_LINK)
            .and_then(|rl| rl.get("id"))
            .and_then(|v| v.as_str())
            .map(str::to_string);

        let custom = claims
            .get(CLAIM_CUSTOM)
            .and_then(|v| v.as_object())
            .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();

        SessionClaims {
            tenant_id: state.tenant_id.clone(),
            deployment_id: deployment.deployment_id.clone(),
            client_id: deployment.client_id.clone(),
            roles,
            user_info,
            course_info,
            launch_type: Some(launch_type),
            linked_resource_id,
            platform,
            custom,
            impostering: false,
            impostering_src: None,
            imposter_launch_redirect: None,
            iss: None,
            aud: Vec::new(),
            iat: None,
            nbf: None,
            exp: None,
            jti: None,
        }
    }

    /// Fills the registered claims (`iss`/`aud`/`iat`/`nbf`/`exp`/`jti`) and
    /// signs, returning the compact token and the claims as actually minted.
    pub(super) async fn mint_session(
        &self,
        mut claims: SessionClaims,
    ) -> Result<(String, SessionClaims), LtiError> {
        let now = crate::crypto::now_unix();
        claims.iss = Some(self.signer.issuer().to_string());
        claims.aud = self.audience.clone();
        claims.iat = Some(now);
        claims.nbf = Some(now - 1);
        claims.exp = Some(now + i64::try_from(self.session_ttl.as_secs()).unwrap_or(i64::MAX));
        claims.jti = Some(random_id(16));

        let value = serde_json::to_value(&claims)
            .map_err(|e| LtiError::Upstream(format!("encode session claims: {e}")))?;
        let token = self.signer.sign(value, std::time::Duration::ZERO).await?;
        Ok((token, claims))
    }

    fn capture_deep_link_context(
        &self,
        claims: &serde_json::Value,
        deployment: &crate::domain::Deployment,
        session: &SessionClaims,
    ) -> Result<DeepLinkContext, LtiError> {
        let raw = claims
            .get(CLAIM_DEEP_LINKING_SETTINGS)
            .ok_or_else(|| LtiError::RequestMalformed("deep link launch is missing deep_linking_settings".into()))?;
        let settings: DeepLinkingSettingsClaim = serde_json::from_value(raw.clone())
            .map_err(|e| LtiError::RequestMalformed(format!("invalid deep_linking_settings: {e}")))?;

        let nonce = claims.get("nonce").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let jti = session
            .jti
            .clone()
            .ok_or_else(|| LtiError::Upstream("session is missing jti when capturing deep link context".into()))?;

        Ok(DeepLinkContext {
            nonce,
            return_aud: deployment.issuer.clone(),
            return_url: settings.deep_link_return_url,
            data: settings.data,
            accept_types: settings.accept_types,
            accept_targets: settings.accept_presentation_document_targets,
            auto_create: settings.auto_create,
            accept_media_types: settings.accept_media_types,
            attached_kid: jti,
            iss: None,
            iat: None,
            nbf: None,
            exp: None,
            jti: None,
        })
    }

    async fn sign_deep_link_context(&self, ctx: &DeepLinkContext) -> Result<String, LtiError> {
        let now = crate::crypto::now_unix();
        let mut ctx = ctx.clone();
        ctx.iss = Some(self.signer.issuer().to_string());
        ctx.iat = Some(now);
        ctx.nbf = Some(now - 10);
        ctx.exp = Some(now + i64::try_from(self.deep_link_ttl.as_secs()).unwrap_or(i64::MAX));
        ctx.jti = Some(random_id(16));

        let value = serde_json::to_value(&ctx)
            .map_err(|e| LtiError::Upstream(format!("encode deep link context: {e}")))?;
        self.signer.sign(value, std::time::Duration::ZERO).await
    }
}
