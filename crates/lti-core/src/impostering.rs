//! The operator-driven session-spoofing side channel (C7): a seed token,
//! signed by a separately-configured incoming verifier, is exchanged for a
//! real tool session without going through the LMS handshake at all.

use std::sync::Arc;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore as _;

use crate::crypto::{Signer as _, SignerVerifier, Verifier as _};
use crate::domain::SessionClaims;
use crate::error::LtiError;

const SESSION_TTL: Duration = Duration::from_secs(60 * 60);
const REQUIRED_REDIRECT_PREFIX: &str = "/lti/app";

/// Verifies externally-signed seed tokens and re-mints them as session
/// tokens under this tool's own signer.
pub struct ImposteringService {
    incoming_verifier: Arc<dyn crate::crypto::Verifier>,
    incoming_audience: Vec<String>,
    session_signer: Arc<dyn SignerVerifier>,
    session_audience: Vec<String>,
}

/// The outcome of a successful impersonation: the minted session plus the
/// redirect path the seed token requested.
pub struct ImposteringOutcome {
    pub session_token: String,
    pub claims: SessionClaims,
    pub redirect_to: String,
}

impl ImposteringService {
    #[must_use]
    pub fn new(
        incoming_verifier: Arc<dyn crate::crypto::Verifier>,
        incoming_audience: Vec<String>,
        session_signer: Arc<dyn SignerVerifier>,
        session_audience: Vec<String>,
    ) -> Self {
        Self { incoming_verifier, incoming_audience, session_signer, session_audience }
    }

    pub async fn handle(&self, seed_token: &str) -> Result<ImposteringOutcome, LtiError> {
        let verified = self.incoming_verifier.verify(seed_token).await?;
        let mut claims: SessionClaims = serde_json::from_value(verified)
            .map_err(|e| LtiError::AuthFailure(format!("seed token has malformed claims: {e}")))?;

        if !claims.impostering {
            return Err(LtiError::Forbidden("seed token is not marked for impostering".into()));
        }
        if claims.impostering_src.as_deref().unwrap_or_default().is_empty() {
            return Err(LtiError::Forbidden("seed token is missing impostering_src".into()));
        }
        let redirect_to = claims
            .imposter_launch_redirect
            .clone()
            .filter(|r| r.starts_with(REQUIRED_REDIRECT_PREFIX))
            .ok_or_else(|| LtiError::Forbidden("seed token has no valid imposter_launch_redirect".into()))?;
        if !claims.audience_intersects(&self.incoming_audience) {
            return Err(LtiError::Forbidden("seed token audience does not match the incoming audience".into()));
        }

        let audit_src = claims.impostering_src.clone().unwrap_or_default();
        let audit_user = claims.user_info.user_id.clone().unwrap_or_default();

        let now = crate::crypto::now_unix();
        claims.aud = self.session_audience.clone();
        claims.jti = Some(random_jti());
        claims.imposter_launch_redirect = None;
        claims.iss = Some(self.session_signer.issuer().to_string());
        claims.iat = Some(now);
        claims.nbf = Some(now);
        claims.exp = Some(now + i64::try_from(SESSION_TTL.as_secs()).unwrap_or(i64::MAX));

        let value = serde_json::to_value(&claims)
            .map_err(|e| LtiError::Upstream(format!("encode impostered session claims: {e}")))?;
        let session_token = self.session_signer.sign(value, Duration::ZERO).await?;

        tracing::info!(
            impostering_src = %audit_src,
            user_id = %audit_user,
            jti = %claims.jti.as_deref().unwrap_or_default(),
            "impostering session minted"
        );

        Ok(ImposteringOutcome { session_token, claims, redirect_to })
    }
}

fn random_jti() -> String {
    let mut buf = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}
