//! Session middleware and role gate (C8): `verify_session` authenticates the
//! `lti_session` cookie and attaches a [`RequestSession`] extension;
//! `require_role` reads that extension and rejects requests lacking any of
//! the given roles. Composed outer-to-inner as
//! `verify_session -> require_role -> handler`, matching the corpus's
//! `Extension<Arc<State>>` convention for request-scoped state.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

use crate::crypto::{SignerVerifier, Verifier};
use crate::domain::{DeepLinkContext, Role, SessionClaims};
use crate::error::LtiError;

pub const SESSION_COOKIE: &str = "lti_session";
pub const DEEP_LINK_COOKIE: &str = "lti_deep_link";

/// Everything `verify_session` pulls out of the session (and, for deep-link
/// launches, the deep-link) cookies and attaches to the request.
#[derive(Clone)]
pub struct RequestSession {
    pub claims: SessionClaims,
    pub deep_link: Option<DeepLinkContext>,
    pub raw_token: String,
}

/// Shared state the `verify_session` middleware needs: the verifier for the
/// session cookie and the audience it must intersect.
pub struct SessionGateState {
    pub verifier: Arc<dyn SignerVerifier>,
    pub audience: Vec<String>,
}

pub async fn verify_session(
    State(state): State<Arc<SessionGateState>>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, LtiError> {
    let raw_token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| LtiError::AuthFailure("missing session cookie".into()))?;

    let verified = state.verifier.verify(&raw_token).await?;
    let claims: SessionClaims = serde_json::from_value(verified)
        .map_err(|e| LtiError::AuthFailure(format!("session cookie has malformed claims: {e}")))?;

    if !claims.audience_intersects(&state.audience) {
        return Err(LtiError::AuthFailure("session audience does not match this tool".into()));
    }

    let deep_link = if claims.launch_type == Some(crate::domain::LaunchType::DeepLinking) {
        let dl_token = jar
            .get(DEEP_LINK_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| LtiError::AuthFailure("missing deep link cookie for a deep-link session".into()))?;
        let verified_dl = state.verifier.verify(&dl_token).await?;
        let ctx: DeepLinkContext = serde_json::from_value(verified_dl)
            .map_err(|e| LtiError::AuthFailure(format!("deep link cookie has malformed claims: {e}")))?;
        let session_jti = claims.jti.as_deref().unwrap_or_default();
        if ctx.attached_kid != session_jti {
            return Err(LtiError::AuthFailure("deep link cookie is not bound to this session".into()));
        }
        Some(ctx)
    } else {
        None
    };

    req.extensions_mut().insert(RequestSession { claims, deep_link, raw_token });
    Ok(next.run(req).await)
}

/// A `from_fn` layer factory: wraps `next` so the request is admitted only
/// if the attached [`RequestSession`] holds at least one of `required`
/// (or `required` is empty).
pub fn require_role(
    required: Vec<Role>,
) -> impl Fn(Request, Next) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Response, LtiError>> + Send>> + Clone {
    move |req: Request, next: Next| {
        let required = required.clone();
        Box::pin(async move {
            let admitted = req
                .extensions()
                .get::<RequestSession>()
                .ok_or_else(|| LtiError::AuthFailure("no session attached to request".into()))?
                .claims
                .has_any_role(&required);
            if !admitted {
                return Err(LtiError::Forbidden("session lacks a required role".into()));
            }
            Ok(next.run(req).await)
        })
    }
}
