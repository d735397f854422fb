//! Route table (C9): wires the OIDC/launch handshake, JWKS publication, the
//! optional impostering side channel, and the session gate into one
//! [`axum::Router`]. Flattened rather than hidden behind an options struct:
//! a caller builds the pieces, then `mux::build` assembles the table.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Form, Query, State},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use crate::domain::Jwks;
use crate::error::LtiError;
use crate::impostering::ImposteringService;
use crate::launch::{LaunchOutcome, LaunchRequest, Launcher, OidcRequest};
use crate::session::{DEEP_LINK_COOKIE, SESSION_COOKIE, SessionGateState, require_role, verify_session};

const SESSION_COOKIE_PATH: &str = "/lti/app/";

/// Everything a route handler needs. Cloned per request (cheap: every field
/// is an `Arc` or a small value), matching the corpus's `Arc<AppState>`
/// extension pattern.
#[derive(Clone)]
pub struct AppState {
    pub launcher: Arc<Launcher>,
    pub impostering: Option<Arc<ImposteringService>>,
}

#[derive(Deserialize)]
struct ImposterQuery {
    token: Option<String>,
}

/// Builds the full LTI route table under `/lti`, plus `app_routes` mounted
/// under `/lti/app` and gated by [`verify_session`] and, where `required`
/// roles are given, [`require_role`].
pub fn build(state: AppState, app_routes: Router<AppState>) -> Router {
    let version = state.launcher.version().to_string();

    let mut router = Router::new()
        .route(&format!("/lti/{version}/oidc"), post(handle_oidc))
        .route(&format!("/lti/{version}/launch"), post(handle_launch))
        .route("/lti/.well-known/jwks.json", get(handle_jwks));

    if state.impostering.is_some() {
        router = router.route("/lti/imposter", any(handle_imposter));
    }

    let gate_state = Arc::new(SessionGateState {
        verifier: state.launcher.session_signer(),
        audience: state.launcher.audience().to_vec(),
    });

    let gated_app = app_routes
        .layer(axum::middleware::from_fn(require_role(Vec::new())))
        .layer(axum::middleware::from_fn_with_state(gate_state, verify_session));

    router
        .nest("/lti/app", gated_app)
        .with_state(state)
        .fallback(not_found)
}

async fn not_found() -> Response {
    LtiError::NotFound("no route matches this request".into()).into_response()
}

async fn handle_oidc(
    State(state): State<AppState>,
    Form(req): Form<OidcRequest>,
) -> Result<Redirect, LtiError> {
    let redirect = state.launcher.handle_oidc(&req).await?;
    Ok(Redirect::to(&redirect))
}

async fn handle_launch(
    State(state): State<AppState>,
    Form(req): Form<LaunchRequest>,
) -> Result<Response, LtiError> {
    let outcome = state.launcher.handle_launch(&req).await?;
    Ok(outcome_to_response(&state.launcher, outcome))
}

fn outcome_to_response(launcher: &Launcher, outcome: LaunchOutcome) -> Response {
    let redirect_to = launcher.redirect_url().to_string();
    match outcome {
        LaunchOutcome::Session { session_token, .. } => {
            let jar = CookieJar::new().add(session_cookie(session_token));
            (jar, Redirect::to(&redirect_to)).into_response()
        }
        LaunchOutcome::DeepLinkCapture { session_token, deep_link_token, .. } => {
            let jar = CookieJar::new()
                .add(session_cookie(session_token))
                .add(deep_link_cookie(deep_link_token));
            (jar, Redirect::to(&redirect_to)).into_response()
        }
    }
}

async fn handle_jwks(State(state): State<AppState>) -> Json<Jwks> {
    Json(state.launcher.jwks())
}

async fn handle_imposter(
    State(state): State<AppState>,
    Query(params): Query<ImposterQuery>,
) -> Result<Response, LtiError> {
    let service = state
        .impostering
        .as_ref()
        .ok_or_else(|| LtiError::NotFound("impostering is not enabled for this tool".into()))?;
    let seed_token = params
        .token
        .ok_or_else(|| LtiError::RequestMalformed("missing token query parameter".into()))?;

    let outcome = service.handle(&seed_token).await?;
    let jar = CookieJar::new().add(session_cookie(outcome.session_token));
    Ok((jar, Redirect::to(&outcome.redirect_to)).into_response())
}

fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, value))
        .path(SESSION_COOKIE_PATH)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}

fn deep_link_cookie(value: String) -> Cookie<'static> {
    Cookie::build((DEEP_LINK_COOKIE, value))
        .path(SESSION_COOKIE_PATH)
        .http_only(true)
        .secure(true)
        .same_site(SameSite::None)
        .build()
}
