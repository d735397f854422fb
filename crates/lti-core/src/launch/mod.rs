//! The OIDC-initiation and launch-verification state machine (C5), plus its
//! options-pattern builder (C11). This is the core of the handshake: an
//! [`Launcher`] turns the platform's third-party-initiated login POST into a
//! redirect to the platform's authorization endpoint, then turns the
//! resulting `id_token` form-post into a signed tool session.

mod builder;
mod oidc_step;
mod launch_step;

pub use builder::{Launcher, LauncherBuilder};

use crate::domain::{DeepLinkContext, SessionClaims};
use serde::Deserialize;

/// Form fields of the platform's third-party-initiated login POST.
#[derive(Debug, Clone, Deserialize)]
pub struct OidcRequest {
    pub iss: String,
    pub client_id: String,
    pub lti_deployment_id: String,
    pub login_hint: String,
    pub target_link_uri: String,
    #[serde(default)]
    pub lti_message_hint: Option<String>,
}

/// Form fields of the `id_token` launch POST.
#[derive(Debug, Clone, Deserialize)]
pub struct LaunchRequest {
    pub id_token: String,
    pub state: String,
}

/// What to do with the response after a successful launch: either a plain
/// session (most launches) or a session plus a deep-link context cookie.
pub enum LaunchOutcome {
    Session {
        session_token: String,
        claims: SessionClaims,
    },
    DeepLinkCapture {
        session_token: String,
        claims: SessionClaims,
        deep_link_token: String,
        deep_link: DeepLinkContext,
    },
}
