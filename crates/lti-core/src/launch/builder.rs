use std::sync::Arc;
use std::time::Duration;

use crate::crypto::{AsymmetricSigner, Verifier};
use crate::crypto::SignerVerifier;
use crate::domain::SessionClaims;
use crate::error::LtiError;
use crate::jwks::JwksResolver;
use crate::store::{EphemeralRegistry, InMemoryStore};

const DEFAULT_STATE_TTL: Duration = Duration::from_secs(5 * 60);
const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_DEEP_LINK_TTL: Duration = Duration::from_secs(60 * 60);
const DEFAULT_VERSION: &str = "1.3";

/// The fully-assembled LTI 1.3 launch state machine. Built via
/// [`LauncherBuilder`], which validates required fields once at
/// construction rather than on every request.
pub struct Launcher {
    pub(crate) base_url: String,
    pub(crate) version: String,
    pub(crate) redirect_url: String,
    pub(crate) audience: Vec<String>,
    pub(crate) signer: Arc<dyn SignerVerifier>,
    pub(crate) jwks_signer: Option<Arc<dyn AsymmetricSigner>>,
    pub(crate) store: Arc<dyn EphemeralRegistry>,
    pub(crate) jwks_resolver: Arc<JwksResolver>,
    pub(crate) state_ttl: Duration,
    pub(crate) session_ttl: Duration,
    pub(crate) deep_link_ttl: Duration,
    pub(crate) deep_linking_enabled: bool,
    pub(crate) incoming_verifier: Option<Arc<dyn Verifier>>,
    pub(crate) incoming_audience: Vec<String>,
    pub(crate) pre_seeded_session: Option<SessionClaims>,
}

impl Launcher {
    #[must_use]
    pub fn builder() -> LauncherBuilder {
        LauncherBuilder::default()
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    #[must_use]
    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    /// The session signer, handed to the session gate which only ever calls
    /// its `Verifier` half to check a cookie it already trusts.
    #[must_use]
    pub fn session_signer(&self) -> Arc<dyn SignerVerifier> {
        self.signer.clone()
    }

    #[must_use]
    pub fn jwks(&self) -> crate::domain::Jwks {
        self.jwks_signer.as_ref().map(|s| s.jwks()).unwrap_or_default()
    }

    #[must_use]
    pub fn impostering_enabled(&self) -> bool {
        self.incoming_verifier.is_some()
    }
}

/// Options-pattern builder for [`Launcher`]. Every setter takes `self` by
/// value so calls chain; [`LauncherBuilder::build`] is the single place that
/// rejects a misconfigured launcher, rather than failing deep inside request
/// handling.
#[derive(Default)]
pub struct LauncherBuilder {
    base_url: Option<String>,
    version: Option<String>,
    redirect_url: Option<String>,
    audience: Vec<String>,
    signer: Option<Arc<dyn SignerVerifier>>,
    jwks_signer: Option<Arc<dyn AsymmetricSigner>>,
    store: Option<Arc<dyn EphemeralRegistry>>,
    jwks_resolver: Option<Arc<JwksResolver>>,
    state_ttl: Option<Duration>,
    session_ttl: Option<Duration>,
    deep_link_ttl: Option<Duration>,
    deep_linking_enabled: bool,
    incoming_verifier: Option<Arc<dyn Verifier>>,
    incoming_audience: Vec<String>,
    pre_seeded_session: Option<SessionClaims>,
}

impl LauncherBuilder {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Where to send the browser after a non-deep-link launch. Defaults to
    /// `base_url + "/lti/app"`.
    #[must_use]
    pub fn with_redirect_url(mut self, redirect_url: impl Into<String>) -> Self {
        self.redirect_url = Some(redirect_url.into());
        self
    }

    #[must_use]
    pub fn with_audience(mut self, audience: Vec<String>) -> Self {
        self.audience = audience;
        self
    }

    #[must_use]
    pub fn with_signer(mut self, signer: Arc<dyn SignerVerifier>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Attaches an asymmetric signer whose public key is published at
    /// `/lti/.well-known/jwks.json`. Optional: an `HmacSigner` session
    /// signer has no public key to publish, and the endpoint then serves an
    /// empty key set.
    #[must_use]
    pub fn with_jwks_signer(mut self, signer: Arc<dyn AsymmetricSigner>) -> Self {
        self.jwks_signer = Some(signer);
        self
    }

    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn EphemeralRegistry>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn with_jwks_resolver(mut self, resolver: Arc<JwksResolver>) -> Self {
        self.jwks_resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_state_ttl(mut self, ttl: Duration) -> Self {
        self.state_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn with_deep_linking_enabled(mut self, enabled: bool) -> Self {
        self.deep_linking_enabled = enabled;
        self
    }

    /// Enables the impostering side channel (C7): seed tokens are verified
    /// against `verifier` and admitted only if their audience intersects
    /// `audience`.
    #[must_use]
    pub fn with_impostering(mut self, verifier: Arc<dyn Verifier>, audience: Vec<String>) -> Self {
        self.incoming_verifier = Some(verifier);
        self.incoming_audience = audience;
        self
    }

    /// Configures a fixture session that `handle_launch` mints unconditionally,
    /// bypassing the OIDC state lookup and `id_token` verification entirely.
    /// Intended for tests and demo seeding, never for a live deployment.
    #[must_use]
    pub fn with_preseeded_session(mut self, claims: SessionClaims) -> Self {
        self.pre_seeded_session = Some(claims);
        self
    }

    pub fn build(self) -> Result<Launcher, LtiError> {
        let base_url = self
            .base_url
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LtiError::Config("Launcher requires a non-empty base_url".into()))?;
        let signer = self
            .signer
            .ok_or_else(|| LtiError::Config("Launcher requires a signer".into()))?;
        if self.audience.is_empty() {
            return Err(LtiError::Config("Launcher requires a non-empty audience".into()));
        }

        let base_url = base_url.trim_end_matches('/').to_string();
        let redirect_url = self.redirect_url.unwrap_or_else(|| format!("{base_url}/lti/app"));

        Ok(Launcher {
            version: self.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            base_url,
            redirect_url,
            audience: self.audience,
            signer,
            jwks_signer: self.jwks_signer,
            store: self.store.unwrap_or_else(|| Arc::new(InMemoryStore::new())),
            jwks_resolver: self
                .jwks_resolver
                .unwrap_or_else(|| Arc::new(JwksResolver::new(reqwest::Client::new()))),
            state_ttl: self.state_ttl.unwrap_or(DEFAULT_STATE_TTL),
            session_ttl: self.session_ttl.unwrap_or(DEFAULT_SESSION_TTL),
            deep_link_ttl: self.deep_link_ttl.unwrap_or(DEFAULT_DEEP_LINK_TTL),
            deep_linking_enabled: self.deep_linking_enabled,
            incoming_verifier: self.incoming_verifier,
            incoming_audience: self.incoming_audience,
            pre_seeded_session: self.pre_seeded_session,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_missing_base_url() {
        let err = Launcher::builder()
            .with_audience(vec!["aud".into()])
            .build()
            .unwrap_err();
        assert!(matches!(err, LtiError::Config(_)));
    }

    #[test]
    fn rejects_missing_audience() {
        let err = Launcher::builder()
            .with_base_url("https://tool.example")
            .build()
            .unwrap_err();
        assert!(matches!(err, LtiError::Config(_)));
    }

    #[test]
    fn defaults_redirect_url_from_base_url() {
        let signer: Arc<dyn SignerVerifier> =
            Arc::new(crate::crypto::HmacSigner::new("kid", b"a-string-secret-at-least-256-bits-long".to_vec(), "tool.example"));
        let launcher = Launcher::builder()
            .with_base_url("https://tool.example")
            .with_audience(vec!["aud".into()])
            .with_signer(signer)
            .build()
            .expect("builds");
        assert_eq!(launcher.redirect_url, "https://tool.example/lti/app");
    }
}
