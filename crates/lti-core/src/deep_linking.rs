//! The authoring-time half of Deep Linking (C6): given the session and the
//! deep-link context captured at launch (see `launch::launch_step`), signs
//! an `LtiDeepLinkingResponse` JWT and renders the auto-posting form that
//! hands it back to the platform.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::crypto::{Signer as _, SignerVerifier};
use crate::domain::{DeepLinkContext, DeepLinkItem};
use crate::error::LtiError;

const DEEP_LINK_RESPONSE_TTL: Duration = Duration::from_secs(60);
const CLAIM_DEPLOYMENT_ID: &str = "https://purl.imsglobal.org/spec/lti/claim/deployment_id";
const CLAIM_MESSAGE_TYPE: &str = "https://purl.imsglobal.org/spec/lti/claim/message_type";
const CLAIM_VERSION: &str = "https://purl.imsglobal.org/spec/lti/claim/version";
const CLAIM_CONTENT_ITEMS: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/content_items";
const CLAIM_DATA: &str = "https://purl.imsglobal.org/spec/lti-dl/claim/data";

#[derive(Serialize)]
struct ReplyClaims<'a> {
    iss: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
    jti: String,
    nonce: &'a str,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/deployment_id")]
    deployment_id: &'a str,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/message_type")]
    message_type: &'static str,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti/claim/version")]
    version: &'static str,
    #[serde(rename = "https://purl.imsglobal.org/spec/lti-dl/claim/content_items")]
    content_items: &'a [DeepLinkItem],
    #[serde(rename = "https://purl.imsglobal.org/spec/lti-dl/claim/data")]
    data: &'a str,
}

/// Builds deep-link reply JWTs and their auto-posting HTML forms. Takes a
/// signer directly rather than a whole `Launcher` since replying happens
/// from an application handler, well after the launch that produced the
/// context it closes over.
pub struct DeepLinkingService {
    signer: Arc<dyn SignerVerifier>,
    deployment_id: String,
}

impl DeepLinkingService {
    #[must_use]
    pub fn new(signer: Arc<dyn SignerVerifier>, deployment_id: impl Into<String>) -> Self {
        Self { signer, deployment_id: deployment_id.into() }
    }

    /// Signs a deep-link response carrying `items`, echoing `ctx.nonce` and
    /// `ctx.data` back exactly as captured at launch.
    pub async fn reply(&self, ctx: &DeepLinkContext, items: &[DeepLinkItem]) -> Result<String, LtiError> {
        let now = crate::crypto::now_unix();
        let claims = ReplyClaims {
            iss: self.signer.issuer().to_string(),
            aud: &ctx.return_aud,
            iat: now,
            exp: now + i64::try_from(DEEP_LINK_RESPONSE_TTL.as_secs()).unwrap_or(i64::MAX),
            jti: format!("{}-{}", now, rand_suffix()),
            nonce: &ctx.nonce,
            deployment_id: &self.deployment_id,
            message_type: "LtiDeepLinkingResponse",
            version: "1.3.0",
            content_items: items,
            data: &ctx.data,
        };

        let value = serde_json::to_value(&claims)
            .map_err(|e| LtiError::Upstream(format!("encode deep link reply: {e}")))?;
        self.signer.sign(value, Duration::ZERO).await
    }

    /// Renders the self-submitting HTML form that POSTs `jwt` to
    /// `ctx.return_url`, matching the auto-redirect behavior the platform
    /// expects at the end of the deep-link authoring flow.
    #[must_use]
    pub fn render_return_form(ctx: &DeepLinkContext, jwt: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
<head><title>Returning to platform&hellip;</title></head>
<body onload="document.forms[0].submit()">
  <form action="{action}" method="POST">
    <input type="hidden" name="JWT" value="{jwt}">
    <noscript><button type="submit">Continue</button></noscript>
  </form>
</body>
</html>"#,
            action = html_escape(&ctx.return_url),
            jwt = html_escape(jwt),
        )
    }
}

fn rand_suffix() -> String {
    use rand::RngCore as _;
    let mut buf = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

fn html_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
