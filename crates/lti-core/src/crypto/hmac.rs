use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac as _};
use sha2::Sha256;
use std::time::Duration;
use zeroize::Zeroize as _;

use super::{Signer, Verifier, apply_registered_defaults};
use crate::error::LtiError;

type HmacSha256 = Hmac<Sha256>;

/// A symmetric HS256 signer/verifier, for tool-platform pairs that share a
/// pre-agreed secret instead of a published key. Also the incoming-side
/// verifier typically used to gate the impostering side-channel.
pub struct HmacSigner {
    key: Vec<u8>,
    key_id: String,
    issuer: String,
}

impl HmacSigner {
    #[must_use]
    pub fn new(key_id: impl Into<String>, secret: impl Into<Vec<u8>>, issuer: impl Into<String>) -> Self {
        Self {
            key: secret.into(),
            key_id: key_id.into(),
            issuer: issuer.into(),
        }
    }

    fn mac(&self) -> Result<HmacSha256, LtiError> {
        HmacSha256::new_from_slice(&self.key)
            .map_err(|_| LtiError::Config("invalid HMAC key length".into()))
    }
}

impl Drop for HmacSigner {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[async_trait]
impl Signer for HmacSigner {
    fn issuer(&self) -> &str {
        &self.issuer
    }

    async fn sign(&self, mut claims: serde_json::Value, ttl: Duration) -> Result<String, LtiError> {
        apply_registered_defaults(&mut claims, &self.issuer, ttl);

        let header = serde_json::json!({"alg": "HS256", "typ": "JWT", "kid": self.key_id});
        let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).map_err(|e| {
            LtiError::Upstream(format!("encode jwt header: {e}"))
        })?);
        let payload_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).map_err(|e| {
            LtiError::Upstream(format!("encode jwt payload: {e}"))
        })?);

        let signing_input = format!("{header_b64}.{payload_b64}");
        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{signing_input}.{sig_b64}"))
    }
}

#[async_trait]
impl Verifier for HmacSigner {
    async fn verify(&self, token: &str) -> Result<serde_json::Value, LtiError> {
        let mut parts = token.split('.');
        let (header_b64, payload_b64, sig_b64) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(LtiError::AuthFailure("malformed token".into())),
        };

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| LtiError::AuthFailure("invalid token header encoding".into()))?;
        let header: serde_json::Value = serde_json::from_slice(&header_json)
            .map_err(|_| LtiError::AuthFailure("invalid token header".into()))?;
        if header.get("alg").and_then(|v| v.as_str()) != Some("HS256") {
            return Err(LtiError::AuthFailure("unexpected signing algorithm".into()));
        }

        let signing_input = format!("{header_b64}.{payload_b64}");
        let got_sig = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| LtiError::AuthFailure("invalid token signature encoding".into()))?;

        let mut mac = self.mac()?;
        mac.update(signing_input.as_bytes());
        mac.verify_slice(&got_sig)
            .map_err(|_| LtiError::AuthFailure("invalid token signature".into()))?;

        let payload_json = URL_SAFE_NO_PAD
            .decode(payload_b64)
            .map_err(|_| LtiError::AuthFailure("invalid token payload encoding".into()))?;
        let claims: serde_json::Value = serde_json::from_slice(&payload_json)
            .map_err(|_| LtiError::AuthFailure("invalid token payload".into()))?;

        let now = super::now_unix();
        if let Some(exp) = claims.get("exp").and_then(serde_json::Value::as_i64)
            && now >= exp
        {
            return Err(LtiError::AuthFailure("token expired".into()));
        }
        if let Some(nbf) = claims.get("nbf").and_then(serde_json::Value::as_i64)
            && now < nbf
        {
            return Err(LtiError::AuthFailure("token not yet valid".into()));
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn signs_and_verifies_roundtrip() {
        let signer = HmacSigner::new("kid-1", b"a-string-secret-at-least-256-bits-long".to_vec(), "tool.example");
        let token = signer
            .sign(serde_json::json!({"sub": "u1"}), Duration::from_secs(60))
            .await
            .expect("sign");

        let claims = signer.verify(&token).await.expect("verify");
        assert_eq!(claims["sub"], "u1");
        assert_eq!(claims["iss"], "tool.example");
    }

    #[tokio::test]
    async fn rejects_tampered_signature() {
        let signer = HmacSigner::new("kid-1", b"a-string-secret-at-least-256-bits-long".to_vec(), "tool.example");
        let token = signer
            .sign(serde_json::json!({"sub": "u1"}), Duration::from_secs(60))
            .await
            .expect("sign");
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(signer.verify(&tampered).await.is_err());
    }

    #[tokio::test]
    async fn rejects_algorithm_substitution() {
        let signer = HmacSigner::new("kid-1", b"secret-at-least-32-bytes-long!!".to_vec(), "tool.example");
        let mut parts = signer
            .sign(serde_json::json!({"sub": "u1"}), Duration::from_secs(60))
            .await
            .unwrap()
            .split('.')
            .map(ToString::to_string)
            .collect::<Vec<_>>();
        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        parts[0] = none_header;
        let forged = format!("{}.{}.{}", parts[0], parts[1], parts[2]);
        assert!(signer.verify(&forged).await.is_err());
    }
}
