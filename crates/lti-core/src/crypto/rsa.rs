use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rsa::RsaPrivateKey;
use rsa::pkcs1::{DecodeRsaPrivateKey as _, EncodeRsaPublicKey as _};
use rsa::traits::PublicKeyParts as _;
use std::time::Duration;

use super::{AsymmetricSigner, AsymmetricVerifier, Signer, Verifier, apply_registered_defaults};
use crate::domain::{Jwk, Jwks};
use crate::error::LtiError;

/// RS256 signer/verifier, backed by a PKCS1 RSA key pair. Publishes its
/// public modulus/exponent as a JWKS for platforms to fetch and cache.
pub struct RsaSigner {
    key_id: String,
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    jwks: Jwks,
}

impl RsaSigner {
    /// Builds a signer from a PKCS1 PEM-encoded RSA private key.
    pub fn from_pkcs1_pem(
        key_id: impl Into<String>,
        issuer: impl Into<String>,
        private_key_pem: &str,
    ) -> Result<Self, LtiError> {
        let key_id = key_id.into();
        let private_key = RsaPrivateKey::from_pkcs1_pem(private_key_pem)
            .map_err(|e| LtiError::Config(format!("invalid RSA private key: {e}")))?;
        let public_key = private_key.to_public_key();

        let n_bytes = public_key.n().to_bytes_be();
        let e_bytes = public_key.e().to_bytes_be();
        let jwk = Jwk {
            kty: "RSA".into(),
            crv: None,
            use_: Some("sig".into()),
            alg: Some("RS256".into()),
            kid: Some(key_id.clone()),
            x: None,
            y: None,
            n: Some(URL_SAFE_NO_PAD.encode(n_bytes)),
            e: Some(URL_SAFE_NO_PAD.encode(e_bytes)),
        };

        let encoding_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes())
            .map_err(|e| LtiError::Config(format!("invalid RSA private key for jsonwebtoken: {e}")))?;
        let public_pem = public_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .map_err(|e| LtiError::Config(format!("re-encode RSA public key: {e}")))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| LtiError::Config(format!("invalid RSA public key for jsonwebtoken: {e}")))?;

        Ok(Self {
            key_id,
            issuer: issuer.into(),
            encoding_key,
            decoding_key,
            jwks: Jwks { keys: vec![jwk] },
        })
    }
}

#[async_trait]
impl Signer for RsaSigner {
    fn issuer(&self) -> &str {
        &self.issuer
    }

    async fn sign(&self, mut claims: serde_json::Value, ttl: Duration) -> Result<String, LtiError> {
        apply_registered_defaults(&mut claims, &self.issuer, ttl);
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.key_id.clone());
        jsonwebtoken::encode(&header, &claims, &self.encoding_key)
            .map_err(|e| LtiError::Upstream(format!("sign RS256 token: {e}")))
    }
}

#[async_trait]
impl Verifier for RsaSigner {
    async fn verify(&self, token: &str) -> Result<serde_json::Value, LtiError> {
        let validation = Validation::new(Algorithm::RS256);
        let data = jsonwebtoken::decode::<serde_json::Value>(token, &self.decoding_key, &validation)
            .map_err(|e| LtiError::AuthFailure(format!("invalid token: {e}")))?;
        Ok(data.claims)
    }
}

impl AsymmetricSigner for RsaSigner {
    fn jwks(&self) -> Jwks {
        self.jwks.clone()
    }
}

impl AsymmetricVerifier for RsaSigner {
    fn jwks(&self) -> Jwks {
        self.jwks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPrivateKey as _;

    fn test_signer() -> RsaSigner {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, 2048).expect("generate key");
        let pem = private_key
            .to_pkcs1_pem(rsa::pkcs1::LineEnding::LF)
            .expect("encode pem");
        RsaSigner::from_pkcs1_pem("kid-rsa", "tool.example", &pem).expect("build signer")
    }

    #[tokio::test]
    async fn signs_and_verifies_roundtrip() {
        let signer = test_signer();
        let token = signer
            .sign(serde_json::json!({"sub": "u1"}), Duration::from_secs(60))
            .await
            .expect("sign");
        let claims = signer.verify(&token).await.expect("verify");
        assert_eq!(claims["sub"], "u1");
    }

    #[test]
    fn publishes_jwks_with_modulus_and_exponent() {
        let signer = test_signer();
        let jwks = AsymmetricSigner::jwks(&signer);
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].kty, "RSA");
        assert!(jwks.keys[0].n.is_some());
        assert!(jwks.keys[0].e.is_some());
    }
}
