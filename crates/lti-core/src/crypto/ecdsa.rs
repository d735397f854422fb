use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use elliptic_curve::pkcs8::EncodePublicKey as _;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use signature::{Signer as _, Verifier as _};
use std::time::Duration;

use super::{AsymmetricSigner, AsymmetricVerifier, Signer, Verifier, apply_registered_defaults};
use crate::domain::{Jwk, Jwks};
use crate::error::LtiError;

fn ec_jwk(crv: &str, alg: &str, kid: &str, x: &[u8], y: &[u8]) -> Jwk {
    Jwk {
        kty: "EC".into(),
        crv: Some(crv.into()),
        use_: Some("sig".into()),
        alg: Some(alg.into()),
        kid: Some(kid.into()),
        x: Some(URL_SAFE_NO_PAD.encode(x)),
        y: Some(URL_SAFE_NO_PAD.encode(y)),
        n: None,
        e: None,
    }
}

macro_rules! jsonwebtoken_ec_signer {
    ($name:ident, $curve:ty, $algorithm:expr, $crv_name:literal, $alg_name:literal) => {
        /// A JOSE-header-enforced ECDSA signer/verifier on a NIST curve, delegating
        /// the actual signing operation to `jsonwebtoken`. Public point coordinates
        /// are parsed straight from the same key for JWKS publication.
        pub struct $name {
            key_id: String,
            issuer: String,
            encoding_key: EncodingKey,
            decoding_key: DecodingKey,
            jwks: Jwks,
        }

        impl $name {
            /// Builds a signer from a PKCS8 PEM-encoded EC private key.
            pub fn from_pkcs8_pem(
                key_id: impl Into<String>,
                issuer: impl Into<String>,
                private_key_pem: &str,
            ) -> Result<Self, LtiError> {
                use elliptic_curve::pkcs8::DecodePrivateKey as _;
                use elliptic_curve::sec1::ToEncodedPoint as _;

                let key_id = key_id.into();
                let secret_key = elliptic_curve::SecretKey::<$curve>::from_pkcs8_pem(private_key_pem)
                    .map_err(|e| LtiError::Config(format!("invalid EC private key: {e}")))?;
                let point = secret_key.public_key().to_encoded_point(false);
                let x = point
                    .x()
                    .ok_or_else(|| LtiError::Config("EC public key missing x coordinate".into()))?;
                let y = point
                    .y()
                    .ok_or_else(|| LtiError::Config("EC public key missing y coordinate".into()))?;
                let jwk = ec_jwk($crv_name, $alg_name, &key_id, x, y);

                let encoding_key = EncodingKey::from_ec_pem(private_key_pem.as_bytes())
                    .map_err(|e| LtiError::Config(format!("invalid EC private key for jsonwebtoken: {e}")))?;
                let public_pem = secret_key
                    .public_key()
                    .to_public_key_pem(elliptic_curve::pkcs8::LineEnding::LF)
                    .map_err(|e| LtiError::Config(format!("re-encode EC public key: {e}")))?;
                let decoding_key = DecodingKey::from_ec_pem(public_pem.as_bytes())
                    .map_err(|e| LtiError::Config(format!("invalid EC public key for jsonwebtoken: {e}")))?;

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
        impl Signer for $name {
            fn issuer(&self) -> &str {
                &self.issuer
            }

            async fn sign(&self, mut claims: serde_json::Value, ttl: Duration) -> Result<String, LtiError> {
                apply_registered_defaults(&mut claims, &self.issuer, ttl);
                let mut header = Header::new($algorithm);
                header.kid = Some(self.key_id.clone());
                jsonwebtoken::encode(&header, &claims, &self.encoding_key)
                    .map_err(|e| LtiError::Upstream(format!("sign {} token: {e}", $alg_name)))
            }
        }

        #[async_trait]
        impl Verifier for $name {
            async fn verify(&self, token: &str) -> Result<serde_json::Value, LtiError> {
                let validation = Validation::new($algorithm);
                let data = jsonwebtoken::decode::<serde_json::Value>(token, &self.decoding_key, &validation)
                    .map_err(|e| LtiError::AuthFailure(format!("invalid token: {e}")))?;
                Ok(data.claims)
            }
        }

        impl AsymmetricSigner for $name {
            fn jwks(&self) -> Jwks {
                self.jwks.clone()
            }
        }

        impl AsymmetricVerifier for $name {
            fn jwks(&self) -> Jwks {
                self.jwks.clone()
            }
        }
    };
}

jsonwebtoken_ec_signer!(Es256Signer, p256::NistP256, Algorithm::ES256, "P-256", "ES256");
jsonwebtoken_ec_signer!(Es384Signer, p384::NistP384, Algorithm::ES384, "P-384", "ES384");

/// ES512 on the P-521 curve. `jsonwebtoken` has no P-521 backend, so the JWS
/// is built by hand: compact-serialize the header and payload, sign the
/// signing input with a raw (r, s) ECDSA signature over SHA-512, and encode
/// r and s each as a 66-byte big-endian, zero-padded field per RFC 7518 §3.4.
pub struct Es512Signer {
    key_id: String,
    issuer: String,
    signing_key: p521::ecdsa::SigningKey,
    verifying_key: p521::ecdsa::VerifyingKey,
    jwks: Jwks,
}

const P521_FIELD_BYTES: usize = 66;

impl Es512Signer {
    pub fn from_pkcs8_pem(
        key_id: impl Into<String>,
        issuer: impl Into<String>,
        private_key_pem: &str,
    ) -> Result<Self, LtiError> {
        use elliptic_curve::pkcs8::DecodePrivateKey as _;
        use elliptic_curve::sec1::ToEncodedPoint as _;

        let key_id = key_id.into();
        let secret_key = p521::SecretKey::from_pkcs8_pem(private_key_pem)
            .map_err(|e| LtiError::Config(format!("invalid P-521 private key: {e}")))?;
        let signing_key =
            p521::ecdsa::SigningKey::from(ecdsa::SigningKey::<p521::NistP521>::from(secret_key.clone()));

        let point = secret_key.public_key().to_encoded_point(false);
        let verifying_key = p521::ecdsa::VerifyingKey::from_encoded_point(&point)
            .map_err(|e| LtiError::Config(format!("invalid P-521 public key: {e}")))?;
        let x = point
            .x()
            .ok_or_else(|| LtiError::Config("EC public key missing x coordinate".into()))?;
        let y = point
            .y()
            .ok_or_else(|| LtiError::Config("EC public key missing y coordinate".into()))?;
        let jwk = ec_jwk("P-521", "ES512", &key_id, x, y);

        Ok(Self {
            key_id,
            issuer: issuer.into(),
            signing_key,
            verifying_key,
            jwks: Jwks { keys: vec![jwk] },
        })
    }
}

#[async_trait]
impl Signer for Es512Signer {
    fn issuer(&self) -> &str {
        &self.issuer
    }

    async fn sign(&self, mut claims: serde_json::Value, ttl: Duration) -> Result<String, LtiError> {
        apply_registered_defaults(&mut claims, &self.issuer, ttl);

        let header = serde_json::json!({"alg": "ES512", "typ": "JWT", "kid": self.key_id});
        let header_b64 = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&header).map_err(|e| LtiError::Upstream(format!("encode jwt header: {e}")))?,
        );
        let payload_b64 = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims).map_err(|e| LtiError::Upstream(format!("encode jwt payload: {e}")))?,
        );
        let signing_input = format!("{header_b64}.{payload_b64}");

        let signature: ecdsa::Signature<p521::NistP521> = self.signing_key.sign(signing_input.as_bytes());
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.to_bytes());

        Ok(format!("{signing_input}.{sig_b64}"))
    }
}

#[async_trait]
impl Verifier for Es512Signer {
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
        if header.get("alg").and_then(|v| v.as_str()) != Some("ES512") {
            return Err(LtiError::AuthFailure("unexpected signing algorithm".into()));
        }

        let sig_bytes = URL_SAFE_NO_PAD
            .decode(sig_b64)
            .map_err(|_| LtiError::AuthFailure("invalid token signature encoding".into()))?;
        if sig_bytes.len() != P521_FIELD_BYTES * 2 {
            return Err(LtiError::AuthFailure("invalid token signature length".into()));
        }
        let signature = ecdsa::Signature::<p521::NistP521>::from_slice(&sig_bytes)
            .map_err(|_| LtiError::AuthFailure("invalid token signature".into()))?;

        let signing_input = format!("{header_b64}.{payload_b64}");
        self.verifying_key
            .verify(signing_input.as_bytes(), &signature)
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

        Ok(claims)
    }
}

impl AsymmetricSigner for Es512Signer {
    fn jwks(&self) -> Jwks {
        self.jwks.clone()
    }
}

impl AsymmetricVerifier for Es512Signer {
    fn jwks(&self) -> Jwks {
        self.jwks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn es256_pem() -> String {
        let secret = p256::SecretKey::random(&mut rand::thread_rng());
        use elliptic_curve::pkcs8::EncodePrivateKey as _;
        secret
            .to_pkcs8_pem(elliptic_curve::pkcs8::LineEnding::LF)
            .expect("encode pkcs8")
            .to_string()
    }

    fn es512_pem() -> String {
        let secret = p521::SecretKey::random(&mut rand::thread_rng());
        use elliptic_curve::pkcs8::EncodePrivateKey as _;
        secret
            .to_pkcs8_pem(elliptic_curve::pkcs8::LineEnding::LF)
            .expect("encode pkcs8")
            .to_string()
    }

    #[tokio::test]
    async fn es256_roundtrips() {
        let pem = es256_pem();
        let signer = Es256Signer::from_pkcs8_pem("kid-256", "tool.example", &pem).expect("build signer");
        let token = signer
            .sign(serde_json::json!({"sub": "u1"}), Duration::from_secs(60))
            .await
            .expect("sign");
        let claims = signer.verify(&token).await.expect("verify");
        assert_eq!(claims["sub"], "u1");
    }

    #[tokio::test]
    async fn es512_roundtrips_and_publishes_jwks() {
        let pem = es512_pem();
        let signer = Es512Signer::from_pkcs8_pem("kid-512", "tool.example", &pem).expect("build signer");
        let token = signer
            .sign(serde_json::json!({"sub": "u1"}), Duration::from_secs(60))
            .await
            .expect("sign");
        let claims = signer.verify(&token).await.expect("verify");
        assert_eq!(claims["sub"], "u1");

        let jwks = AsymmetricSigner::jwks(&signer);
        assert_eq!(jwks.keys[0].crv.as_deref(), Some("P-521"));
        assert_eq!(jwks.keys[0].alg.as_deref(), Some("ES512"));
    }

    #[tokio::test]
    async fn es512_rejects_algorithm_substitution() {
        let pem = es512_pem();
        let signer = Es512Signer::from_pkcs8_pem("kid-512", "tool.example", &pem).expect("build signer");
        let token = signer
            .sign(serde_json::json!({"sub": "u1"}), Duration::from_secs(60))
            .await
            .unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let none_header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        parts[0] = Box::leak(none_header.into_boxed_str());
        let forged = parts.join(".");
        assert!(signer.verify(&forged).await.is_err());
    }
}
