use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use std::time::Duration;

use super::{AsymmetricSigner, AsymmetricVerifier, Signer, Verifier, apply_registered_defaults};
use crate::domain::{Jwk, Jwks};
use crate::error::LtiError;

/// The raw bytes of a detached signature plus the algorithm it was produced
/// under, as returned by a remote signing service (AWS KMS, a vault, an HSM).
pub struct RemoteSignature {
    pub alg: &'static str,
    pub bytes: Vec<u8>,
}

/// Public key material for a key held in a remote key service, already
/// shaped as the JWK fields this crate needs — the remote service, not this
/// crate, owns ASN.1 parsing of whatever format it returns keys in.
pub struct RemotePublicKey {
    pub crv: &'static str,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
}

/// The minimal surface this crate needs from a remote key-management
/// service: sign a digest under a named key, and fetch that key's public
/// material. Deliberately narrow, mirroring how the Go original kept its KMS
/// client interface to exactly the two calls `internal/adapters/crypto`
/// needed rather than wrapping a provider's full SDK.
#[async_trait]
pub trait RemoteKeyService: Send + Sync {
    async fn sign(&self, key_id: &str, message: &[u8]) -> Result<RemoteSignature, LtiError>;
    async fn public_key(&self, key_id: &str) -> Result<RemotePublicKey, LtiError>;
}

/// Signer/verifier that delegates the private-key operation to a
/// [`RemoteKeyService`] instead of holding key material in process memory.
/// Useful when keys live in a KMS or HSM and only ever produce signatures,
/// never raw bytes.
pub struct RemoteKmsSigner {
    key_id: String,
    issuer: String,
    service: Box<dyn RemoteKeyService>,
    alg: &'static str,
    jwks: Jwks,
}

impl RemoteKmsSigner {
    /// Fetches the key's public material once at construction, since
    /// [`AsymmetricSigner::jwks`] is synchronous but the key service is not.
    /// A key rotated at the remote service after this call won't be
    /// reflected until a new `RemoteKmsSigner` is built.
    pub async fn new(
        key_id: impl Into<String>,
        issuer: impl Into<String>,
        alg: &'static str,
        service: Box<dyn RemoteKeyService>,
    ) -> Result<Self, LtiError> {
        let key_id = key_id.into();
        let public_key = service.public_key(&key_id).await?;
        let jwk = Jwk {
            kty: "EC".into(),
            crv: Some(public_key.crv.to_string()),
            use_: Some("sig".into()),
            alg: Some(alg.to_string()),
            kid: Some(key_id.clone()),
            x: Some(URL_SAFE_NO_PAD.encode(public_key.x)),
            y: Some(URL_SAFE_NO_PAD.encode(public_key.y)),
            n: None,
            e: None,
        };
        Ok(Self {
            key_id,
            issuer: issuer.into(),
            service,
            alg,
            jwks: Jwks { keys: vec![jwk] },
        })
    }
}

#[async_trait]
impl Signer for RemoteKmsSigner {
    fn issuer(&self) -> &str {
        &self.issuer
    }

    async fn sign(&self, mut claims: serde_json::Value, ttl: Duration) -> Result<String, LtiError> {
        apply_registered_defaults(&mut claims, &self.issuer, ttl);

        let header = serde_json::json!({"alg": self.alg, "typ": "JWT", "kid": self.key_id});
        let header_b64 = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&header).map_err(|e| LtiError::Upstream(format!("encode jwt header: {e}")))?,
        );
        let payload_b64 = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims).map_err(|e| LtiError::Upstream(format!("encode jwt payload: {e}")))?,
        );
        let signing_input = format!("{header_b64}.{payload_b64}");

        let signature = self.service.sign(&self.key_id, signing_input.as_bytes()).await?;
        let sig_b64 = URL_SAFE_NO_PAD.encode(signature.bytes);

        Ok(format!("{signing_input}.{sig_b64}"))
    }
}

#[async_trait]
impl Verifier for RemoteKmsSigner {
    async fn verify(&self, _token: &str) -> Result<serde_json::Value, LtiError> {
        Err(LtiError::Config(
            "RemoteKmsSigner cannot verify locally; pair it with the matching AsymmetricVerifier".into(),
        ))
    }
}

impl AsymmetricSigner for RemoteKmsSigner {
    fn jwks(&self) -> Jwks {
        self.jwks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingKeyService {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RemoteKeyService for RecordingKeyService {
        async fn sign(&self, key_id: &str, message: &[u8]) -> Result<RemoteSignature, LtiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(key_id, "kms-key-1");
            assert!(!message.is_empty());
            Ok(RemoteSignature {
                alg: "ES256",
                bytes: vec![1, 2, 3, 4],
            })
        }

        async fn public_key(&self, _key_id: &str) -> Result<RemotePublicKey, LtiError> {
            Ok(RemotePublicKey {
                crv: "P-256",
                x: vec![0; 32],
                y: vec![0; 32],
            })
        }
    }

    #[tokio::test]
    async fn delegates_signing_to_the_remote_service() {
        let service = RecordingKeyService { calls: AtomicUsize::new(0) };
        let signer = RemoteKmsSigner::new("kms-key-1", "tool.example", "ES256", Box::new(service))
            .await
            .expect("build signer");
        let token = signer
            .sign(serde_json::json!({"sub": "u1"}), Duration::from_secs(60))
            .await
            .expect("sign");
        assert_eq!(token.split('.').count(), 3);
    }

    #[tokio::test]
    async fn publishes_the_fetched_public_key_as_a_jwk() {
        let service = RecordingKeyService { calls: AtomicUsize::new(0) };
        let signer = RemoteKmsSigner::new("kms-key-1", "tool.example", "ES256", Box::new(service))
            .await
            .expect("build signer");
        let jwks = AsymmetricSigner::jwks(&signer);
        assert_eq!(jwks.keys.len(), 1);
        assert_eq!(jwks.keys[0].crv.as_deref(), Some("P-256"));
    }
}
