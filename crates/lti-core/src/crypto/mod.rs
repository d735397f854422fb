//! Signing and verification, layered as small composable capabilities rather
//! than one fat interface: [`Signer`] mints tokens, [`Verifier`] checks them,
//! and the `Asymmetric*` traits additionally publish a [`Jwks`] of public
//! material. Concrete backends: [`hmac::HmacSigner`] (HS256),
//! [`rsa::RsaSigner`] (RS256), [`ecdsa`]'s ES256/384/512 signers, and
//! [`kms::RemoteKmsSigner`] for delegating to an external key service.

mod ecdsa;
mod hmac;
mod kms;
mod rsa;

pub use ecdsa::{Es256Signer, Es384Signer, Es512Signer};
pub use hmac::HmacSigner;
pub use kms::{RemoteKeyService, RemoteKmsSigner, RemotePublicKey, RemoteSignature};
pub use rsa::RsaSigner;

use crate::domain::Jwks;
use crate::error::LtiError;
use async_trait::async_trait;
use std::time::Duration;

/// Mints signed tokens, applying registered-claim defaults (`iss`, `iat`,
/// `nbf`, `exp`) the way every concrete signer in this crate does: only fill
/// in a field the caller left absent.
#[async_trait]
pub trait Signer: Send + Sync {
    fn issuer(&self) -> &str;

    /// Sign `claims` (already holding the caller's domain fields) for `ttl`,
    /// filling registered-claim defaults where missing. `ttl` of zero leaves
    /// `exp` unset when the caller didn't set it either.
    async fn sign(&self, claims: serde_json::Value, ttl: Duration) -> Result<String, LtiError>;
}

/// Verifies tokens minted by a matching [`Signer`], rejecting any token whose
/// JOSE `alg` header doesn't exactly match this verifier's algorithm.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<serde_json::Value, LtiError>;
}

/// A [`Signer`] that can publish its public key material as a [`Jwks`].
pub trait AsymmetricSigner: Signer {
    fn jwks(&self) -> Jwks;
}

/// A [`Verifier`] that can publish its public key material as a [`Jwks`].
pub trait AsymmetricVerifier: Verifier {
    fn jwks(&self) -> Jwks;
}

pub trait SignerVerifier: Signer + Verifier {}
impl<T: Signer + Verifier + ?Sized> SignerVerifier for T {}

pub trait AsymmetricSignerVerifier: AsymmetricSigner + AsymmetricVerifier {}
impl<T: AsymmetricSigner + AsymmetricVerifier + ?Sized> AsymmetricSignerVerifier for T {}

/// Applies the same registered-claim defaulting every signer needs: `iss` if
/// blank, `iat`/`nbf` if absent, `exp` if absent and `ttl` is non-zero.
pub(crate) fn apply_registered_defaults(
    claims: &mut serde_json::Value,
    issuer: &str,
    ttl: Duration,
) {
    let now = now_unix();
    let Some(obj) = claims.as_object_mut() else {
        return;
    };
    let needs_iss = obj.get("iss").and_then(|v| v.as_str()).unwrap_or("").is_empty();
    if needs_iss {
        obj.insert("iss".into(), serde_json::Value::String(issuer.to_string()));
    }
    if !obj.contains_key("iat") {
        obj.insert("iat".into(), serde_json::Value::from(now));
    }
    if !obj.contains_key("nbf") {
        obj.insert("nbf".into(), serde_json::Value::from(now));
    }
    if !obj.contains_key("exp") && !ttl.is_zero() {
        obj.insert(
            "exp".into(),
            serde_json::Value::from(now + i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)),
        );
    }
}

pub(crate) fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
