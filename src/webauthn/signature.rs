//! Assertion signature verification across the supported COSE algorithms.
//!
//! Keys arrive as DER SubjectPublicKeyInfo. ES256 signatures are ASN.1-DER
//! `{R, S}` pairs (trailing bytes and non-positive scalars are rejected by
//! the decoder); EdDSA signatures are the raw 64 bytes; RS256 is PKCS#1
//! v1.5 over SHA-256.

use crate::error::{Error, Kind, Result};
use crate::webauthn::models::{ALGORITHM_EDDSA, ALGORITHM_ES256, ALGORITHM_RS256};

/// Digest each algorithm verifies over, per the COSE registrations.
#[must_use]
pub const fn digest_for(alg: i32) -> Option<&'static str> {
    match alg {
        ALGORITHM_ES256 | ALGORITHM_RS256 => Some("SHA-256"),
        ALGORITHM_EDDSA => Some("SHA-512"),
        _ => None,
    }
}

/// Verify `signature` over `message` with the DER SPKI key `spki` under the
/// COSE algorithm `alg`.
///
/// # Errors
/// Returns `Internal` for an unsupported algorithm and `Invalid` for a key,
/// signature or verification failure.
pub fn verify(alg: i32, spki: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
    const OP: &str = "webauthn.verify_signature";

    let invalid = |reason: String| Error::new(Kind::Invalid).with_op(OP).with_message(reason);

    match alg {
        ALGORITHM_ES256 => {
            use p256::ecdsa::signature::Verifier;
            use p256::ecdsa::{Signature, VerifyingKey};
            use p256::pkcs8::DecodePublicKey;

            let key = VerifyingKey::from_public_key_der(spki)
                .map_err(|err| invalid(format!("invalid p-256 public key: {err}")))?;
            let signature = Signature::from_der(signature)
                .map_err(|err| invalid(format!("malformed ecdsa signature: {err}")))?;
            key.verify(message, &signature)
                .map_err(|_| invalid("ecdsa signature verification failed".to_string()))
        }
        ALGORITHM_EDDSA => {
            use ed25519_dalek::pkcs8::DecodePublicKey;
            use ed25519_dalek::{Signature, Verifier, VerifyingKey};

            let key = VerifyingKey::from_public_key_der(spki)
                .map_err(|err| invalid(format!("invalid ed25519 public key: {err}")))?;
            let signature = Signature::from_slice(signature)
                .map_err(|err| invalid(format!("malformed ed25519 signature: {err}")))?;
            key.verify(message, &signature)
                .map_err(|_| invalid("ed25519 signature verification failed".to_string()))
        }
        ALGORITHM_RS256 => {
            use rsa::RsaPublicKey;
            use rsa::pkcs1v15::{Signature, VerifyingKey};
            use rsa::pkcs8::DecodePublicKey;
            use rsa::signature::Verifier;
            use sha2::Sha256;

            let key = RsaPublicKey::from_public_key_der(spki)
                .map_err(|err| invalid(format!("invalid rsa public key: {err}")))?;
            let signature = Signature::try_from(signature)
                .map_err(|err| invalid(format!("malformed rsa signature: {err}")))?;
            VerifyingKey::<Sha256>::new(key)
                .verify(message, &signature)
                .map_err(|_| invalid("rsa signature verification failed".to_string()))
        }
        _ => Err(Error::new(Kind::Internal)
            .with_op(OP)
            .with_message(format!("unsupported algorithm: {alg}"))),
    }
}
