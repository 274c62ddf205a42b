//! Collected client data validation.
//!
//! The browser serializes `{type, challenge, origin}` as JSON; the raw bytes
//! also feed the assertion signature, so they are kept alongside the parsed
//! fields.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use crate::error::{Error, Kind, Result};
use crate::store::CredentialRequest;

/// Parsed client data plus the exact bytes it was decoded from.
#[derive(Clone, Debug)]
pub struct CollectedClientData {
    pub raw: Vec<u8>,
    pub kind: String,
    pub challenge: String,
    pub origin: String,
}

#[derive(Deserialize)]
struct WireClientData {
    #[serde(rename = "type")]
    kind: String,
    challenge: String,
    origin: String,
}

/// Decode and validate base64url client data against the stored challenge
/// request and the configured origin.
///
/// # Errors
/// Returns `Internal` when the payload cannot be decoded or parsed, and
/// `Invalid` when challenge, origin or ceremony type do not match.
pub fn validate(
    encoded: &str,
    request: &CredentialRequest,
    expected_origin: &str,
) -> Result<CollectedClientData> {
    const OP: &str = "webauthn.validate_client_data";

    let raw = URL_SAFE_NO_PAD.decode(encoded).map_err(|err| {
        Error::new(Kind::Internal)
            .with_op(OP)
            .with_message(format!("client data decode: {err}"))
    })?;
    let wire: WireClientData = serde_json::from_slice(&raw).map_err(|err| {
        Error::new(Kind::Internal)
            .with_op(OP)
            .with_message(format!("client data parse: {err}"))
    })?;

    if wire.challenge != request.challenge {
        return Err(Error::new(Kind::Invalid)
            .with_op(OP)
            .with_message("challenge mismatch"));
    }
    if wire.origin != expected_origin {
        return Err(Error::new(Kind::Invalid)
            .with_op(OP)
            .with_message("origin mismatch"));
    }
    if wire.kind != request.kind.as_str() {
        return Err(Error::new(Kind::Invalid)
            .with_op(OP)
            .with_message("ceremony type mismatch"));
    }

    Ok(CollectedClientData {
        raw,
        kind: wire.kind,
        challenge: wire.challenge,
        origin: wire.origin,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::CredentialRequestKind;
    use uuid::Uuid;

    const ORIGIN: &str = "https://example.com";

    fn request(challenge: &str, kind: CredentialRequestKind) -> CredentialRequest {
        CredentialRequest {
            id: Uuid::now_v7(),
            kind,
            challenge: challenge.to_string(),
            user_id: Uuid::now_v7(),
            used: false,
        }
    }

    fn encode(kind: &str, challenge: &str, origin: &str) -> String {
        let json = serde_json::json!({
            "type": kind,
            "challenge": challenge,
            "origin": origin,
        });
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&json).unwrap())
    }

    #[test]
    fn accepts_matching_payload() {
        let request = request("Y2hhbGxlbmdl", CredentialRequestKind::Create);
        let encoded = encode("webauthn.create", "Y2hhbGxlbmdl", ORIGIN);
        let client_data = validate(&encoded, &request, ORIGIN).unwrap();
        assert_eq!(client_data.kind, "webauthn.create");
        assert_eq!(client_data.challenge, "Y2hhbGxlbmdl");
        assert_eq!(client_data.origin, ORIGIN);
        assert!(!client_data.raw.is_empty());
    }

    #[test]
    fn rejects_undecodable_payload_as_internal() {
        let request = request("Y2hhbGxlbmdl", CredentialRequestKind::Create);
        let err = validate("%%%not-base64%%%", &request, ORIGIN).unwrap_err();
        assert_eq!(err.kind(), Kind::Internal);

        let not_json = URL_SAFE_NO_PAD.encode(b"not json");
        let err = validate(&not_json, &request, ORIGIN).unwrap_err();
        assert_eq!(err.kind(), Kind::Internal);
    }

    #[test]
    fn rejects_challenge_mismatch() {
        let request = request("Y2hhbGxlbmdl", CredentialRequestKind::Create);
        let encoded = encode("webauthn.create", "b3RoZXI", ORIGIN);
        let err = validate(&encoded, &request, ORIGIN).unwrap_err();
        assert_eq!(err.kind(), Kind::Invalid);
    }

    #[test]
    fn rejects_foreign_origin_even_when_rest_matches() {
        let request = request("Y2hhbGxlbmdl", CredentialRequestKind::Get);
        let encoded = encode("webauthn.get", "Y2hhbGxlbmdl", "https://evil.example");
        let err = validate(&encoded, &request, ORIGIN).unwrap_err();
        assert_eq!(err.kind(), Kind::Invalid);
        assert_eq!(err.message(), Some("origin mismatch"));
    }

    #[test]
    fn rejects_ceremony_type_mismatch() {
        let request = request("Y2hhbGxlbmdl", CredentialRequestKind::Get);
        let encoded = encode("webauthn.create", "Y2hhbGxlbmdl", ORIGIN);
        let err = validate(&encoded, &request, ORIGIN).unwrap_err();
        assert_eq!(err.kind(), Kind::Invalid);
        assert_eq!(err.message(), Some("ceremony type mismatch"));
    }
}
