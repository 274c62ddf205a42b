//! Wire shapes for the credential ceremonies.
//!
//! Options returned to the browser use the WebAuthn API's camelCase field
//! names; inbound payloads use the backend's snake_case contract.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::Transport;

/// Relying-party configuration: DNS-style id, display name, and the exact
/// origin collected client data must carry.
#[derive(Clone, Debug)]
pub struct RelyingParty {
    pub id: String,
    pub name: String,
    pub origin: String,
}

pub const CHALLENGE_TIMEOUT_MS: u32 = 60_000;
pub const USER_VERIFICATION_REQUIRED: &str = "required";
pub const PUBLIC_KEY_TYPE: &str = "public-key";

/// COSE algorithm identifiers offered to authenticators, preferred first.
pub const SUPPORTED_ALGORITHMS: [i32; 3] = [
    ALGORITHM_ES256,
    ALGORITHM_EDDSA,
    ALGORITHM_RS256,
];

pub const ALGORITHM_ES256: i32 = -7;
pub const ALGORITHM_EDDSA: i32 = -8;
pub const ALGORITHM_RS256: i32 = -257;

#[derive(Clone, Debug, Serialize)]
pub struct RpEntity {
    pub id: String,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntity {
    pub id: Uuid,
    /// base64url of the raw user id bytes, as authenticators expect.
    pub encoded_id: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct PubKeyCredParam {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub alg: i32,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorSelection {
    pub user_verification: &'static str,
}

/// Options for `navigator.credentials.create`. `req_id` identifies the
/// server-side challenge record and must be echoed back on registration.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationOptions {
    pub req_id: Uuid,
    pub rp: RpEntity,
    pub user: UserEntity,
    pub challenge: String,
    pub timeout: u32,
    pub pub_key_cred_params: Vec<PubKeyCredParam>,
    pub authenticator_selection: AuthenticatorSelection,
    pub attestation: &'static str,
}

#[derive(Clone, Debug, Serialize)]
pub struct CredentialDescriptor {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub transports: Vec<Transport>,
}

/// Options for `navigator.credentials.get`. `req_id` identifies the
/// server-side challenge record and must be echoed back on assertion.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    pub req_id: Uuid,
    pub challenge: String,
    pub timeout: u32,
    pub rp_id: String,
    pub allow_credentials: Vec<CredentialDescriptor>,
    pub user_verification: &'static str,
}

/// Registration payload.
#[derive(Clone, Debug, Deserialize)]
pub struct CreatePubKey {
    pub req_id: Uuid,
    pub credential: RegistrationCredential,
    pub title: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RegistrationCredential {
    /// base64url credential id minted by the authenticator.
    pub id: String,
    pub response: AttestationResponse,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AttestationResponse {
    pub client_data_json: String,
    pub authenticator_data: String,
    /// base64url DER SubjectPublicKeyInfo.
    pub pubkey: String,
    pub pubkey_alg: i32,
    #[serde(default)]
    pub transports: Vec<Transport>,
}

/// Assertion payload.
#[derive(Clone, Debug, Deserialize)]
pub struct VerifyPubKey {
    pub req_id: Uuid,
    pub credential: AssertionCredential,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AssertionCredential {
    pub id: String,
    pub response: AssertionResponse,
}

#[derive(Clone, Debug, Deserialize)]
pub struct AssertionResponse {
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
}
