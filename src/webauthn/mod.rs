//! WebAuthn-style public-key credential lifecycle.
//!
//! Flow overview:
//! 1) Mint a single-use challenge bound to the user (`webauthn.create` or
//!    `webauthn.get`) and return client-facing options.
//! 2) Validate the collected client data against the stored challenge, the
//!    configured origin and the ceremony type.
//! 3) Parse authenticator data with bounds-checked reads; refuse buffers
//!    with residual bytes after the declared structures.
//! 4) For assertions, verify the signature over
//!    `authenticatorData || SHA-256(clientDataJSON)` against the stored DER
//!    SPKI key (ES256, EdDSA or RS256) and enforce a strictly increasing
//!    signature counter.
//!
//! Security boundaries:
//! - Challenges are consumed exactly once; replays fail on the used flag.
//! - Origin and ceremony type are compared against configuration, never
//!   against anything the client sent.
//! - A non-increasing counter is treated as a possible cloned authenticator
//!   and the assertion is rejected without updating state.

pub mod authenticator;
pub mod client_data;
pub mod models;
pub mod service;
mod signature;

pub use authenticator::AuthenticatorData;
pub use client_data::CollectedClientData;
pub use models::{
    AssertionCredential, AssertionResponse, AttestationResponse, CreatePubKey, CreationOptions,
    CredentialDescriptor, RegistrationCredential, RelyingParty, RequestOptions, VerifyPubKey,
};
pub use service::CredentialService;
