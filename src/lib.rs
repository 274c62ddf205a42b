//! # Sesamo (Authentication & Credential Core)
//!
//! `sesamo` is the authentication and credential core of a multi-tenant API
//! backend. It issues and verifies one-time passcodes bound to a contact
//! identifier, establishes and revokes sessions tied to a calling API
//! client, and manages a WebAuthn-style public-key credential lifecycle.
//!
//! ## Passcodes (dual-hash binding)
//!
//! An issued code is stored only as a memory-hard (Argon2id) hash, so a
//! stolen database does not allow offline brute-force. The handle a caller
//! echoes back is a keyed BLAKE3 digest of identifier plus code, so a code
//! can never be verified against a different identifier than the one that
//! received it. Codes are single-use: confirmation is monotonic and a
//! confirmed row no longer matches verification lookups.
//!
//! ## Sessions & API clients
//!
//! Every inbound call is authenticated as an API client (`internal`,
//! `confidential` or `public`); non-public clients prove a memory-hard
//! hashed secret. Sessions bind a user to the authenticating client and are
//! revoked exactly once.
//!
//! ## WebAuthn credentials
//!
//! Challenges are 32 random bytes, single-use, and bound to a ceremony type.
//! Authenticator data is parsed with bounds-checked reads and refused when
//! bytes remain after the declared structures. Assertions verify ES256,
//! EdDSA or RS256 signatures over `authenticatorData || SHA-256(clientData)`
//! against the stored DER SPKI key, and the signature counter must strictly
//! increase.
//!
//! The persistent store and the delivery bus are abstract; HTTP transport is
//! a separate thin dispatcher over these services.

pub mod auth;
pub mod bus;
pub mod cli;
pub mod client;
pub mod error;
pub mod hasher;
pub mod otp;
pub mod session;
pub mod store;
pub mod webauthn;
