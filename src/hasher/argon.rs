//! Memory-hard hashing for secrets at rest.
//!
//! Hashes are stored in the self-describing PHC string format, so parameters
//! travel with the hash and verification re-derives with whatever the stored
//! string declares. Verification compares in constant time.

use argon2::{
    Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version,
    password_hash::{PasswordHash, SaltString},
};
use rand::{RngCore, rngs::OsRng};

use crate::error::{Error, Kind, Result};

const DEFAULT_SALT_LENGTH: usize = 15;
const DEFAULT_TIME_COST: u32 = 1;
const DEFAULT_MEMORY_KIB: u32 = 64 * 1024;
const DEFAULT_PARALLELISM: u32 = 4;
const DEFAULT_OUTPUT_LENGTH: usize = 32;

/// Argon2id hasher with configurable cost parameters.
#[derive(Clone, Debug)]
pub struct MemoryHardHasher {
    salt_length: usize,
    time_cost: u32,
    memory_kib: u32,
    parallelism: u32,
    output_length: usize,
}

impl Default for MemoryHardHasher {
    fn default() -> Self {
        Self {
            salt_length: DEFAULT_SALT_LENGTH,
            time_cost: DEFAULT_TIME_COST,
            memory_kib: DEFAULT_MEMORY_KIB,
            parallelism: DEFAULT_PARALLELISM,
            output_length: DEFAULT_OUTPUT_LENGTH,
        }
    }
}

impl MemoryHardHasher {
    #[must_use]
    pub fn new(
        salt_length: usize,
        time_cost: u32,
        memory_kib: u32,
        parallelism: u32,
        output_length: usize,
    ) -> Self {
        Self {
            salt_length,
            time_cost,
            memory_kib,
            parallelism,
            output_length,
        }
    }

    fn instance(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.time_cost,
            self.parallelism,
            Some(self.output_length),
        )
        .map_err(|err| {
            Error::new(Kind::Internal)
                .with_op("hasher.params")
                .with_message(err.to_string())
        })?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    /// Hash `plaintext` into a PHC-encoded string carrying algorithm,
    /// version, parameters, salt and derived key.
    ///
    /// # Errors
    /// Returns [`Kind::Internal`] if key derivation fails.
    pub fn hash(&self, plaintext: &[u8]) -> Result<String> {
        let mut salt = vec![0u8; self.salt_length];
        OsRng.fill_bytes(&mut salt);
        let salt = SaltString::encode_b64(&salt).map_err(|err| {
            Error::new(Kind::Internal)
                .with_op("hasher.hash")
                .with_message(err.to_string())
        })?;

        let encoded = self
            .instance()?
            .hash_password(plaintext, &salt)
            .map_err(|err| {
                Error::new(Kind::Internal)
                    .with_op("hasher.hash")
                    .with_message(err.to_string())
            })?;
        Ok(encoded.to_string())
    }

    /// Verify `plaintext` against a PHC-encoded hash.
    ///
    /// Re-derives the key with the salt and parameters embedded in `encoded`
    /// and compares in constant time.
    ///
    /// # Errors
    /// Returns [`Kind::Invalid`] on mismatch, unsupported version, or a
    /// malformed encoded form.
    pub fn verify(&self, plaintext: &[u8], encoded: &str) -> Result<()> {
        let parsed = PasswordHash::new(encoded).map_err(|err| {
            Error::new(Kind::Invalid)
                .with_op("hasher.verify")
                .with_message(format!("malformed hash: {err}"))
        })?;

        Argon2::default()
            .verify_password(plaintext, &parsed)
            .map_err(|err| match err {
                argon2::password_hash::Error::Password => Error::new(Kind::Invalid)
                    .with_op("hasher.verify")
                    .with_message("hash mismatch"),
                other => Error::new(Kind::Invalid)
                    .with_op("hasher.verify")
                    .with_message(other.to_string()),
            })
    }
}
