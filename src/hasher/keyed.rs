//! Fixed-key fast hash for deterministic identifier-to-handle mapping.
//!
//! The key is loaded once from configuration as hex and is immutable after
//! initialization. Output is the lowercase hex digest. Never used for secret
//! storage; the handle it produces is an opaque lookup token, not a secret.

use subtle::ConstantTimeEq;

use crate::error::{Error, Kind, Result};

const KEY_LENGTH: usize = 32;

/// Keyed BLAKE3 hasher over a process-wide immutable key.
#[derive(Clone)]
pub struct KeyedHasher {
    key: [u8; KEY_LENGTH],
}

impl KeyedHasher {
    /// Build a hasher from a 64-character hex key.
    ///
    /// # Errors
    /// Returns [`Kind::Invalid`] if the key is not valid hex or not 32 bytes.
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let bytes = decode_hex(hex_key)
            .ok_or_else(|| {
                Error::new(Kind::Invalid)
                    .with_op("hasher.keyed")
                    .with_message("key is not valid hex")
            })?;
        let key: [u8; KEY_LENGTH] = bytes.try_into().map_err(|_| {
            Error::new(Kind::Invalid)
                .with_op("hasher.keyed")
                .with_message("key must be 32 bytes")
        })?;
        Ok(Self { key })
    }

    /// Keyed digest of `parts` concatenated in order, as lowercase hex.
    #[must_use]
    pub fn hash(&self, parts: &[&[u8]]) -> String {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        for part in parts {
            hasher.update(part);
        }
        hasher.finalize().to_hex().to_string()
    }

    /// Constant-time equality of two digests.
    #[must_use]
    pub fn digest_eq(left: &str, right: &str) -> bool {
        left.as_bytes().ct_eq(right.as_bytes()).into()
    }
}

impl std::fmt::Debug for KeyedHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedHasher").field("key", &"***").finish()
    }
}

fn decode_hex(input: &str) -> Option<Vec<u8>> {
    if input.len() % 2 != 0 {
        return None;
    }
    (0..input.len())
        .step_by(2)
        .map(|index| {
            input
                .get(index..index + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
        })
        .collect()
}
