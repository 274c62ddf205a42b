//! One-time passcode engine.
//!
//! Dual-hash binding:
//! - the plaintext code is stored only as an Argon2id hash, so a stolen
//!   database does not allow offline brute-force of live codes;
//! - the keyed digest of identifier plus code is the opaque handle the
//!   client echoes back, so a code cannot be verified against a different
//!   identifier than the one that received it.
//!
//! Verification confirms the row exactly once; afterwards the record no
//! longer matches the unconfirmed lookup and re-verification fails.

use chrono::{DateTime, Utc};
use rand::{Rng, rngs::OsRng};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Kind, Result};
use crate::hasher::{KeyedHasher, MemoryHardHasher};
use crate::store::{Otp, Store};

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Number of digits in a generated code.
pub const CODE_LENGTH: u32 = 6;

/// A freshly issued OTP: the persisted row plus the plaintext code destined
/// for out-of-band delivery. The plaintext never touches the store.
#[derive(Clone, Debug)]
pub struct IssuedOtp {
    pub otp: Otp,
    pub code: String,
}

pub struct OtpService {
    store: Arc<dyn Store>,
    keyed: KeyedHasher,
    memory_hard: MemoryHardHasher,
}

impl OtpService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, keyed: KeyedHasher, memory_hard: MemoryHardHasher) -> Self {
        Self {
            store,
            keyed,
            memory_hard,
        }
    }

    /// Issue a code for `identifier`, valid until `expires_at`.
    ///
    /// # Errors
    /// Returns `Internal` if hashing fails, or the store's error on insert.
    pub async fn create(&self, identifier: &str, expires_at: DateTime<Utc>) -> Result<IssuedOtp> {
        const OP: &str = "otp.create";

        let code = OsRng.gen_range(CODE_MIN..=CODE_MAX).to_string();
        let hash = self
            .keyed
            .hash(&[identifier.as_bytes(), code.as_bytes()]);
        let stored_code = self
            .memory_hard
            .hash(code.as_bytes())
            .map_err(|err| Error::wrap(OP, err))?;

        let otp = Otp {
            id: Uuid::now_v7(),
            identifier: identifier.to_string(),
            code: stored_code,
            hash,
            expires_at,
            confirmed: false,
        };
        self.store
            .create_otp(&otp)
            .await
            .map_err(|err| Error::wrap(OP, err))?;
        Ok(IssuedOtp { otp, code })
    }

    /// Verify a code for `identifier` against the handle `hash`.
    ///
    /// # Errors
    /// - `OtpHashNotMatched` when the handle does not bind this identifier
    ///   and code;
    /// - `NotExist` when no unconfirmed row matches the handle;
    /// - `OtpCodeExpired` when the row's expiry has passed;
    /// - `Invalid` when the code does not verify against the stored hash.
    pub async fn verify(&self, identifier: &str, code: &str, hash: &str) -> Result<Otp> {
        const OP: &str = "otp.verify";

        let expected = self
            .keyed
            .hash(&[identifier.as_bytes(), code.as_bytes()]);
        if !KeyedHasher::digest_eq(&expected, hash) {
            return Err(Error::new(Kind::OtpHashNotMatched)
                .with_op(OP)
                .with_message("hash does not match identifier and code"));
        }

        let otp = self
            .store
            .otp_by_hash(hash)
            .await
            .map_err(|err| Error::wrap(OP, err))?;

        if Utc::now() >= otp.expires_at {
            return Err(Error::new(Kind::OtpCodeExpired)
                .with_op(OP)
                .with_message("code expired"));
        }

        self.memory_hard
            .verify(code.as_bytes(), &otp.code)
            .map_err(|_| {
                Error::new(Kind::Invalid)
                    .with_op(OP)
                    .with_message("code mismatch")
            })?;

        self.store
            .confirm_otp(otp.id)
            .await
            .map_err(|err| Error::wrap(OP, err))?;
        Ok(Otp {
            confirmed: true,
            ..otp
        })
    }
}
