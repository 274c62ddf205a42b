//! Hashing services used by the core.
//!
//! Two hashers with strictly separated roles:
//!
//! - [`MemoryHardHasher`]: salted, parameterised Argon2id for secrets at rest
//!   (OTP codes, client secrets). Deliberately slow.
//! - [`KeyedHasher`]: fixed-key BLAKE3 for deterministic identifier-to-handle
//!   mapping. Fast, never used for secret storage.

pub mod argon;
pub mod keyed;

pub use argon::MemoryHardHasher;
pub use keyed::KeyedHasher;
