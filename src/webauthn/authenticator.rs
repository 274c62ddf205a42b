//! Authenticator-data binary parsing.
//!
//! Layout (WebAuthn §6.1):
//!
//! ```text
//! rpIdHash  flags  signCount  [aaguid  credentialIdLength  credentialId]
//! 32 bytes  1      4 (BE)      16      2 (BE)              variable
//! ```
//!
//! All reads go through a bounds-checked cursor; a buffer with bytes left
//! over after the declared structures is refused. Extension data is not
//! handled and its presence is an error.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use crate::error::{Error, Kind, Result};

const MIN_LENGTH: usize = 37;
const RP_ID_HASH_LENGTH: usize = 32;
const AAGUID_LENGTH: usize = 16;

const FLAG_USER_PRESENT: u8 = 0x01;
const FLAG_USER_VERIFIED: u8 = 0x04;
const FLAG_CREDENTIAL_INCLUDED: u8 = 0x40;
const FLAG_EXTENSIONS_INCLUDED: u8 = 0x80;

/// Bounds-checked reader over the raw buffer.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.buf.len());
        let Some(end) = end else {
            return Err(Error::new(Kind::Invalid)
                .with_op("webauthn.validate_authn_data")
                .with_message(format!("authenticator data underrun reading {what}")));
        };
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self, what: &'static str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn read_u16_be(&mut self, what: &'static str) -> Result<u16> {
        let bytes = self.take(2, what)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn read_u32_be(&mut self, what: &'static str) -> Result<u32> {
        let bytes = self.take(4, what)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

/// Parsed authenticator data, including the raw bytes (they are part of the
/// signed assertion message).
#[derive(Clone, Debug)]
pub struct AuthenticatorData {
    pub raw: Vec<u8>,
    pub rp_id_hash: [u8; RP_ID_HASH_LENGTH],
    pub flags: u8,
    pub user_present: bool,
    pub user_verified: bool,
    pub credential_included: bool,
    pub extensions_included: bool,
    pub counter: u32,
    pub aaguid: Option<[u8; AAGUID_LENGTH]>,
    pub credential_id: Option<Vec<u8>>,
}

/// Decode and parse base64url authenticator data.
///
/// # Errors
/// Returns `Invalid` for undecodable input, a buffer shorter than 37 bytes,
/// truncated credential data, residual bytes, present extension data, or
/// missing user-present/user-verified flags.
pub fn parse(encoded: &str) -> Result<AuthenticatorData> {
    const OP: &str = "webauthn.validate_authn_data";

    let raw = URL_SAFE_NO_PAD.decode(encoded).map_err(|err| {
        Error::new(Kind::Invalid)
            .with_op(OP)
            .with_message(format!("authenticator data decode: {err}"))
    })?;
    if raw.len() < MIN_LENGTH {
        return Err(Error::new(Kind::Invalid)
            .with_op(OP)
            .with_message("authenticator data too short"));
    }

    let mut cursor = Cursor::new(&raw);
    let mut rp_id_hash = [0u8; RP_ID_HASH_LENGTH];
    rp_id_hash.copy_from_slice(cursor.take(RP_ID_HASH_LENGTH, "rpIdHash")?);
    let flags = cursor.read_u8("flags")?;
    let counter = cursor.read_u32_be("signCount")?;

    let user_present = flags & FLAG_USER_PRESENT != 0;
    let user_verified = flags & FLAG_USER_VERIFIED != 0;
    let credential_included = flags & FLAG_CREDENTIAL_INCLUDED != 0;
    let extensions_included = flags & FLAG_EXTENSIONS_INCLUDED != 0;

    let mut aaguid = None;
    let mut credential_id = None;
    if credential_included {
        let mut guid = [0u8; AAGUID_LENGTH];
        guid.copy_from_slice(cursor.take(AAGUID_LENGTH, "aaguid")?);
        aaguid = Some(guid);
        let id_length = usize::from(cursor.read_u16_be("credentialIdLength")?);
        credential_id = Some(cursor.take(id_length, "credentialId")?.to_vec());
    }

    if extensions_included {
        return Err(Error::new(Kind::Invalid)
            .with_op(OP)
            .with_message("unexpected extensions"));
    }
    if cursor.remaining() != 0 {
        return Err(Error::new(Kind::Invalid)
            .with_op(OP)
            .with_message("residual bytes after authenticator data"));
    }
    if !user_present {
        return Err(Error::new(Kind::Invalid)
            .with_op(OP)
            .with_message("user not present"));
    }
    if !user_verified {
        return Err(Error::new(Kind::Invalid)
            .with_op(OP)
            .with_message("user not verified"));
    }

    Ok(AuthenticatorData {
        raw,
        rp_id_hash,
        flags,
        user_present,
        user_verified,
        credential_included,
        extensions_included,
        counter,
        aaguid,
        credential_id,
    })
}
