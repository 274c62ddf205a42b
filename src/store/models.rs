//! Persisted entities. Row mapping follows the schema in `migrations/`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Row, postgres::PgRow};
use uuid::Uuid;

/// One-time passcode row. `code` is the Argon2id hash of the plaintext code;
/// `hash` is the keyed digest of identifier plus plaintext code and acts as
/// the opaque handle echoed back by the caller.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Otp {
    pub id: Uuid,
    pub identifier: String,
    pub code: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
    pub confirmed: bool,
}

impl<'r> FromRow<'r, PgRow> for Otp {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            identifier: row.try_get("identifier")?,
            code: row.try_get("code")?,
            hash: row.try_get("hash")?,
            expires_at: row.try_get("expires_at")?,
            confirmed: row.try_get("confirmed")?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub user_agent: String,
    pub ip: String,
    pub active: bool,
}

impl<'r> FromRow<'r, PgRow> for Session {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            client_id: row.try_get("client_id")?,
            user_agent: row.try_get("user_agent")?,
            ip: row.try_get("ip")?,
            active: row.try_get("active")?,
        })
    }
}

/// API client classification. The type is immutable after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientKind {
    Internal,
    Confidential,
    Public,
}

impl ClientKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Confidential => "confidential",
            Self::Public => "public",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "internal" => Some(Self::Internal),
            "confidential" => Some(Self::Confidential),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

/// Calling API client. `secret` holds the Argon2id hash for non-public
/// clients and is absent for public ones.
#[derive(Clone, Debug)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub kind: ClientKind,
    pub secret: Option<String>,
    pub active: bool,
}

impl<'r> FromRow<'r, PgRow> for Client {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let kind = ClientKind::parse(&kind).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "kind".into(),
            source: format!("unknown client kind: {kind}").into(),
        })?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            kind,
            secret: row.try_get("secret")?,
            active: row.try_get("active")?,
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub username: Option<String>,
    pub email_verified: bool,
    pub phone_verified: bool,
}

impl User {
    /// Users must be reachable through at least one contact identifier.
    #[must_use]
    pub fn has_contact(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            username: row.try_get("username")?,
            email_verified: row.try_get("email_verified")?,
            phone_verified: row.try_get("phone_verified")?,
        })
    }
}

/// Linked external account. `(provider, provider_account_id)` is unique.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    pub provider: String,
    pub user_id: Uuid,
    pub provider_account_id: String,
}

impl<'r> FromRow<'r, PgRow> for Account {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            provider: row.try_get("provider")?,
            user_id: row.try_get("user_id")?,
            provider_account_id: row.try_get("provider_account_id")?,
        })
    }
}

/// WebAuthn ceremony type a challenge was minted for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CredentialRequestKind {
    #[serde(rename = "webauthn.create")]
    Create,
    #[serde(rename = "webauthn.get")]
    Get,
}

impl CredentialRequestKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "webauthn.create" => Some(Self::Create),
            "webauthn.get" => Some(Self::Get),
            _ => None,
        }
    }
}

/// Server-minted challenge record, consumed exactly once.
#[derive(Clone, Debug)]
pub struct CredentialRequest {
    pub id: Uuid,
    pub kind: CredentialRequestKind,
    pub challenge: String,
    pub user_id: Uuid,
    pub used: bool,
}

impl<'r> FromRow<'r, PgRow> for CredentialRequest {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let kind: String = row.try_get("kind")?;
        let kind = CredentialRequestKind::parse(&kind).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "kind".into(),
            source: format!("unknown credential request kind: {kind}").into(),
        })?;
        Ok(Self {
            id: row.try_get("id")?,
            kind,
            challenge: row.try_get("challenge")?,
            user_id: row.try_get("user_id")?,
            used: row.try_get("used")?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Usb,
    Nfc,
    Ble,
    Internal,
}

impl Transport {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Usb => "usb",
            Self::Nfc => "nfc",
            Self::Ble => "ble",
            Self::Internal => "internal",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "usb" => Some(Self::Usb),
            "nfc" => Some(Self::Nfc),
            "ble" => Some(Self::Ble),
            "internal" => Some(Self::Internal),
            _ => None,
        }
    }
}

/// Stored public-key credential. `credential_id` and `pub_key` are base64url;
/// the key is a DER-encoded SubjectPublicKeyInfo. `counter` only moves up.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PubKeyCredential {
    pub id: Uuid,
    pub credential_id: String,
    pub title: String,
    pub pub_key: String,
    pub pub_key_alg: i32,
    pub counter: u32,
    pub transports: Vec<Transport>,
    pub user_id: Uuid,
    pub credential_request_id: Uuid,
}

impl<'r> FromRow<'r, PgRow> for PubKeyCredential {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let counter: i64 = row.try_get("counter")?;
        let counter = u32::try_from(counter).map_err(|_| sqlx::Error::ColumnDecode {
            index: "counter".into(),
            source: format!("counter out of range: {counter}").into(),
        })?;
        let transports: Vec<String> = row.try_get("transports")?;
        let transports = transports
            .iter()
            .map(|value| {
                Transport::parse(value).ok_or_else(|| sqlx::Error::ColumnDecode {
                    index: "transports".into(),
                    source: format!("unknown transport: {value}").into(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self {
            id: row.try_get("id")?,
            credential_id: row.try_get("credential_id")?,
            title: row.try_get("title")?,
            pub_key: row.try_get("pub_key")?,
            pub_key_alg: row.try_get("pub_key_alg")?,
            counter,
            transports,
            user_id: row.try_get("user_id")?,
            credential_request_id: row.try_get("credential_request_id")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_kind_round_trips() {
        for kind in [
            ClientKind::Internal,
            ClientKind::Confidential,
            ClientKind::Public,
        ] {
            assert_eq!(ClientKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ClientKind::parse("service"), None);
    }

    #[test]
    fn credential_request_kind_round_trips() {
        for kind in [CredentialRequestKind::Create, CredentialRequestKind::Get] {
            assert_eq!(CredentialRequestKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(CredentialRequestKind::parse("webauthn.other"), None);
    }

    #[test]
    fn transport_round_trips() {
        for transport in [
            Transport::Usb,
            Transport::Nfc,
            Transport::Ble,
            Transport::Internal,
        ] {
            assert_eq!(Transport::parse(transport.as_str()), Some(transport));
        }
        assert_eq!(Transport::parse("hybrid"), None);
    }

    #[test]
    fn user_contact_requirement() {
        let user = User {
            id: Uuid::nil(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: None,
            phone: None,
            username: None,
            email_verified: false,
            phone_verified: false,
        };
        assert!(!user.has_contact());

        let with_email = User {
            email: Some("ada@example.com".to_string()),
            ..user
        };
        assert!(with_email.has_contact());
    }
}
