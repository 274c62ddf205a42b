//! Wire-shaped responses for the authentication operations.
//!
//! Each object carries a `_` discriminator so the thin dispatcher can emit
//! them verbatim. Sign-in has exactly two success shapes: an authorization,
//! or a sign-up-required notice when no user owns the identifier.

use serde::Serialize;

use crate::store::{Session, User};

pub const SENT_CODE: &str = "auth.sentCode";
pub const SENT_CODE_SMS: &str = "auth.sentCodeSms";
pub const SENT_CODE_EMAIL: &str = "auth.sentCodeEmail";
pub const AUTHORIZATION: &str = "auth.authorization";
pub const AUTHORIZATION_SIGN_UP_REQUIRED: &str = "auth.authorizationSignUpRequired";

/// How the code travels and how many digits it has.
#[derive(Clone, Debug, Serialize)]
pub struct SentCodeType {
    #[serde(rename = "_")]
    pub predicate: &'static str,
    pub length: u32,
}

/// Response to `send-phone-code` / `send-email-code`. `hash` is the opaque
/// handle the caller echoes back together with the received code.
#[derive(Clone, Debug, Serialize)]
pub struct SentCode {
    #[serde(rename = "_")]
    pub predicate: &'static str,
    #[serde(rename = "type")]
    pub kind: SentCodeType,
    pub hash: String,
}

impl SentCode {
    #[must_use]
    pub fn sms(length: u32, hash: String) -> Self {
        Self {
            predicate: SENT_CODE,
            kind: SentCodeType {
                predicate: SENT_CODE_SMS,
                length,
            },
            hash,
        }
    }

    #[must_use]
    pub fn email(length: u32, hash: String) -> Self {
        Self {
            predicate: SENT_CODE,
            kind: SentCodeType {
                predicate: SENT_CODE_EMAIL,
                length,
            },
            hash,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Authorization {
    #[serde(rename = "_")]
    pub predicate: &'static str,
    pub user: User,
    pub session: Session,
}

impl Authorization {
    #[must_use]
    pub fn new(user: User, session: Session) -> Self {
        Self {
            predicate: AUTHORIZATION,
            user,
            session,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct TermsOfService {
    pub text: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct SignUpRequired {
    #[serde(rename = "_")]
    pub predicate: &'static str,
    pub terms_of_service: TermsOfService,
}

impl SignUpRequired {
    #[must_use]
    pub fn new(terms_text: impl Into<String>) -> Self {
        Self {
            predicate: AUTHORIZATION_SIGN_UP_REQUIRED,
            terms_of_service: TermsOfService {
                text: terms_text.into(),
            },
        }
    }
}

/// The two shapes sharing the sign-in success path.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum SignIn {
    Authorization(Authorization),
    SignUpRequired(SignUpRequired),
}
