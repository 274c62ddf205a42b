//! Authentication operation surface.
//!
//! Orchestrates the OTP engine, session manager and message producer behind
//! the wire contract: send a code, sign in or sign up with it, log out. The
//! calling API client is authenticated by the dispatcher before these
//! operations run and is passed in as a value.
//!
//! Ordering: the delivery command is enqueued only after the OTP row is
//! persisted, so an aborted call never leaves a message pointing at a code
//! that does not exist.

pub mod types;

use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

pub use types::{Authorization, SentCode, SignIn, SignUpRequired};

use crate::bus::{Message, Producer};
use crate::error::{Error, Kind, Result};
use crate::otp::{CODE_LENGTH, OtpService};
use crate::session::{NewSession, SessionManager, valid_session_id};
use crate::store::{Account, Client, Store, User};

const DEFAULT_OTP_TTL_MINUTES: i64 = 15;
const DEFAULT_TERMS_OF_SERVICE: &str = "terms of service";

/// Request-scoped values captured by the dispatcher.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    pub user_agent: String,
    pub ip: String,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    otp_ttl_minutes: i64,
    terms_of_service: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            otp_ttl_minutes: DEFAULT_OTP_TTL_MINUTES,
            terms_of_service: DEFAULT_TERMS_OF_SERVICE.to_string(),
        }
    }
}

impl AuthConfig {
    #[must_use]
    pub fn with_otp_ttl_minutes(mut self, minutes: i64) -> Self {
        self.otp_ttl_minutes = minutes;
        self
    }

    #[must_use]
    pub fn with_terms_of_service(mut self, text: impl Into<String>) -> Self {
        self.terms_of_service = text.into();
        self
    }

    #[must_use]
    pub fn otp_ttl_minutes(&self) -> i64 {
        self.otp_ttl_minutes
    }
}

pub struct AuthService {
    store: Arc<dyn Store>,
    otp: OtpService,
    sessions: SessionManager,
    producer: Arc<dyn Producer>,
    config: AuthConfig,
}

impl AuthService {
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        otp: OtpService,
        sessions: SessionManager,
        producer: Arc<dyn Producer>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            otp,
            sessions,
            producer,
            config,
        }
    }

    async fn send_code(
        &self,
        op: &'static str,
        identifier: &str,
        message_for: impl FnOnce(&str) -> Result<Message>,
    ) -> Result<String> {
        let expires_at = Utc::now() + Duration::minutes(self.config.otp_ttl_minutes);
        let issued = self
            .otp
            .create(identifier, expires_at)
            .await
            .map_err(|err| Error::wrap(op, err))?;

        // The OTP row is committed; enqueue the delivery command.
        let message = message_for(&issued.code).map_err(|err| Error::wrap(op, err))?;
        self.producer
            .publish(message)
            .await
            .map_err(|err| Error::wrap(op, err))?;

        info!(otp_id = %issued.otp.id, "one-time code issued");
        Ok(issued.otp.hash)
    }

    /// Issue a code for a phone number and enqueue SMS delivery.
    ///
    /// # Errors
    /// Returns `Internal` if hashing or enqueueing fails.
    pub async fn send_phone_code(&self, phone_number: &str) -> Result<SentCode> {
        const OP: &str = "auth.send_phone_code";
        let hash = self
            .send_code(OP, phone_number, |code| {
                Message::send_phone_code(phone_number, code)
            })
            .await?;
        Ok(SentCode::sms(CODE_LENGTH, hash))
    }

    /// Issue a code for an email address and enqueue email delivery.
    ///
    /// # Errors
    /// Returns `Internal` if hashing or enqueueing fails.
    pub async fn send_email_code(&self, email: &str) -> Result<SentCode> {
        const OP: &str = "auth.send_email_code";
        let hash = self
            .send_code(OP, email, |code| Message::send_email_code(email, code))
            .await?;
        Ok(SentCode::email(CODE_LENGTH, hash))
    }

    async fn sign_in(
        &self,
        op: &'static str,
        client: &Client,
        context: &RequestContext,
        identifier: &str,
        code: &str,
        hash: &str,
        lookup: impl std::future::Future<Output = Result<User>>,
    ) -> Result<SignIn> {
        self.otp
            .verify(identifier, code, hash)
            .await
            .map_err(|err| Error::wrap(op, err).with_client(client.id))?;

        let user = match lookup.await {
            Ok(user) => user,
            Err(err) if Error::is(Kind::NotExist, &err) || Error::is(Kind::NotFound, &err) => {
                // Not an error: the caller is invited to sign up instead.
                return Ok(SignIn::SignUpRequired(SignUpRequired::new(
                    self.config.terms_of_service.clone(),
                )));
            }
            Err(err) => return Err(Error::wrap(op, err).with_client(client.id)),
        };

        let auth = self
            .sessions
            .create_auth(
                user,
                NewSession {
                    client_id: client.id,
                    user_agent: context.user_agent.clone(),
                    ip: context.ip.clone(),
                },
            )
            .await
            .map_err(|err| Error::wrap(op, err).with_client(client.id))?;
        Ok(SignIn::Authorization(Authorization::new(
            auth.user,
            auth.session,
        )))
    }

    /// Sign in with a phone-delivered code. Returns the sign-up-required
    /// shape when no user owns the phone number.
    ///
    /// # Errors
    /// Propagates OTP verification failures and store errors.
    pub async fn sign_in_with_phone(
        &self,
        client: &Client,
        context: &RequestContext,
        phone_number: &str,
        code: &str,
        hash: &str,
    ) -> Result<SignIn> {
        const OP: &str = "auth.sign_in_with_phone";
        self.sign_in(
            OP,
            client,
            context,
            phone_number,
            code,
            hash,
            self.store.user_by_phone(phone_number),
        )
        .await
    }

    /// Sign in with an email-delivered code. Returns the sign-up-required
    /// shape when no user owns the address.
    ///
    /// # Errors
    /// Propagates OTP verification failures and store errors.
    pub async fn sign_in_with_email(
        &self,
        client: &Client,
        context: &RequestContext,
        email: &str,
        code: &str,
        hash: &str,
    ) -> Result<SignIn> {
        const OP: &str = "auth.sign_in_with_email";
        self.sign_in(
            OP,
            client,
            context,
            email,
            code,
            hash,
            self.store.user_by_email(email),
        )
        .await
    }

    /// Create a user for a verified phone number and open a session.
    ///
    /// # Errors
    /// Propagates OTP verification failures; `Exist` when the phone number
    /// is already registered.
    pub async fn sign_up_with_phone(
        &self,
        client: &Client,
        context: &RequestContext,
        phone_number: &str,
        code: &str,
        hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Authorization> {
        const OP: &str = "auth.sign_up_with_phone";
        let user = User {
            id: Uuid::nil(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: None,
            phone: Some(phone_number.to_string()),
            username: None,
            email_verified: false,
            phone_verified: true,
        };
        self.sign_up(OP, client, context, phone_number, code, hash, user)
            .await
    }

    /// Create a user for a verified email address and open a session.
    ///
    /// # Errors
    /// Propagates OTP verification failures; `Exist` when the address is
    /// already registered.
    pub async fn sign_up_with_email(
        &self,
        client: &Client,
        context: &RequestContext,
        email: &str,
        code: &str,
        hash: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<Authorization> {
        const OP: &str = "auth.sign_up_with_email";
        let user = User {
            id: Uuid::nil(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: Some(email.to_string()),
            phone: None,
            username: None,
            email_verified: true,
            phone_verified: false,
        };
        self.sign_up(OP, client, context, email, code, hash, user).await
    }

    async fn sign_up(
        &self,
        op: &'static str,
        client: &Client,
        context: &RequestContext,
        identifier: &str,
        code: &str,
        hash: &str,
        user: User,
    ) -> Result<Authorization> {
        self.otp
            .verify(identifier, code, hash)
            .await
            .map_err(|err| Error::wrap(op, err).with_client(client.id))?;

        let auth = self
            .sessions
            .create_auth(
                user,
                NewSession {
                    client_id: client.id,
                    user_agent: context.user_agent.clone(),
                    ip: context.ip.clone(),
                },
            )
            .await
            .map_err(|err| Error::wrap(op, err).with_client(client.id))?;
        info!(user_id = %auth.user.id, "user signed up");
        Ok(Authorization::new(auth.user, auth.session))
    }

    /// Revoke the caller's session.
    ///
    /// # Errors
    /// Returns `Invalid` when the id is not UUID-shaped and `NotFound` when
    /// no session has it.
    pub async fn log_out(&self, session_id: &str) -> Result<()> {
        const OP: &str = "auth.log_out";
        if !valid_session_id(session_id) {
            return Err(Error::new(Kind::Invalid)
                .with_op(OP)
                .with_message("malformed session id"));
        }
        // The regex above guarantees the parse succeeds.
        let id = Uuid::parse_str(session_id).map_err(|err| {
            Error::new(Kind::Invalid)
                .with_op(OP)
                .with_source(err)
        })?;
        self.sessions
            .delete_auth(id)
            .await
            .map_err(|err| Error::wrap(OP, err))
    }

    /// Record a linked external account identifier for a user.
    ///
    /// # Errors
    /// Returns `Exist` when the (provider, provider account id) pair is
    /// already linked.
    pub async fn link_account(
        &self,
        user_id: Uuid,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Account> {
        const OP: &str = "auth.link_account";
        let account = Account {
            id: Uuid::now_v7(),
            provider: provider.to_string(),
            user_id,
            provider_account_id: provider_account_id.to_string(),
        };
        self.store
            .create_account(&account)
            .await
            .map_err(|err| Error::wrap(OP, err).with_user(user_id))?;
        Ok(account)
    }
}
