//! Session lifecycle.
//!
//! Sessions bind a user to the API client that authenticated the call, plus
//! the user agent and IP observed at sign-in. Revocation is terminal; a
//! session id is never re-activated.

use regex::Regex;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Kind, Result};
use crate::store::{Session, Store, User};

/// Composite returned by authentication: the (possibly just created) user
/// and the session now bound to it.
#[derive(Clone, Debug)]
pub struct Auth {
    pub user: User,
    pub session: Session,
}

/// Session fields supplied by the caller; id and `active` are assigned here.
#[derive(Clone, Debug)]
pub struct NewSession {
    pub client_id: Uuid,
    pub user_agent: String,
    pub ip: String,
}

/// RFC-4122 UUID shape check for session ids presented on the wire.
#[must_use]
pub fn valid_session_id(value: &str) -> bool {
    Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[1-8][0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$",
    )
    .is_ok_and(|regex| regex.is_match(value))
}

pub struct SessionManager {
    store: Arc<dyn Store>,
}

impl SessionManager {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create an authenticated session.
    ///
    /// When `user.id` is nil the user row is created first, atomically with
    /// the session. A fresh time-ordered session id is always assigned.
    ///
    /// # Errors
    /// Returns `Invalid` if `new_session.client_id` is nil, or if the user
    /// is new but carries no contact identifier.
    pub async fn create_auth(&self, mut user: User, new_session: NewSession) -> Result<Auth> {
        const OP: &str = "session.create_auth";

        if new_session.client_id.is_nil() {
            return Err(Error::new(Kind::Invalid)
                .with_op(OP)
                .with_message("client id is required"));
        }

        let is_new_user = user.id.is_nil();
        if is_new_user {
            if !user.has_contact() {
                return Err(Error::new(Kind::Invalid)
                    .with_op(OP)
                    .with_message("either a user or a user id is required"));
            }
            user.id = Uuid::now_v7();
        }

        let session = Session {
            id: Uuid::now_v7(),
            user_id: user.id,
            client_id: new_session.client_id,
            user_agent: new_session.user_agent,
            ip: new_session.ip,
            active: true,
        };

        let new_user = is_new_user.then_some(&user);
        self.store
            .create_auth(new_user, &session)
            .await
            .map_err(|err| Error::wrap(OP, err).with_user(user.id))?;
        Ok(Auth { user, session })
    }

    /// Look up an active session.
    ///
    /// # Errors
    /// Returns `NotFound` when no active session has this id.
    pub async fn session(&self, id: Uuid) -> Result<Session> {
        const OP: &str = "session.session";
        match self.store.session(id).await {
            Ok(session) => Ok(session),
            Err(err) if Error::is(Kind::NotExist, &err) => Err(Error::new(Kind::NotFound)
                .with_op(OP)
                .with_message("session not found")),
            Err(err) => Err(Error::wrap(OP, err)),
        }
    }

    /// Revoke a session (log-out). Revocation of an unknown id is an error;
    /// revoking twice therefore fails the second time.
    ///
    /// # Errors
    /// Returns `NotFound` when no session has this id.
    pub async fn delete_auth(&self, id: Uuid) -> Result<()> {
        const OP: &str = "session.delete_auth";
        match self.store.delete_session(id).await {
            Ok(()) => Ok(()),
            Err(err) if Error::is(Kind::NotExist, &err) => Err(Error::new(Kind::NotFound)
                .with_op(OP)
                .with_message("session not found")),
            Err(err) => Err(Error::wrap(OP, err)),
        }
    }
}
