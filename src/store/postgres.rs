//! Postgres store over a shared `sqlx` pool.
//!
//! Queries stay thin: one statement per operation, with the two-statement
//! `create_auth` path wrapped in a transaction. SQLSTATE 23505 maps to
//! `Exist`, `RowNotFound` to `NotExist`, everything else to `Internal`.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{Error, Kind, Result};
use crate::store::models::{
    Account, Client, CredentialRequest, Otp, PubKeyCredential, Session, User,
};
use crate::store::Store;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// Map a sqlx error to the store's error contract.
fn db_error(op: &'static str, err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::RowNotFound => Error::new(Kind::NotExist).with_op(op),
        _ if is_unique_violation(&err) => Error::new(Kind::Exist).with_op(op),
        _ => Error::new(Kind::Internal).with_op(op).with_source(err),
    }
}

async fn insert_user<'e, E>(executor: E, op: &'static str, user: &User) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO users (id, first_name, last_name, email, phone, username,
                           email_verified, phone_verified)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ",
    )
    .bind(user.id)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.email)
    .bind(&user.phone)
    .bind(&user.username)
    .bind(user.email_verified)
    .bind(user.phone_verified)
    .execute(executor)
    .await
    .map(|_| ())
    .map_err(|err| db_error(op, err))
}

async fn insert_session<'e, E>(executor: E, op: &'static str, session: &Session) -> Result<()>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        r"
        INSERT INTO sessions (id, user_id, client_id, user_agent, ip, active)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(session.id)
    .bind(session.user_id)
    .bind(session.client_id)
    .bind(&session.user_agent)
    .bind(&session.ip)
    .bind(session.active)
    .execute(executor)
    .await
    .map(|_| ())
    .map_err(|err| db_error(op, err))
}

#[async_trait]
impl Store for PgStore {
    async fn create_otp(&self, otp: &Otp) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO otps (id, identifier, code, hash, expires_at, confirmed)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(otp.id)
        .bind(&otp.identifier)
        .bind(&otp.code)
        .bind(&otp.hash)
        .bind(otp.expires_at)
        .bind(otp.confirmed)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| db_error("store.create_otp", err))
    }

    async fn otp_by_hash(&self, hash: &str) -> Result<Otp> {
        sqlx::query_as::<_, Otp>(
            r"
            SELECT id, identifier, code, hash, expires_at, confirmed
            FROM otps
            WHERE hash = $1 AND confirmed = FALSE
            ORDER BY id DESC
            LIMIT 1
            ",
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error("store.otp_by_hash", err))?
        .ok_or_else(|| Error::new(Kind::NotExist).with_op("store.otp_by_hash"))
    }

    async fn confirm_otp(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE otps SET confirmed = TRUE WHERE id = $1 AND confirmed = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|err| db_error("store.confirm_otp", err))?;
        if result.rows_affected() == 0 {
            return Err(Error::new(Kind::NotExist).with_op("store.confirm_otp"));
        }
        Ok(())
    }

    async fn create_auth(&self, user: Option<&User>, session: &Session) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|err| db_error("store.create_auth", err))?;
        if let Some(user) = user {
            insert_user(&mut *tx, "store.create_auth", user).await?;
        }
        insert_session(&mut *tx, "store.create_auth", session).await?;
        tx.commit()
            .await
            .map_err(|err| db_error("store.create_auth", err))
    }

    async fn session(&self, id: Uuid) -> Result<Session> {
        sqlx::query_as::<_, Session>(
            r"
            SELECT id, user_id, client_id, user_agent, ip, active
            FROM sessions
            WHERE id = $1 AND active = TRUE
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error("store.session", err))?
        .ok_or_else(|| Error::new(Kind::NotExist).with_op("store.session"))
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|err| db_error("store.delete_session", err))?;
        if result.rows_affected() == 0 {
            return Err(Error::new(Kind::NotExist).with_op("store.delete_session"));
        }
        Ok(())
    }

    async fn create_client(&self, client: &Client) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO clients (id, name, kind, secret, active)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(client.id)
        .bind(&client.name)
        .bind(client.kind.as_str())
        .bind(&client.secret)
        .bind(client.active)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| db_error("store.create_client", err))
    }

    async fn client(&self, id: Uuid) -> Result<Client> {
        sqlx::query_as::<_, Client>(
            "SELECT id, name, kind, secret, active FROM clients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error("store.client", err))?
        .ok_or_else(|| Error::new(Kind::NotExist).with_op("store.client"))
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        insert_user(&self.pool, "store.create_user", user).await
    }

    async fn user(&self, id: Uuid) -> Result<User> {
        sqlx::query_as::<_, User>(
            r"
            SELECT id, first_name, last_name, email, phone, username,
                   email_verified, phone_verified
            FROM users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error("store.user", err))?
        .ok_or_else(|| Error::new(Kind::NotExist).with_op("store.user"))
    }

    async fn user_by_email(&self, email: &str) -> Result<User> {
        sqlx::query_as::<_, User>(
            r"
            SELECT id, first_name, last_name, email, phone, username,
                   email_verified, phone_verified
            FROM users
            WHERE email = $1
            ",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error("store.user_by_email", err))?
        .ok_or_else(|| Error::new(Kind::NotExist).with_op("store.user_by_email"))
    }

    async fn user_by_phone(&self, phone: &str) -> Result<User> {
        sqlx::query_as::<_, User>(
            r"
            SELECT id, first_name, last_name, email, phone, username,
                   email_verified, phone_verified
            FROM users
            WHERE phone = $1
            ",
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error("store.user_by_phone", err))?
        .ok_or_else(|| Error::new(Kind::NotExist).with_op("store.user_by_phone"))
    }

    async fn create_account(&self, account: &Account) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO accounts (id, provider, user_id, provider_account_id)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(account.id)
        .bind(&account.provider)
        .bind(account.user_id)
        .bind(&account.provider_account_id)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| db_error("store.create_account", err))
    }

    async fn account_by_provider(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Account> {
        sqlx::query_as::<_, Account>(
            r"
            SELECT id, provider, user_id, provider_account_id
            FROM accounts
            WHERE provider = $1 AND provider_account_id = $2
            ",
        )
        .bind(provider)
        .bind(provider_account_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error("store.account_by_provider", err))?
        .ok_or_else(|| Error::new(Kind::NotExist).with_op("store.account_by_provider"))
    }

    async fn create_credential_request(&self, request: &CredentialRequest) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO credential_requests (id, kind, challenge, user_id, used)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(request.id)
        .bind(request.kind.as_str())
        .bind(&request.challenge)
        .bind(request.user_id)
        .bind(request.used)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| db_error("store.create_credential_request", err))
    }

    async fn credential_request(&self, id: Uuid) -> Result<CredentialRequest> {
        sqlx::query_as::<_, CredentialRequest>(
            "SELECT id, kind, challenge, user_id, used FROM credential_requests WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error("store.credential_request", err))?
        .ok_or_else(|| Error::new(Kind::NotExist).with_op("store.credential_request"))
    }

    async fn use_credential_request(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE credential_requests SET used = TRUE WHERE id = $1 AND used = FALSE",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|err| db_error("store.use_credential_request", err))?;
        if result.rows_affected() == 0 {
            return Err(Error::new(Kind::NotExist).with_op("store.use_credential_request"));
        }
        Ok(())
    }

    async fn create_credential(&self, credential: &PubKeyCredential) -> Result<()> {
        let transports: Vec<&str> = credential
            .transports
            .iter()
            .map(|transport| transport.as_str())
            .collect();
        sqlx::query(
            r"
            INSERT INTO credentials (id, credential_id, title, pub_key, pub_key_alg,
                                     counter, transports, user_id, credential_request_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(credential.id)
        .bind(&credential.credential_id)
        .bind(&credential.title)
        .bind(&credential.pub_key)
        .bind(credential.pub_key_alg)
        .bind(i64::from(credential.counter))
        .bind(&transports)
        .bind(credential.user_id)
        .bind(credential.credential_request_id)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| db_error("store.create_credential", err))
    }

    async fn credential_by_credential_id(&self, credential_id: &str) -> Result<PubKeyCredential> {
        sqlx::query_as::<_, PubKeyCredential>(
            r"
            SELECT id, credential_id, title, pub_key, pub_key_alg, counter,
                   transports, user_id, credential_request_id
            FROM credentials
            WHERE credential_id = $1
            ",
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| db_error("store.credential_by_credential_id", err))?
        .ok_or_else(|| Error::new(Kind::NotExist).with_op("store.credential_by_credential_id"))
    }

    async fn credentials_by_user(&self, user_id: Uuid) -> Result<Vec<PubKeyCredential>> {
        sqlx::query_as::<_, PubKeyCredential>(
            r"
            SELECT id, credential_id, title, pub_key, pub_key_alg, counter,
                   transports, user_id, credential_request_id
            FROM credentials
            WHERE user_id = $1
            ORDER BY id DESC
            ",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| db_error("store.credentials_by_user", err))
    }

    async fn bump_credential_counter(&self, credential_id: &str, counter: u32) -> Result<bool> {
        // Strict monotonicity: the comparison and the write are one statement,
        // so concurrent assertions cannot both win with the same counter.
        let result = sqlx::query(
            "UPDATE credentials SET counter = $2 WHERE credential_id = $1 AND counter < $2",
        )
        .bind(credential_id)
        .bind(i64::from(counter))
        .execute(&self.pool)
        .await
        .map_err(|err| db_error("store.bump_credential_counter", err))?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl sqlx::error::DatabaseError for TestDbError {
        fn message(&self) -> &'static str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> sqlx::error::ErrorKind {
            sqlx::error::ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_maps_to_exist() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert_eq!(db_error("store.create_user", err).kind(), Kind::Exist);
    }

    #[test]
    fn row_not_found_maps_to_not_exist() {
        assert_eq!(
            db_error("store.session", sqlx::Error::RowNotFound).kind(),
            Kind::NotExist
        );
    }

    #[test]
    fn other_database_errors_map_to_internal() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("40001"),
        }));
        let mapped = db_error("store.create_otp", err);
        assert_eq!(mapped.kind(), Kind::Internal);
        assert_eq!(mapped.ops(), vec!["store.create_otp"]);
    }
}
