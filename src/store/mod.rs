//! Abstract persistence for the core entities.
//!
//! The [`Store`] trait exposes typed row-level operations; services never see
//! SQL. Two implementations: [`postgres::PgStore`] over a `sqlx` pool and
//! [`memory::MemoryStore`] for tests and local development.
//!
//! Error mapping contract: a missing row is `NotExist`, a duplicate key is
//! `Exist`, anything else surfaces as `Internal`.

pub mod memory;
pub mod models;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use models::{
    Account, Client, ClientKind, CredentialRequest, CredentialRequestKind, Otp, PubKeyCredential,
    Session, Transport, User,
};
pub use postgres::PgStore;

use crate::error::Result;

#[async_trait]
pub trait Store: Send + Sync {
    // OTPs
    async fn create_otp(&self, otp: &Otp) -> Result<()>;
    /// Most recent unconfirmed row for `hash` (`order by id desc limit 1`).
    async fn otp_by_hash(&self, hash: &str) -> Result<Otp>;
    /// Flip `confirmed` to true. Fails `NotExist` if the row is gone or
    /// already confirmed; confirmation is single-use.
    async fn confirm_otp(&self, id: Uuid) -> Result<()>;

    // Sessions
    /// Persist a session; when `user` is given, create the user row in the
    /// same transaction.
    async fn create_auth(&self, user: Option<&User>, session: &Session) -> Result<()>;
    async fn session(&self, id: Uuid) -> Result<Session>;
    async fn delete_session(&self, id: Uuid) -> Result<()>;

    // Clients
    async fn create_client(&self, client: &Client) -> Result<()>;
    async fn client(&self, id: Uuid) -> Result<Client>;

    // Users
    async fn create_user(&self, user: &User) -> Result<()>;
    async fn user(&self, id: Uuid) -> Result<User>;
    async fn user_by_email(&self, email: &str) -> Result<User>;
    async fn user_by_phone(&self, phone: &str) -> Result<User>;

    // Accounts
    async fn create_account(&self, account: &Account) -> Result<()>;
    async fn account_by_provider(&self, provider: &str, provider_account_id: &str)
    -> Result<Account>;

    // Credential requests
    async fn create_credential_request(&self, request: &CredentialRequest) -> Result<()>;
    async fn credential_request(&self, id: Uuid) -> Result<CredentialRequest>;
    /// Mark a request consumed. Fails `NotExist` if it is missing or was
    /// already consumed, making consumption atomic under races.
    async fn use_credential_request(&self, id: Uuid) -> Result<()>;

    // Credentials
    async fn create_credential(&self, credential: &PubKeyCredential) -> Result<()>;
    async fn credential_by_credential_id(&self, credential_id: &str) -> Result<PubKeyCredential>;
    async fn credentials_by_user(&self, user_id: Uuid) -> Result<Vec<PubKeyCredential>>;
    /// Raise the signature counter to `counter` only if it is strictly
    /// greater than the stored value; returns whether the row moved. The
    /// check and write are one atomic step.
    async fn bump_credential_counter(&self, credential_id: &str, counter: u32) -> Result<bool>;
}
