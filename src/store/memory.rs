//! In-memory store for tests and local development.
//!
//! Mirrors the Postgres implementation's semantics: missing rows are
//! `NotExist`, duplicate keys are `Exist`, and the credential counter bump is
//! a compare-and-set under the store lock.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::{Error, Kind, Result};
use crate::store::models::{
    Account, Client, CredentialRequest, Otp, PubKeyCredential, Session, User,
};
use crate::store::Store;

#[derive(Default)]
struct Tables {
    otps: Vec<Otp>,
    sessions: HashMap<Uuid, Session>,
    clients: HashMap<Uuid, Client>,
    users: HashMap<Uuid, User>,
    accounts: Vec<Account>,
    credential_requests: HashMap<Uuid, CredentialRequest>,
    credentials: Vec<PubKeyCredential>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // Poisoning only happens if another test thread panicked; the data is
        // still usable for the remaining assertions.
        self.tables
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

fn not_exist(op: &'static str) -> Error {
    Error::new(Kind::NotExist).with_op(op)
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_otp(&self, otp: &Otp) -> Result<()> {
        let mut tables = self.lock();
        if tables.otps.iter().any(|row| row.id == otp.id) {
            return Err(Error::new(Kind::Exist).with_op("store.create_otp"));
        }
        tables.otps.push(otp.clone());
        Ok(())
    }

    async fn otp_by_hash(&self, hash: &str) -> Result<Otp> {
        let tables = self.lock();
        tables
            .otps
            .iter()
            .filter(|row| row.hash == hash && !row.confirmed)
            .max_by_key(|row| row.id)
            .cloned()
            .ok_or_else(|| not_exist("store.otp_by_hash"))
    }

    async fn confirm_otp(&self, id: Uuid) -> Result<()> {
        let mut tables = self.lock();
        let row = tables
            .otps
            .iter_mut()
            .find(|row| row.id == id && !row.confirmed)
            .ok_or_else(|| not_exist("store.confirm_otp"))?;
        row.confirmed = true;
        Ok(())
    }

    async fn create_auth(&self, user: Option<&User>, session: &Session) -> Result<()> {
        let mut tables = self.lock();
        if let Some(user) = user {
            if tables.users.contains_key(&user.id) {
                return Err(Error::new(Kind::Exist).with_op("store.create_auth"));
            }
            let duplicate_contact = tables.users.values().any(|row| {
                (user.email.is_some() && row.email == user.email)
                    || (user.phone.is_some() && row.phone == user.phone)
            });
            if duplicate_contact {
                return Err(Error::new(Kind::Exist).with_op("store.create_auth"));
            }
            tables.users.insert(user.id, user.clone());
        }
        if tables.sessions.contains_key(&session.id) {
            return Err(Error::new(Kind::Exist).with_op("store.create_auth"));
        }
        tables.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn session(&self, id: Uuid) -> Result<Session> {
        let tables = self.lock();
        tables
            .sessions
            .get(&id)
            .filter(|session| session.active)
            .cloned()
            .ok_or_else(|| not_exist("store.session"))
    }

    async fn delete_session(&self, id: Uuid) -> Result<()> {
        let mut tables = self.lock();
        tables
            .sessions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_exist("store.delete_session"))
    }

    async fn create_client(&self, client: &Client) -> Result<()> {
        let mut tables = self.lock();
        if tables.clients.contains_key(&client.id) {
            return Err(Error::new(Kind::Exist).with_op("store.create_client"));
        }
        tables.clients.insert(client.id, client.clone());
        Ok(())
    }

    async fn client(&self, id: Uuid) -> Result<Client> {
        let tables = self.lock();
        tables
            .clients
            .get(&id)
            .cloned()
            .ok_or_else(|| not_exist("store.client"))
    }

    async fn create_user(&self, user: &User) -> Result<()> {
        let mut tables = self.lock();
        if tables.users.contains_key(&user.id) {
            return Err(Error::new(Kind::Exist).with_op("store.create_user"));
        }
        let duplicate_contact = tables.users.values().any(|row| {
            (user.email.is_some() && row.email == user.email)
                || (user.phone.is_some() && row.phone == user.phone)
        });
        if duplicate_contact {
            return Err(Error::new(Kind::Exist).with_op("store.create_user"));
        }
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn user(&self, id: Uuid) -> Result<User> {
        let tables = self.lock();
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| not_exist("store.user"))
    }

    async fn user_by_email(&self, email: &str) -> Result<User> {
        let tables = self.lock();
        tables
            .users
            .values()
            .find(|user| user.email.as_deref() == Some(email))
            .cloned()
            .ok_or_else(|| not_exist("store.user_by_email"))
    }

    async fn user_by_phone(&self, phone: &str) -> Result<User> {
        let tables = self.lock();
        tables
            .users
            .values()
            .find(|user| user.phone.as_deref() == Some(phone))
            .cloned()
            .ok_or_else(|| not_exist("store.user_by_phone"))
    }

    async fn create_account(&self, account: &Account) -> Result<()> {
        let mut tables = self.lock();
        let duplicate = tables.accounts.iter().any(|row| {
            row.provider == account.provider
                && row.provider_account_id == account.provider_account_id
        });
        if duplicate {
            return Err(Error::new(Kind::Exist).with_op("store.create_account"));
        }
        tables.accounts.push(account.clone());
        Ok(())
    }

    async fn account_by_provider(
        &self,
        provider: &str,
        provider_account_id: &str,
    ) -> Result<Account> {
        let tables = self.lock();
        tables
            .accounts
            .iter()
            .find(|row| row.provider == provider && row.provider_account_id == provider_account_id)
            .cloned()
            .ok_or_else(|| not_exist("store.account_by_provider"))
    }

    async fn create_credential_request(&self, request: &CredentialRequest) -> Result<()> {
        let mut tables = self.lock();
        if tables.credential_requests.contains_key(&request.id) {
            return Err(Error::new(Kind::Exist).with_op("store.create_credential_request"));
        }
        tables.credential_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn credential_request(&self, id: Uuid) -> Result<CredentialRequest> {
        let tables = self.lock();
        tables
            .credential_requests
            .get(&id)
            .cloned()
            .ok_or_else(|| not_exist("store.credential_request"))
    }

    async fn use_credential_request(&self, id: Uuid) -> Result<()> {
        let mut tables = self.lock();
        let request = tables
            .credential_requests
            .get_mut(&id)
            .filter(|request| !request.used)
            .ok_or_else(|| not_exist("store.use_credential_request"))?;
        request.used = true;
        Ok(())
    }

    async fn create_credential(&self, credential: &PubKeyCredential) -> Result<()> {
        let mut tables = self.lock();
        let duplicate = tables
            .credentials
            .iter()
            .any(|row| row.id == credential.id || row.credential_id == credential.credential_id);
        if duplicate {
            return Err(Error::new(Kind::Exist).with_op("store.create_credential"));
        }
        tables.credentials.push(credential.clone());
        Ok(())
    }

    async fn credential_by_credential_id(&self, credential_id: &str) -> Result<PubKeyCredential> {
        let tables = self.lock();
        tables
            .credentials
            .iter()
            .find(|row| row.credential_id == credential_id)
            .cloned()
            .ok_or_else(|| not_exist("store.credential_by_credential_id"))
    }

    async fn credentials_by_user(&self, user_id: Uuid) -> Result<Vec<PubKeyCredential>> {
        let tables = self.lock();
        Ok(tables
            .credentials
            .iter()
            .filter(|row| row.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn bump_credential_counter(&self, credential_id: &str, counter: u32) -> Result<bool> {
        let mut tables = self.lock();
        let row = tables
            .credentials
            .iter_mut()
            .find(|row| row.credential_id == credential_id)
            .ok_or_else(|| not_exist("store.bump_credential_counter"))?;
        if row.counter >= counter {
            return Ok(false);
        }
        row.counter = counter;
        Ok(true)
    }
}
