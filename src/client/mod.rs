//! API-client authentication.
//!
//! Every inbound call presents a client id and, for non-public clients, a
//! secret. Lookup failures, inactive clients and secret mismatches all
//! collapse into `Permission` so callers cannot probe which part failed.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Kind, Result};
use crate::hasher::MemoryHardHasher;
use crate::store::{Client, ClientKind, Store};

pub struct ClientAuthenticator {
    store: Arc<dyn Store>,
    hasher: MemoryHardHasher,
}

impl ClientAuthenticator {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, hasher: MemoryHardHasher) -> Self {
        Self { store, hasher }
    }

    /// Authenticate a calling client.
    ///
    /// Public clients short-circuit to success; non-public clients must
    /// present a secret that verifies against the stored hash.
    ///
    /// # Errors
    /// Returns `Permission` when the client is missing, inactive, or the
    /// secret does not verify.
    pub async fn authenticate(
        &self,
        client_id: Uuid,
        presented_secret: Option<&str>,
    ) -> Result<Client> {
        const OP: &str = "client.authenticate";

        let denied = || {
            Error::new(Kind::Permission)
                .with_op(OP)
                .with_client(client_id)
                .with_message("client authentication failed")
        };

        let client = match self.store.client(client_id).await {
            Ok(client) => client,
            Err(err) if Error::is(Kind::NotExist, &err) => return Err(denied()),
            Err(err) => return Err(Error::wrap(OP, err)),
        };
        if !client.active {
            return Err(denied());
        }
        if client.kind == ClientKind::Public {
            return Ok(client);
        }

        let Some(stored) = client.secret.as_deref() else {
            // Non-public clients always carry a secret; a row without one is
            // not authenticatable.
            return Err(denied());
        };
        let presented = presented_secret.unwrap_or_default();
        match self.hasher.verify(presented.as_bytes(), stored) {
            Ok(()) => Ok(client),
            Err(_) => Err(denied()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn setup(kind: ClientKind, secret: Option<&str>, active: bool) -> (ClientAuthenticator, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let hasher = MemoryHardHasher::default();
        let id = Uuid::now_v7();
        let stored_secret = secret.map(|value| hasher.hash(value.as_bytes()).unwrap());
        store
            .create_client(&Client {
                id,
                name: "console".to_string(),
                kind,
                secret: stored_secret,
                active,
            })
            .await
            .unwrap();
        (ClientAuthenticator::new(store, hasher), id)
    }

    #[tokio::test]
    async fn public_client_accepts_any_secret() {
        let (authenticator, id) = setup(ClientKind::Public, None, true).await;
        assert!(authenticator.authenticate(id, None).await.is_ok());
        assert!(authenticator.authenticate(id, Some("anything")).await.is_ok());
        assert!(authenticator.authenticate(id, Some("")).await.is_ok());
    }

    #[tokio::test]
    async fn confidential_client_requires_exact_secret() {
        let (authenticator, id) = setup(ClientKind::Confidential, Some("s3cret"), true).await;
        assert!(authenticator.authenticate(id, Some("s3cret")).await.is_ok());

        let err = authenticator
            .authenticate(id, Some("wrong"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Kind::Permission);

        let err = authenticator.authenticate(id, None).await.unwrap_err();
        assert_eq!(err.kind(), Kind::Permission);
    }

    #[tokio::test]
    async fn unknown_client_is_permission_not_not_exist() {
        let (authenticator, _) = setup(ClientKind::Public, None, true).await;
        let err = authenticator
            .authenticate(Uuid::now_v7(), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Kind::Permission);
    }

    #[tokio::test]
    async fn inactive_client_is_rejected() {
        let (authenticator, id) = setup(ClientKind::Internal, Some("s3cret"), false).await;
        let err = authenticator
            .authenticate(id, Some("s3cret"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Kind::Permission);
        assert_eq!(err.client_id(), Some(id));
    }
}
