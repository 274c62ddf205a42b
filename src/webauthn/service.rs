//! Credential service: challenge issuance, registration, assertion.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Kind, Result};
use crate::store::{
    CredentialRequest, CredentialRequestKind, PubKeyCredential, Store, User,
};
use crate::webauthn::models::{
    AuthenticatorSelection, CreatePubKey, CreationOptions, CredentialDescriptor, PubKeyCredParam,
    RelyingParty, RequestOptions, RpEntity, UserEntity, VerifyPubKey, CHALLENGE_TIMEOUT_MS,
    PUBLIC_KEY_TYPE, SUPPORTED_ALGORITHMS, USER_VERIFICATION_REQUIRED,
};
use crate::webauthn::{authenticator, client_data, signature};

const CHALLENGE_LENGTH: usize = 32;

pub struct CredentialService {
    store: Arc<dyn Store>,
    rp: RelyingParty,
}

impl CredentialService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, rp: RelyingParty) -> Self {
        Self { store, rp }
    }

    #[must_use]
    pub fn relying_party(&self) -> &RelyingParty {
        &self.rp
    }

    fn new_challenge() -> String {
        let mut bytes = [0u8; CHALLENGE_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    async fn mint_request(
        &self,
        op: &'static str,
        kind: CredentialRequestKind,
        user_id: Uuid,
    ) -> Result<CredentialRequest> {
        let request = CredentialRequest {
            id: Uuid::now_v7(),
            kind,
            challenge: Self::new_challenge(),
            user_id,
            used: false,
        };
        self.store
            .create_credential_request(&request)
            .await
            .map_err(|err| Error::wrap(op, err))?;
        Ok(request)
    }

    async fn consume_request(
        &self,
        op: &'static str,
        id: Uuid,
        kind: CredentialRequestKind,
    ) -> Result<CredentialRequest> {
        let request = self
            .store
            .credential_request(id)
            .await
            .map_err(|err| Error::wrap(op, err))?;
        if request.used {
            return Err(Error::new(Kind::NotExist)
                .with_op(op)
                .with_message("challenge already consumed"));
        }
        if request.kind != kind {
            return Err(Error::new(Kind::Invalid)
                .with_op(op)
                .with_message("challenge minted for a different ceremony"));
        }
        Ok(request)
    }

    /// Mint a registration challenge and return creation options.
    ///
    /// # Errors
    /// Returns the store's error if the challenge cannot be persisted.
    pub async fn pub_key_create_request(&self, user: &User) -> Result<CreationOptions> {
        const OP: &str = "webauthn.pub_key_create_request";

        let request = self
            .mint_request(OP, CredentialRequestKind::Create, user.id)
            .await?;
        Ok(CreationOptions {
            req_id: request.id,
            rp: RpEntity {
                id: self.rp.id.clone(),
                name: self.rp.name.clone(),
            },
            user: UserEntity {
                id: user.id,
                encoded_id: URL_SAFE_NO_PAD.encode(user.id.as_bytes()),
                display_name: user.first_name.clone(),
            },
            challenge: request.challenge,
            timeout: CHALLENGE_TIMEOUT_MS,
            pub_key_cred_params: SUPPORTED_ALGORITHMS
                .iter()
                .map(|&alg| PubKeyCredParam {
                    kind: PUBLIC_KEY_TYPE,
                    alg,
                })
                .collect(),
            authenticator_selection: AuthenticatorSelection {
                user_verification: USER_VERIFICATION_REQUIRED,
            },
            attestation: "none",
        })
    }

    /// Mint an assertion challenge listing the user's registered credentials.
    ///
    /// # Errors
    /// Returns the store's error if lookup or persistence fails.
    pub async fn pub_key_get_request(&self, user_id: Uuid) -> Result<RequestOptions> {
        const OP: &str = "webauthn.pub_key_get_request";

        let credentials = self
            .store
            .credentials_by_user(user_id)
            .await
            .map_err(|err| Error::wrap(OP, err))?;
        let allow_credentials = credentials
            .into_iter()
            .map(|credential| CredentialDescriptor {
                kind: PUBLIC_KEY_TYPE,
                id: credential.credential_id,
                transports: credential.transports,
            })
            .collect();

        let request = self
            .mint_request(OP, CredentialRequestKind::Get, user_id)
            .await?;
        Ok(RequestOptions {
            req_id: request.id,
            challenge: request.challenge,
            timeout: CHALLENGE_TIMEOUT_MS,
            rp_id: self.rp.id.clone(),
            allow_credentials,
            user_verification: USER_VERIFICATION_REQUIRED,
        })
    }

    /// Validate an attestation and store the new credential.
    ///
    /// # Errors
    /// - `NotExist` when the challenge is missing or already consumed;
    /// - `Internal`/`Invalid` from client-data validation;
    /// - `Invalid` from authenticator-data parsing;
    /// - the store's error on insert.
    pub async fn create_pub_key(&self, payload: CreatePubKey) -> Result<()> {
        const OP: &str = "webauthn.create_pub_key";

        let request = self
            .consume_request(OP, payload.req_id, CredentialRequestKind::Create)
            .await?;

        let response = &payload.credential.response;
        client_data::validate(&response.client_data_json, &request, &self.rp.origin)
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))?;
        let authn_data = authenticator::parse(&response.authenticator_data)
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))?;

        let credential = PubKeyCredential {
            id: Uuid::now_v7(),
            credential_id: payload.credential.id.clone(),
            title: payload.title.clone(),
            pub_key: response.pubkey.clone(),
            pub_key_alg: response.pubkey_alg,
            counter: authn_data.counter,
            transports: response.transports.clone(),
            user_id: request.user_id,
            credential_request_id: request.id,
        };
        self.store
            .create_credential(&credential)
            .await
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))?;
        self.store
            .use_credential_request(request.id)
            .await
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))
    }

    /// Verify a signed assertion against the stored credential.
    ///
    /// # Errors
    /// - `NotExist` when the challenge or the credential is missing, or the
    ///   challenge is already consumed;
    /// - `Internal`/`Invalid` from client-data validation or parsing;
    /// - `Invalid` when the signature does not verify or the counter does
    ///   not strictly increase.
    pub async fn verify_pub_key(&self, payload: VerifyPubKey) -> Result<()> {
        const OP: &str = "webauthn.verify_pub_key";

        let request = self
            .consume_request(OP, payload.req_id, CredentialRequestKind::Get)
            .await?;

        let response = &payload.credential.response;
        let collected = client_data::validate(&response.client_data_json, &request, &self.rp.origin)
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))?;
        let authn_data = authenticator::parse(&response.authenticator_data)
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))?;

        let credential = self
            .store
            .credential_by_credential_id(&payload.credential.id)
            .await
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))?;
        if credential.user_id != request.user_id {
            // Do not reveal that the credential exists for someone else.
            return Err(Error::new(Kind::NotExist)
                .with_op(OP)
                .with_user(request.user_id)
                .with_message("credential not found"));
        }

        // message = authenticatorData || SHA-256(clientDataJSON)
        let client_data_hash = Sha256::digest(&collected.raw);
        let mut message = authn_data.raw.clone();
        message.extend_from_slice(&client_data_hash);

        let signature_bytes = URL_SAFE_NO_PAD.decode(&response.signature).map_err(|err| {
            Error::new(Kind::Invalid)
                .with_op(OP)
                .with_user(request.user_id)
                .with_message(format!("signature decode: {err}"))
        })?;
        let spki = URL_SAFE_NO_PAD.decode(&credential.pub_key).map_err(|err| {
            Error::new(Kind::Internal)
                .with_op(OP)
                .with_user(request.user_id)
                .with_message(format!("stored public key decode: {err}"))
        })?;

        signature::verify(credential.pub_key_alg, &spki, &message, &signature_bytes)
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))?;

        let bumped = self
            .store
            .bump_credential_counter(&credential.credential_id, authn_data.counter)
            .await
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))?;
        if !bumped {
            return Err(Error::new(Kind::Invalid)
                .with_op(OP)
                .with_user(request.user_id)
                .with_message("signature counter did not increase; possible cloned authenticator"));
        }

        self.store
            .use_credential_request(request.id)
            .await
            .map_err(|err| Error::wrap(OP, err).with_user(request.user_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::store::Transport;

    fn service() -> (CredentialService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let rp = RelyingParty {
            id: "example.com".to_string(),
            name: "Example".to_string(),
            origin: "https://example.com".to_string(),
        };
        (
            CredentialService::new(Arc::clone(&store) as Arc<dyn Store>, rp),
            store,
        )
    }

    fn user() -> User {
        User {
            id: Uuid::now_v7(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: Some("ada@example.com".to_string()),
            phone: None,
            username: None,
            email_verified: true,
            phone_verified: false,
        }
    }

    #[tokio::test]
    async fn creation_options_carry_challenge_and_user() {
        let (service, store) = service();
        let user = user();
        let options = service.pub_key_create_request(&user).await.unwrap();

        assert_eq!(options.rp.id, "example.com");
        assert_eq!(options.user.id, user.id);
        assert_eq!(options.user.display_name, "Ada");
        assert_eq!(
            options.user.encoded_id,
            URL_SAFE_NO_PAD.encode(user.id.as_bytes())
        );
        // 32 random bytes, base64url without padding.
        assert_eq!(URL_SAFE_NO_PAD.decode(&options.challenge).unwrap().len(), 32);
        assert_eq!(options.timeout, 60_000);

        // The challenge is persisted for the later response.
        let stored = store.credential_request(options.req_id).await.unwrap();
        assert_eq!(stored.challenge, options.challenge);
        assert_eq!(stored.user_id, user.id);
        assert!(!stored.used);
    }

    #[tokio::test]
    async fn get_request_lists_registered_credentials() {
        let (service, store) = service();
        let user = user();
        store
            .create_credential(&PubKeyCredential {
                id: Uuid::now_v7(),
                credential_id: "AAEC".to_string(),
                title: "yubikey".to_string(),
                pub_key: "AAAA".to_string(),
                pub_key_alg: -7,
                counter: 0,
                transports: vec![Transport::Usb],
                user_id: user.id,
                credential_request_id: Uuid::now_v7(),
            })
            .await
            .unwrap();

        let options = service.pub_key_get_request(user.id).await.unwrap();
        assert_eq!(options.rp_id, "example.com");
        assert_eq!(options.allow_credentials.len(), 1);
        assert_eq!(options.allow_credentials[0].id, "AAEC");
        assert_eq!(options.user_verification, "required");
    }
}
