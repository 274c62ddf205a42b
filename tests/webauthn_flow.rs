//! Full WebAuthn ceremonies: registration, assertion, replay and tampering.

#![allow(clippy::unwrap_used)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

use sesamo::error::{Error, Kind};
use sesamo::store::{MemoryStore, Store, User};
use sesamo::webauthn::{
    AssertionCredential, AssertionResponse, AttestationResponse, CreatePubKey, CredentialService,
    RegistrationCredential, RelyingParty, VerifyPubKey,
};

const RP_ID: &str = "example.com";
const ORIGIN: &str = "https://example.com";

const FLAGS_UP_UV: u8 = 0x05;
const FLAGS_UP_UV_ATTESTED: u8 = 0x45;

struct Harness {
    store: Arc<MemoryStore>,
    service: CredentialService,
    user: User,
    signing: SigningKey,
    credential_id: String,
    pubkey: String,
}

async fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let service = CredentialService::new(
        Arc::clone(&store) as Arc<dyn Store>,
        RelyingParty {
            id: RP_ID.to_string(),
            name: "Example".to_string(),
            origin: ORIGIN.to_string(),
        },
    );

    let user = User {
        id: Uuid::now_v7(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: Some("ada@example.com".to_string()),
        phone: None,
        username: None,
        email_verified: true,
        phone_verified: false,
    };
    store.create_user(&user).await.unwrap();

    let signing = SigningKey::random(&mut OsRng);
    let spki = signing
        .verifying_key()
        .to_public_key_der()
        .unwrap()
        .into_vec();

    Harness {
        store,
        service,
        user,
        signing,
        credential_id: URL_SAFE_NO_PAD.encode(b"test-credential-id"),
        pubkey: URL_SAFE_NO_PAD.encode(spki),
    }
}

fn client_data(kind: &str, challenge: &str, origin: &str) -> (Vec<u8>, String) {
    let raw = serde_json::to_vec(&serde_json::json!({
        "type": kind,
        "challenge": challenge,
        "origin": origin,
    }))
    .unwrap();
    let encoded = URL_SAFE_NO_PAD.encode(&raw);
    (raw, encoded)
}

fn assertion_authn_data(counter: u32) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&Sha256::digest(RP_ID.as_bytes()));
    raw.push(FLAGS_UP_UV);
    raw.extend_from_slice(&counter.to_be_bytes());
    raw
}

fn attestation_authn_data(counter: u32, credential_id: &[u8]) -> Vec<u8> {
    let mut raw = Vec::new();
    raw.extend_from_slice(&Sha256::digest(RP_ID.as_bytes()));
    raw.push(FLAGS_UP_UV_ATTESTED);
    raw.extend_from_slice(&counter.to_be_bytes());
    raw.extend_from_slice(&[0u8; 16]);
    raw.extend_from_slice(&u16::try_from(credential_id.len()).unwrap().to_be_bytes());
    raw.extend_from_slice(credential_id);
    raw
}

async fn register(h: &Harness) {
    let options = h.service.pub_key_create_request(&h.user).await.unwrap();
    let (_, client_data_json) = client_data("webauthn.create", &options.challenge, ORIGIN);
    let authn_data = attestation_authn_data(0, b"test-credential-id");

    h.service
        .create_pub_key(CreatePubKey {
            req_id: options.req_id,
            credential: RegistrationCredential {
                id: h.credential_id.clone(),
                response: AttestationResponse {
                    client_data_json,
                    authenticator_data: URL_SAFE_NO_PAD.encode(&authn_data),
                    pubkey: h.pubkey.clone(),
                    pubkey_alg: -7,
                    transports: vec![],
                },
            },
            title: "security key".to_string(),
        })
        .await
        .unwrap();
}

/// Build a correctly signed assertion for a fresh challenge.
async fn signed_assertion(h: &Harness, counter: u32) -> VerifyPubKey {
    let options = h.service.pub_key_get_request(h.user.id).await.unwrap();
    assert_eq!(options.rp_id, RP_ID);
    assert!(options
        .allow_credentials
        .iter()
        .any(|descriptor| descriptor.id == h.credential_id));

    let (client_data_raw, client_data_json) =
        client_data("webauthn.get", &options.challenge, ORIGIN);
    let authn_data = assertion_authn_data(counter);

    let mut message = authn_data.clone();
    message.extend_from_slice(&Sha256::digest(&client_data_raw));
    let signature: Signature = h.signing.sign(&message);

    VerifyPubKey {
        req_id: options.req_id,
        credential: AssertionCredential {
            id: h.credential_id.clone(),
            response: AssertionResponse {
                client_data_json,
                authenticator_data: URL_SAFE_NO_PAD.encode(&authn_data),
                signature: URL_SAFE_NO_PAD.encode(signature.to_der().as_bytes()),
            },
        },
    }
}

#[tokio::test]
async fn registration_then_assertion_bumps_counter() {
    let h = harness().await;
    register(&h).await;

    let stored = h
        .store
        .credential_by_credential_id(&h.credential_id)
        .await
        .unwrap();
    assert_eq!(stored.counter, 0);
    assert_eq!(stored.user_id, h.user.id);
    assert_eq!(stored.pub_key_alg, -7);

    let assertion = signed_assertion(&h, 1).await;
    h.service.verify_pub_key(assertion).await.unwrap();

    let stored = h
        .store
        .credential_by_credential_id(&h.credential_id)
        .await
        .unwrap();
    assert_eq!(stored.counter, 1);
}

#[tokio::test]
async fn challenge_is_single_use() {
    let h = harness().await;

    // Registration challenge replay.
    let options = h.service.pub_key_create_request(&h.user).await.unwrap();
    let (_, client_data_json) = client_data("webauthn.create", &options.challenge, ORIGIN);
    let authn_data = attestation_authn_data(0, b"test-credential-id");
    let payload = CreatePubKey {
        req_id: options.req_id,
        credential: RegistrationCredential {
            id: h.credential_id.clone(),
            response: AttestationResponse {
                client_data_json,
                authenticator_data: URL_SAFE_NO_PAD.encode(&authn_data),
                pubkey: h.pubkey.clone(),
                pubkey_alg: -7,
                transports: vec![],
            },
        },
        title: "security key".to_string(),
    };
    h.service.create_pub_key(payload.clone()).await.unwrap();
    let err = h.service.create_pub_key(payload).await.unwrap_err();
    assert!(Error::is(Kind::NotExist, &err));

    // Assertion challenge replay.
    let assertion = signed_assertion(&h, 1).await;
    h.service.verify_pub_key(assertion.clone()).await.unwrap();
    let err = h.service.verify_pub_key(assertion).await.unwrap_err();
    assert!(Error::is(Kind::NotExist, &err));
}

#[tokio::test]
async fn stale_counter_is_rejected_without_update() {
    let h = harness().await;
    register(&h).await;

    let assertion = signed_assertion(&h, 5).await;
    h.service.verify_pub_key(assertion).await.unwrap();

    // Same counter again: rejected, counter unchanged.
    let replayed = signed_assertion(&h, 5).await;
    let err = h.service.verify_pub_key(replayed).await.unwrap_err();
    assert!(Error::is(Kind::Invalid, &err));

    let lower = signed_assertion(&h, 4).await;
    let err = h.service.verify_pub_key(lower).await.unwrap_err();
    assert!(Error::is(Kind::Invalid, &err));

    let stored = h
        .store
        .credential_by_credential_id(&h.credential_id)
        .await
        .unwrap();
    assert_eq!(stored.counter, 5);

    // A strictly greater counter still works.
    let next = signed_assertion(&h, 6).await;
    h.service.verify_pub_key(next).await.unwrap();
}

#[tokio::test]
async fn tampered_signature_or_data_is_rejected() {
    let h = harness().await;
    register(&h).await;

    // Flip one bit of the signature.
    let mut assertion = signed_assertion(&h, 1).await;
    let mut signature = URL_SAFE_NO_PAD
        .decode(&assertion.credential.response.signature)
        .unwrap();
    let last = signature.len() - 1;
    signature[last] ^= 0x01;
    assertion.credential.response.signature = URL_SAFE_NO_PAD.encode(&signature);
    let err = h.service.verify_pub_key(assertion).await.unwrap_err();
    assert!(Error::is(Kind::Invalid, &err));

    // Flip the authenticator data counter without re-signing.
    let mut assertion = signed_assertion(&h, 1).await;
    assertion.credential.response.authenticator_data =
        URL_SAFE_NO_PAD.encode(assertion_authn_data(2));
    let err = h.service.verify_pub_key(assertion).await.unwrap_err();
    assert!(Error::is(Kind::Invalid, &err));

    // Counter must not have moved.
    let stored = h
        .store
        .credential_by_credential_id(&h.credential_id)
        .await
        .unwrap();
    assert_eq!(stored.counter, 0);
}

#[tokio::test]
async fn foreign_origin_is_rejected_even_with_matching_challenge() {
    let h = harness().await;
    register(&h).await;

    let options = h.service.pub_key_get_request(h.user.id).await.unwrap();
    let (client_data_raw, client_data_json) =
        client_data("webauthn.get", &options.challenge, "https://evil.example");
    let authn_data = assertion_authn_data(1);
    let mut message = authn_data.clone();
    message.extend_from_slice(&Sha256::digest(&client_data_raw));
    let signature: Signature = h.signing.sign(&message);

    let err = h
        .service
        .verify_pub_key(VerifyPubKey {
            req_id: options.req_id,
            credential: AssertionCredential {
                id: h.credential_id.clone(),
                response: AssertionResponse {
                    client_data_json,
                    authenticator_data: URL_SAFE_NO_PAD.encode(&authn_data),
                    signature: URL_SAFE_NO_PAD.encode(signature.to_der().as_bytes()),
                },
            },
        })
        .await
        .unwrap_err();
    assert!(Error::is(Kind::Invalid, &err));
}

#[tokio::test]
async fn unknown_credential_is_not_exist() {
    let h = harness().await;
    register(&h).await;

    let mut assertion = signed_assertion(&h, 1).await;
    assertion.credential.id = URL_SAFE_NO_PAD.encode(b"some-other-credential");
    let err = h.service.verify_pub_key(assertion).await.unwrap_err();
    assert!(Error::is(Kind::NotExist, &err));
}
