//! End-to-end OTP engine scenarios over the in-memory store.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use std::sync::Arc;

use sesamo::error::{Error, Kind};
use sesamo::hasher::{KeyedHasher, MemoryHardHasher};
use sesamo::otp::OtpService;
use sesamo::store::MemoryStore;

const KEYED_HASH_KEY: &str = "7dc06c4157760bcae3f24c3aa3d63c9dd74ad8ea714000675ef2c1eebb5ad4ad";

fn otp_service() -> OtpService {
    OtpService::new(
        Arc::new(MemoryStore::new()),
        KeyedHasher::from_hex(KEYED_HASH_KEY).unwrap(),
        MemoryHardHasher::default(),
    )
}

#[tokio::test]
async fn happy_path_verifies_once_then_not_exist() {
    let otp = otp_service();
    let issued = otp
        .create("user@example.com", Utc::now() + Duration::minutes(15))
        .await
        .unwrap();
    assert_eq!(issued.code.len(), 6);
    assert!(issued.code.chars().all(|c| c.is_ascii_digit()));

    let verified = otp
        .verify("user@example.com", &issued.code, &issued.otp.hash)
        .await
        .unwrap();
    assert!(verified.confirmed);

    let err = otp
        .verify("user@example.com", &issued.code, &issued.otp.hash)
        .await
        .unwrap_err();
    assert!(Error::is(Kind::NotExist, &err));
}

#[tokio::test]
async fn wrong_identifier_is_hash_not_matched() {
    let otp = otp_service();
    let issued = otp
        .create("user@example.com", Utc::now() + Duration::minutes(15))
        .await
        .unwrap();

    let err = otp
        .verify("other@example.com", &issued.code, &issued.otp.hash)
        .await
        .unwrap_err();
    assert!(Error::is(Kind::OtpHashNotMatched, &err));

    // The original handle is still usable for the right identifier.
    assert!(otp
        .verify("user@example.com", &issued.code, &issued.otp.hash)
        .await
        .is_ok());
}

#[tokio::test]
async fn expired_code_fails_regardless_of_correctness() {
    let otp = otp_service();
    let issued = otp
        .create("user@example.com", Utc::now() + Duration::milliseconds(100))
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let err = otp
        .verify("user@example.com", &issued.code, &issued.otp.hash)
        .await
        .unwrap_err();
    assert!(Error::is(Kind::OtpCodeExpired, &err));
}

#[tokio::test]
async fn concurrent_creates_produce_independent_rows() {
    let otp = Arc::new(otp_service());
    let mut handles = Vec::new();
    for _ in 0..4 {
        let otp = Arc::clone(&otp);
        handles.push(tokio::spawn(async move {
            otp.create("user@example.com", Utc::now() + Duration::minutes(15))
                .await
        }));
    }

    let mut issued = Vec::new();
    for handle in handles {
        issued.push(handle.await.unwrap().unwrap());
    }

    // Every issued handle verifies against its own code.
    for item in issued {
        assert!(otp
            .verify("user@example.com", &item.code, &item.otp.hash)
            .await
            .is_ok());
    }
}
