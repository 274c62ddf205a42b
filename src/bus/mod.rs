//! Message producer for out-of-band code delivery.
//!
//! The core only produces messages; delivery, retries and ack policy belong
//! to the bus worker draining the queue. Publication is synchronous-enqueue
//! with at-least-once semantics. A failed enqueue surfaces as a transient
//! `Internal` error to the caller.
//!
//! Implementations:
//! - [`outbox::OutboxProducer`]: transactional Postgres outbox; rows are
//!   drained in insertion order by an external worker.
//! - [`LogProducer`]: local dev stub that logs and succeeds.
//! - [`MemoryProducer`]: test recorder.

pub mod outbox;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;

pub use outbox::OutboxProducer;

use crate::error::{Error, Kind, Result};

/// Bus subjects. Commands are consumed by delivery workers; events are
/// emitted by them after the attempt settles.
pub mod subjects {
    pub const SEND_EMAIL_CODE: &str = "auth.sendEmailCode";
    pub const SEND_PHONE_CODE: &str = "auth.sendPhoneCode";
    pub const EMAIL_CODE_SENT: &str = "auth.emailCodeSent";
    pub const PHONE_CODE_SENT: &str = "auth.phoneCodeSent";
    pub const EMAIL_CODE_SEND_FAILED: &str = "auth.emailCodeSendFailed";
    pub const PHONE_CODE_SEND_FAILED: &str = "auth.phoneCodeSendFailed";
    pub const LOGIN_TOKEN_ACCEPTED: &str = "auth.loginTokenAccepted";
    pub const LOGIN_TOKEN_REJECTED: &str = "auth.loginTokenRejected";
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendPhoneCode {
    pub phone_number: String,
    pub code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendEmailCode {
    pub email: String,
    pub code: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhoneCodeSent {
    pub phone_number: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmailCodeSent {
    pub email: String,
}

/// A subject plus JSON body, ready to enqueue.
#[derive(Clone, Debug)]
pub struct Message {
    pub subject: &'static str,
    pub body: serde_json::Value,
}

impl Message {
    fn encode<T: Serialize>(subject: &'static str, payload: &T) -> Result<Self> {
        let body = serde_json::to_value(payload).map_err(|err| {
            Error::new(Kind::Internal)
                .with_op("bus.encode")
                .with_source(err)
        })?;
        Ok(Self { subject, body })
    }

    /// # Errors
    /// Returns `Internal` if the payload fails to serialize.
    pub fn send_phone_code(phone_number: &str, code: &str) -> Result<Self> {
        Self::encode(
            subjects::SEND_PHONE_CODE,
            &SendPhoneCode {
                phone_number: phone_number.to_string(),
                code: code.to_string(),
            },
        )
    }

    /// # Errors
    /// Returns `Internal` if the payload fails to serialize.
    pub fn send_email_code(email: &str, code: &str) -> Result<Self> {
        Self::encode(
            subjects::SEND_EMAIL_CODE,
            &SendEmailCode {
                email: email.to_string(),
                code: code.to_string(),
            },
        )
    }

    /// # Errors
    /// Returns `Internal` if the payload fails to serialize.
    pub fn phone_code_sent(phone_number: &str) -> Result<Self> {
        Self::encode(
            subjects::PHONE_CODE_SENT,
            &PhoneCodeSent {
                phone_number: phone_number.to_string(),
            },
        )
    }

    /// # Errors
    /// Returns `Internal` if the payload fails to serialize.
    pub fn email_code_sent(email: &str) -> Result<Self> {
        Self::encode(
            subjects::EMAIL_CODE_SENT,
            &EmailCodeSent {
                email: email.to_string(),
            },
        )
    }
}

/// Message enqueue abstraction.
#[async_trait]
pub trait Producer: Send + Sync {
    /// Enqueue a message for at-least-once delivery.
    async fn publish(&self, message: Message) -> Result<()>;
}

/// Local dev producer that logs the subject instead of enqueueing.
#[derive(Clone, Debug, Default)]
pub struct LogProducer;

#[async_trait]
impl Producer for LogProducer {
    async fn publish(&self, message: Message) -> Result<()> {
        info!(subject = message.subject, "bus publish stub");
        Ok(())
    }
}

/// Test producer that records published messages in order.
#[derive(Default)]
pub struct MemoryProducer {
    published: Mutex<Vec<Message>>,
}

impl MemoryProducer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<Message> {
        self.published
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Producer for MemoryProducer {
    async fn publish(&self, message: Message) -> Result<()> {
        self.published
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(message);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn phone_command_carries_number_and_code() {
        let message = Message::send_phone_code("+15555550100", "482193").unwrap();
        assert_eq!(message.subject, subjects::SEND_PHONE_CODE);
        assert_eq!(message.body["phone_number"], "+15555550100");
        assert_eq!(message.body["code"], "482193");
    }

    #[test]
    fn email_command_carries_address_and_code() {
        let message = Message::send_email_code("user@example.com", "482193").unwrap();
        assert_eq!(message.subject, subjects::SEND_EMAIL_CODE);
        assert_eq!(message.body["email"], "user@example.com");
        assert_eq!(message.body["code"], "482193");
    }

    #[test]
    fn sent_events_have_their_own_subjects() {
        let phone = Message::phone_code_sent("+15555550100").unwrap();
        assert_eq!(phone.subject, subjects::PHONE_CODE_SENT);
        let email = Message::email_code_sent("user@example.com").unwrap();
        assert_eq!(email.subject, subjects::EMAIL_CODE_SENT);
    }

    #[tokio::test]
    async fn memory_producer_records_in_order() {
        let producer = MemoryProducer::new();
        producer
            .publish(Message::send_phone_code("+1", "111111").unwrap())
            .await
            .unwrap();
        producer
            .publish(Message::send_email_code("a@b.c", "222222").unwrap())
            .await
            .unwrap();
        let published = producer.published();
        assert_eq!(published.len(), 2);
        assert_eq!(published[0].subject, subjects::SEND_PHONE_CODE);
        assert_eq!(published[1].subject, subjects::SEND_EMAIL_CODE);
    }
}
