//! Transactional Postgres outbox.
//!
//! Publish inserts a `pending` row into `message_outbox`; an external worker
//! drains rows in insertion order (`FOR UPDATE SKIP LOCKED`) and owns
//! retries and `*-code-sent` / `*-send-failed` events. Keeping the enqueue in
//! the database gives at-least-once delivery without another broker hop, and
//! lets callers enqueue inside the transaction that wrote the row the message
//! refers to.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::bus::{Message, Producer};
use crate::error::{Error, Kind, Result};

#[derive(Clone)]
pub struct OutboxProducer {
    pool: PgPool,
}

impl OutboxProducer {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Producer for OutboxProducer {
    async fn publish(&self, message: Message) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO message_outbox (id, subject, body, status)
            VALUES ($1, $2, $3, 'pending')
            ",
        )
        .bind(Uuid::now_v7())
        .bind(message.subject)
        .bind(&message.body)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| {
            Error::new(Kind::Internal)
                .with_op("bus.publish")
                .with_source(err)
        })
    }
}
