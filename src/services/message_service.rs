use async_trait::async_trait;
use deadpool_postgres::Pool;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Message;

/// Message persistence contract.
///
/// `create` must be durable before it returns; the router acknowledges the
/// sender only after it. Records are never deleted here.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a new record and return it with its generated id and
    /// timestamp.
    async fn create(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        delivered: bool,
    ) -> Result<Message, AppError>;

    /// Undelivered mail for a receiver, ascending by creation time. Called
    /// once per connection setup.
    async fn find_undelivered(&self, receiver_id: Uuid) -> Result<Vec<Message>, AppError>;

    /// Batch-flip the delivered flag. Returns the number of rows affected.
    async fn mark_delivered(&self, ids: &[Uuid]) -> Result<u64, AppError>;

    /// Full two-party history, newest first.
    async fn conversation_between(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>, AppError>;
}

pub struct PgMessageStore {
    db: Pool,
}

impl PgMessageStore {
    pub fn new(db: Pool) -> Self {
        Self { db }
    }
}

fn message_from_row(row: &tokio_postgres::Row) -> Message {
    Message {
        id: row.get("id"),
        sender_id: row.get("sender_id"),
        receiver_id: row.get("receiver_id"),
        content: row.get("content"),
        delivered: row.get("delivered"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn create(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
        delivered: bool,
    ) -> Result<Message, AppError> {
        let id = Uuid::new_v4();
        let client = self.db.get().await?;
        let row = client
            .query_one(
                "INSERT INTO messages (id, sender_id, receiver_id, content, delivered) \
                 VALUES ($1, $2, $3, $4, $5) \
                 RETURNING id, sender_id, receiver_id, content, delivered, created_at",
                &[&id, &sender_id, &receiver_id, &content, &delivered],
            )
            .await?;

        Ok(message_from_row(&row))
    }

    async fn find_undelivered(&self, receiver_id: Uuid) -> Result<Vec<Message>, AppError> {
        let client = self.db.get().await?;
        let rows = client
            .query(
                "SELECT id, sender_id, receiver_id, content, delivered, created_at \
                 FROM messages \
                 WHERE receiver_id = $1 AND delivered = FALSE \
                 ORDER BY created_at ASC",
                &[&receiver_id],
            )
            .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }

    async fn mark_delivered(&self, ids: &[Uuid]) -> Result<u64, AppError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let client = self.db.get().await?;
        let updated = client
            .execute(
                "UPDATE messages SET delivered = TRUE \
                 WHERE id = ANY($1) AND delivered = FALSE",
                &[&ids],
            )
            .await?;

        Ok(updated)
    }

    async fn conversation_between(&self, a: Uuid, b: Uuid) -> Result<Vec<Message>, AppError> {
        let client = self.db.get().await?;
        let rows = client
            .query(
                "SELECT id, sender_id, receiver_id, content, delivered, created_at \
                 FROM messages \
                 WHERE (sender_id = $1 AND receiver_id = $2) \
                    OR (sender_id = $2 AND receiver_id = $1) \
                 ORDER BY created_at DESC",
                &[&a, &b],
            )
            .await?;

        Ok(rows.iter().map(message_from_row).collect())
    }
}
