use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Persisted message record.
///
/// `delivered` is true iff the message has been pushed to the receiver's live
/// connection at least once, or has been flushed from the offline mailbox.
/// It only ever flips false -> true; records are never deleted here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    #[serde(rename = "message")]
    pub content: String,
    pub delivered: bool,
    pub created_at: DateTime<Utc>,
}
