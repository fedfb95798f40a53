//! Chat message model
//!
//! Messages are the one collection whose remote columns differ from the
//! in-memory shape: the `messages` table uses snake_case, the local
//! collection camelCase. `MessageRow` is the wire shape and the two convert
//! field by field.

use serde::{Deserialize, Serialize};

use super::Record;

/// A message as held in the local `messages` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub timestamp: String,
    pub is_read: bool,
}

impl Record for ChatMessage {
    fn record_id(&self) -> i64 {
        self.id
    }
}

/// A row of the remote `messages` table.
///
/// Rows written by this client carry the local id, so a retried send lands
/// on the same row. Rows from other writers may come without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub is_read: bool,
}

impl MessageRow {
    /// Whether this row carries the same logical message as `message`.
    ///
    /// Identity across the two shapes is sender, receiver and timestamp,
    /// which also holds for rows whose id was assigned remotely.
    pub fn describes(&self, message: &ChatMessage) -> bool {
        self.sender_id == message.sender_id
            && self.receiver_id == message.receiver_id
            && self.timestamp == message.timestamp
    }

    /// Convert a fetched row into the local shape. Rows without a remote id
    /// fall back to `fallback_id`.
    #[must_use]
    pub fn into_message(self, fallback_id: i64) -> ChatMessage {
        ChatMessage {
            id: self.id.unwrap_or(fallback_id),
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            content: self.content,
            timestamp: self.timestamp,
            is_read: self.is_read,
        }
    }
}

impl From<&ChatMessage> for MessageRow {
    fn from(message: &ChatMessage) -> Self {
        Self {
            id: Some(message.id),
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content.clone(),
            timestamp: message.timestamp.clone(),
            is_read: message.is_read,
        }
    }
}
