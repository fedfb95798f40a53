use super::engine::SyncEngine;
use crate::db::StorageKey;
use crate::error::{Error, Result};
use crate::models::{max_record_id, ChatMessage, MessageRow, Session};
use crate::sync::{PendingOperation, RowData};
use crate::util::{iso_timestamp_now, next_timestamp_id};

impl SyncEngine {
    pub async fn messages(&self) -> Vec<ChatMessage> {
        self.lock_collections().await.messages.clone()
    }

    /// Messages exchanged between `session` and `other`, oldest first
    pub async fn conversation(&self, session: &Session, other: i64) -> Vec<ChatMessage> {
        let mut conversation: Vec<ChatMessage> = self
            .lock_collections()
            .await
            .messages
            .iter()
            .filter(|message| {
                (message.sender_id == session.user_id && message.receiver_id == other)
                    || (message.sender_id == other && message.receiver_id == session.user_id)
            })
            .cloned()
            .collect();
        conversation.sort_by(|left, right| left.timestamp.cmp(&right.timestamp));
        conversation
    }

    /// Send a chat message.
    ///
    /// The remote row is upserted under the local id, so replaying a send
    /// whose answer was lost does not duplicate it.
    pub async fn send_message(
        &self,
        session: &Session,
        receiver_id: i64,
        content: &str,
    ) -> Result<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::InvalidInput("message content is empty".to_string()));
        }

        let _write = self.begin_write().await;
        let message = {
            let mut collections = self.lock_collections().await;
            if !collections.users.iter().any(|user| user.id == receiver_id) {
                return Err(Error::NotFound(format!("user #{receiver_id}")));
            }
            let message = ChatMessage {
                id: next_timestamp_id(max_record_id(&collections.messages)),
                sender_id: session.user_id,
                receiver_id,
                content: content.to_string(),
                timestamp: iso_timestamp_now(),
                is_read: false,
            };
            collections.messages.push(message.clone());
            self.persist(&collections, StorageKey::Messages);
            message
        };

        self.publish(PendingOperation::upsert(RowData::Message(MessageRow::from(
            &message,
        ))))
        .await;
        Ok(message)
    }
}
