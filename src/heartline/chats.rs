use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::heartline::Heartline;
use crate::heartline::error::Result;

/// Replacement text written over a message that failed moderation. Redaction
/// is a fixed point: rewriting an already-redacted message changes nothing.
pub(crate) const BLOCKED_MESSAGE_PLACEHOLDER: &str = "차단된 메시지입니다.";

/// Messages are deleted in fixed-size batches when a room is removed.
const MESSAGE_DELETE_BATCH_SIZE: i64 = 500;

/// A chat room between exactly two members.
///
/// `last_message`/`last_message_at` are a denormalized preview of the most
/// recent message. `is_blocked` mirrors the moderation outcome of the most
/// recent message and is cleared by the next clean one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRoom {
    pub id: String,
    pub participants: Vec<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub read_markers: BTreeMap<String, bool>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatRoom {
    pub fn new(id: impl Into<String>, participants: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            participants,
            last_message: None,
            last_message_at: None,
            read_markers: BTreeMap::new(),
            is_blocked: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The participant on the other side of the room from `sender_id`.
    pub fn other_participant(&self, sender_id: &str) -> Option<&str> {
        self.participants
            .iter()
            .map(String::as_str)
            .find(|uid| *uid != sender_id)
    }
}

/// A message inside a chat room. `text` is `None` for media-only messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: Option<String>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl Heartline {
    /// Deletes a chat room and all of its messages.
    ///
    /// Messages are removed in batches until none remain, then the room
    /// document itself is deleted. Failures are logged; the room may be left
    /// partially cleaned and the next deletion attempt picks up where this one
    /// stopped.
    pub async fn delete_chat_room(&self, chat_id: &str) -> Result<()> {
        tracing::debug!(
            target: "heartline::chats::delete_chat_room",
            "Deleting messages for chat room: {}",
            chat_id
        );

        loop {
            let deleted = self
                .database
                .delete_chat_messages_batch(chat_id, MESSAGE_DELETE_BATCH_SIZE)
                .await?;
            if deleted == 0 {
                break;
            }
            tracing::debug!(
                target: "heartline::chats::delete_chat_room",
                "Deleted {} messages from chat room: {}",
                deleted,
                chat_id
            );
        }

        self.database.delete_chat_room(chat_id).await?;
        tracing::info!(
            target: "heartline::chats::delete_chat_room",
            "Deleted chat room: {}",
            chat_id
        );
        Ok(())
    }
}
