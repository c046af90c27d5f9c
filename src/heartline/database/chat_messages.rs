use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::utils::decode_timestamp_column;
use super::{Database, DatabaseError};
use crate::heartline::chats::{BLOCKED_MESSAGE_PLACEHOLDER, ChatMessage};

#[derive(Debug)]
pub(crate) struct ChatMessageRow {
    pub id: String,
    pub chat_id: String,
    pub sender_id: String,
    pub text: Option<String>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, SqliteRow> for ChatMessageRow {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let chat_id: String = row.try_get("chat_id")?;
        let sender_id: String = row.try_get("sender_id")?;
        let text: Option<String> = row.try_get("text")?;
        let is_blocked: bool = row.try_get("is_blocked")?;
        let created_at_i64: i64 = row.try_get("created_at")?;

        Ok(ChatMessageRow {
            id,
            chat_id,
            sender_id,
            text,
            is_blocked,
            created_at: decode_timestamp_column("created_at", created_at_i64)?,
        })
    }
}

impl From<ChatMessageRow> for ChatMessage {
    fn from(row: ChatMessageRow) -> Self {
        ChatMessage {
            id: row.id,
            chat_id: row.chat_id,
            sender_id: row.sender_id,
            text: row.text,
            is_blocked: row.is_blocked,
            created_at: row.created_at,
        }
    }
}

impl Database {
    pub(crate) async fn find_chat_message(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<Option<ChatMessage>, DatabaseError> {
        let row = sqlx::query_as::<_, ChatMessageRow>(
            "SELECT * FROM chat_messages WHERE chat_id = ? AND id = ?",
        )
        .bind(chat_id)
        .bind(message_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ChatMessage::from))
    }

    pub(crate) async fn insert_chat_message(
        &self,
        message: &ChatMessage,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO chat_messages (id, chat_id, sender_id, text, is_blocked, created_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(message.id.as_str())
        .bind(message.chat_id.as_str())
        .bind(message.sender_id.as_str())
        .bind(message.text.as_deref())
        .bind(message.is_blocked)
        .bind(message.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Rewrites a blocked message in place: the text becomes the fixed
    /// placeholder and the blocked flag is set. The message is never deleted
    /// by moderation, and the write is a fixed point under re-runs.
    pub(crate) async fn redact_chat_message(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE chat_messages SET text = ?, is_blocked = 1 WHERE chat_id = ? AND id = ?")
            .bind(BLOCKED_MESSAGE_PLACEHOLDER)
            .bind(chat_id)
            .bind(message_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes up to `limit` messages of a room, returning how many went away.
    /// Callers loop until this returns zero.
    pub(crate) async fn delete_chat_messages_batch(
        &self,
        chat_id: &str,
        limit: i64,
    ) -> Result<u64, DatabaseError> {
        let result = sqlx::query(
            "DELETE FROM chat_messages
             WHERE id IN (SELECT id FROM chat_messages WHERE chat_id = ? LIMIT ?)",
        )
        .bind(chat_id)
        .bind(limit)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::create_test_db;
    use super::*;

    fn message(id: &str, chat_id: &str, text: Option<&str>) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            chat_id: chat_id.to_string(),
            sender_id: "uid-a".to_string(),
            text: text.map(str::to_string),
            is_blocked: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_message() {
        let (db, _temp) = create_test_db().await;
        db.insert_chat_message(&message("msg-1", "room-1", Some("안녕")))
            .await
            .unwrap();

        let loaded = db
            .find_chat_message("room-1", "msg-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.text.as_deref(), Some("안녕"));
        assert!(!loaded.is_blocked);

        assert!(
            db.find_chat_message("room-2", "msg-1")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_redact_chat_message_is_fixed_point() {
        let (db, _temp) = create_test_db().await;
        db.insert_chat_message(&message("msg-1", "room-1", Some("010-1234-5678")))
            .await
            .unwrap();

        db.redact_chat_message("room-1", "msg-1").await.unwrap();
        let first = db
            .find_chat_message("room-1", "msg-1")
            .await
            .unwrap()
            .unwrap();
        assert!(first.is_blocked);
        assert_eq!(first.text.as_deref(), Some(BLOCKED_MESSAGE_PLACEHOLDER));

        // Re-running the redaction must not change state further
        db.redact_chat_message("room-1", "msg-1").await.unwrap();
        let second = db
            .find_chat_message("room-1", "msg-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second, first);
    }

    #[tokio::test]
    async fn test_delete_chat_messages_batch() {
        let (db, _temp) = create_test_db().await;
        for i in 0..7 {
            db.insert_chat_message(&message(&format!("msg-{i}"), "room-1", Some("hi")))
                .await
                .unwrap();
        }
        db.insert_chat_message(&message("other", "room-2", Some("hi")))
            .await
            .unwrap();

        assert_eq!(db.delete_chat_messages_batch("room-1", 3).await.unwrap(), 3);
        assert_eq!(db.delete_chat_messages_batch("room-1", 3).await.unwrap(), 3);
        assert_eq!(db.delete_chat_messages_batch("room-1", 3).await.unwrap(), 1);
        assert_eq!(db.delete_chat_messages_batch("room-1", 3).await.unwrap(), 0);

        // Messages of other rooms are untouched
        assert!(
            db.find_chat_message("room-2", "other")
                .await
                .unwrap()
                .is_some()
        );
    }
}
