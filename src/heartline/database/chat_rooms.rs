use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::utils::{decode_json_column, decode_timestamp_column};
use super::{Database, DatabaseError};
use crate::heartline::chats::{BLOCKED_MESSAGE_PLACEHOLDER, ChatRoom};

#[derive(Debug)]
pub(crate) struct ChatRoomRow {
    pub id: String,
    pub participants: Vec<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub read_markers: BTreeMap<String, bool>,
    pub is_blocked: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl sqlx::FromRow<'_, SqliteRow> for ChatRoomRow {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let participants_json: String = row.try_get("participants")?;
        let last_message: Option<String> = row.try_get("last_message")?;
        let last_message_at_i64: Option<i64> = row.try_get("last_message_at")?;
        let read_markers_json: String = row.try_get("read_markers")?;
        let is_blocked: bool = row.try_get("is_blocked")?;
        let created_at_i64: i64 = row.try_get("created_at")?;
        let updated_at_i64: i64 = row.try_get("updated_at")?;

        let last_message_at = last_message_at_i64
            .map(|millis| decode_timestamp_column("last_message_at", millis))
            .transpose()?;

        Ok(ChatRoomRow {
            id,
            participants: decode_json_column("participants", &participants_json)?,
            last_message,
            last_message_at,
            read_markers: decode_json_column("read_markers", &read_markers_json)?,
            is_blocked,
            created_at: decode_timestamp_column("created_at", created_at_i64)?,
            updated_at: decode_timestamp_column("updated_at", updated_at_i64)?,
        })
    }
}

impl From<ChatRoomRow> for ChatRoom {
    fn from(row: ChatRoomRow) -> Self {
        ChatRoom {
            id: row.id,
            participants: row.participants,
            last_message: row.last_message,
            last_message_at: row.last_message_at,
            read_markers: row.read_markers,
            is_blocked: row.is_blocked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl Database {
    pub(crate) async fn find_chat_room(&self, id: &str) -> Result<Option<ChatRoom>, DatabaseError> {
        let row = sqlx::query_as::<_, ChatRoomRow>("SELECT * FROM chat_rooms WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ChatRoom::from))
    }

    pub(crate) async fn save_chat_room(&self, room: &ChatRoom) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO chat_rooms
                (id, participants, last_message, last_message_at, read_markers, is_blocked, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                participants = excluded.participants,
                last_message = excluded.last_message,
                last_message_at = excluded.last_message_at,
                read_markers = excluded.read_markers,
                is_blocked = excluded.is_blocked,
                updated_at = excluded.updated_at",
        )
        .bind(room.id.as_str())
        .bind(serde_json::to_string(&room.participants)?)
        .bind(room.last_message.as_deref())
        .bind(room.last_message_at.map(|ts| ts.timestamp_millis()))
        .bind(serde_json::to_string(&room.read_markers)?)
        .bind(room.is_blocked)
        .bind(room.created_at.timestamp_millis())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Flags a room after its latest message was blocked: the denormalized
    /// preview becomes the fixed blocked placeholder and the sender's read
    /// marker is set so their own blocked message does not show as unread.
    pub(crate) async fn mark_room_blocked(
        &self,
        chat_id: &str,
        sender_id: &str,
    ) -> Result<(), DatabaseError> {
        let mut txn = self.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT read_markers FROM chat_rooms WHERE id = ?")
                .bind(chat_id)
                .fetch_optional(&mut *txn)
                .await?;
        let Some((read_markers_json,)) = row else {
            return Ok(());
        };

        let mut read_markers: BTreeMap<String, bool> = serde_json::from_str(&read_markers_json)?;
        read_markers.insert(sender_id.to_string(), true);

        sqlx::query(
            "UPDATE chat_rooms
             SET last_message = ?, last_message_at = ?, read_markers = ?, is_blocked = 1, updated_at = ?
             WHERE id = ?",
        )
        .bind(BLOCKED_MESSAGE_PLACEHOLDER)
        .bind(Utc::now().timestamp_millis())
        .bind(serde_json::to_string(&read_markers)?)
        .bind(Utc::now().timestamp_millis())
        .bind(chat_id)
        .execute(&mut *txn)
        .await?;

        txn.commit().await?;
        Ok(())
    }

    /// Clears the room-level blocked flag. Called when a clean message arrives
    /// in a room still flagged from an earlier blocked one.
    pub(crate) async fn clear_room_blocked(&self, chat_id: &str) -> Result<(), DatabaseError> {
        sqlx::query("UPDATE chat_rooms SET is_blocked = 0, updated_at = ? WHERE id = ?")
            .bind(Utc::now().timestamp_millis())
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub(crate) async fn delete_chat_room(&self, chat_id: &str) -> Result<(), DatabaseError> {
        sqlx::query("DELETE FROM chat_rooms WHERE id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
