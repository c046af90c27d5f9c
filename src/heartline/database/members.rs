use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use super::utils::{decode_json_column, decode_timestamp_column};
use super::{Database, DatabaseError};
use crate::heartline::members::{Member, NotificationPreferences, NotificationSetting};

#[derive(Debug)]
pub(crate) struct MemberRow {
    pub uid: String,
    pub gender: Option<String>,
    pub display_name: String,
    // push_tokens, matched and likes_received are JSON text columns
    pub push_tokens: Vec<String>,
    pub preferences: NotificationPreferences,
    pub matched: Vec<String>,
    pub likes_received: BTreeMap<String, u32>,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl sqlx::FromRow<'_, SqliteRow> for MemberRow {
    fn from_row(row: &SqliteRow) -> std::result::Result<Self, sqlx::Error> {
        let uid: String = row.try_get("uid")?;
        let gender: Option<String> = row.try_get("gender")?;
        let display_name: String = row.try_get("display_name")?;
        let push_tokens_json: String = row.try_get("push_tokens")?;
        let matched_json: String = row.try_get("matched")?;
        let likes_received_json: String = row.try_get("likes_received")?;
        let notify_chats: Option<bool> = row.try_get("notify_chats")?;
        let notify_matches: Option<bool> = row.try_get("notify_matches")?;
        let notify_likes: Option<bool> = row.try_get("notify_likes")?;
        let created_at_i64: i64 = row.try_get("created_at")?;
        let updated_at_i64: i64 = row.try_get("updated_at")?;

        Ok(MemberRow {
            uid,
            gender,
            display_name,
            push_tokens: decode_json_column("push_tokens", &push_tokens_json)?,
            preferences: NotificationPreferences {
                chats: NotificationSetting::from_column(notify_chats),
                matches: NotificationSetting::from_column(notify_matches),
                likes: NotificationSetting::from_column(notify_likes),
            },
            matched: decode_json_column("matched", &matched_json)?,
            likes_received: decode_json_column("likes_received", &likes_received_json)?,
            created_at: decode_timestamp_column("created_at", created_at_i64)?,
            updated_at: decode_timestamp_column("updated_at", updated_at_i64)?,
        })
    }
}

impl From<MemberRow> for Member {
    fn from(row: MemberRow) -> Self {
        Member {
            uid: row.uid,
            gender: row.gender,
            display_name: row.display_name,
            push_tokens: row.push_tokens,
            preferences: row.preferences,
            matched: row.matched,
            likes_received: row.likes_received,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Removes duplicate tokens while preserving first-seen order.
fn dedup_tokens(tokens: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tokens
        .iter()
        .filter(|t| seen.insert(t.as_str()))
        .cloned()
        .collect()
}

impl Database {
    pub(crate) async fn find_member(&self, uid: &str) -> Result<Option<Member>, DatabaseError> {
        let row = sqlx::query_as::<_, MemberRow>("SELECT * FROM members WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Member::from))
    }

    /// Inserts or fully replaces a member document. Duplicate delivery tokens
    /// are removed on write.
    pub(crate) async fn save_member(&self, member: &Member) -> Result<(), DatabaseError> {
        let push_tokens = serde_json::to_string(&dedup_tokens(&member.push_tokens))?;
        let matched = serde_json::to_string(&member.matched)?;
        let likes_received = serde_json::to_string(&member.likes_received)?;

        sqlx::query(
            "INSERT INTO members
                (uid, gender, display_name, push_tokens, notify_chats, notify_matches, notify_likes, matched, likes_received, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(uid) DO UPDATE SET
                gender = excluded.gender,
                display_name = excluded.display_name,
                push_tokens = excluded.push_tokens,
                notify_chats = excluded.notify_chats,
                notify_matches = excluded.notify_matches,
                notify_likes = excluded.notify_likes,
                matched = excluded.matched,
                likes_received = excluded.likes_received,
                updated_at = excluded.updated_at",
        )
        .bind(member.uid.as_str())
        .bind(member.gender.as_deref())
        .bind(member.display_name.as_str())
        .bind(push_tokens)
        .bind(member.preferences.chats.to_column())
        .bind(member.preferences.matches.to_column())
        .bind(member.preferences.likes.to_column())
        .bind(matched)
        .bind(likes_received)
        .bind(member.created_at.timestamp_millis())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Appends a delivery token to a member's registry, de-duplicating on
    /// write. Unknown members are a no-op.
    pub(crate) async fn register_push_token(
        &self,
        uid: &str,
        token: &str,
    ) -> Result<(), DatabaseError> {
        let mut txn = self.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT push_tokens FROM members WHERE uid = ?")
                .bind(uid)
                .fetch_optional(&mut *txn)
                .await?;
        let Some((push_tokens_json,)) = row else {
            return Ok(());
        };

        let mut tokens: Vec<String> = serde_json::from_str(&push_tokens_json)?;
        if !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
            sqlx::query("UPDATE members SET push_tokens = ?, updated_at = ? WHERE uid = ?")
                .bind(serde_json::to_string(&tokens)?)
                .bind(Utc::now().timestamp_millis())
                .bind(uid)
                .execute(&mut *txn)
                .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    /// Removes exactly the given tokens from a member's registry.
    ///
    /// The registry is re-read inside the transaction rather than taken from
    /// the snapshot that initiated a send, so a token added concurrently
    /// between send and cleanup survives. Returns how many tokens were
    /// actually removed.
    pub(crate) async fn remove_push_tokens(
        &self,
        uid: &str,
        tokens_to_remove: &[String],
    ) -> Result<usize, DatabaseError> {
        if tokens_to_remove.is_empty() {
            return Ok(0);
        }

        let mut txn = self.pool.begin().await?;

        let row: Option<(String,)> =
            sqlx::query_as("SELECT push_tokens FROM members WHERE uid = ?")
                .bind(uid)
                .fetch_optional(&mut *txn)
                .await?;
        let Some((push_tokens_json,)) = row else {
            return Ok(0);
        };

        let current: Vec<String> = serde_json::from_str(&push_tokens_json)?;
        let remaining: Vec<String> = current
            .iter()
            .filter(|t| !tokens_to_remove.contains(t))
            .cloned()
            .collect();
        let removed = current.len() - remaining.len();

        if removed > 0 {
            sqlx::query("UPDATE members SET push_tokens = ?, updated_at = ? WHERE uid = ?")
                .bind(serde_json::to_string(&remaining)?)
                .bind(Utc::now().timestamp_millis())
                .bind(uid)
                .execute(&mut *txn)
                .await?;
        }

        txn.commit().await?;
        Ok(removed)
    }
}
