use chrono::Utc;

use super::{Database, DatabaseError};

impl Database {
    /// Reads the banned-word list from the policy document. A missing
    /// document yields an empty list; a malformed one is an error the caller
    /// degrades on.
    pub(crate) async fn banned_words(&self) -> Result<Vec<String>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT banned_words FROM moderation_policy WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((json,)) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    /// Replaces the banned-word list. Duplicates are harmless and kept as-is.
    pub(crate) async fn set_banned_words(&self, words: &[String]) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO moderation_policy (id, banned_words, updated_at) VALUES (1, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                banned_words = excluded.banned_words,
                updated_at = excluded.updated_at",
        )
        .bind(serde_json::to_string(words)?)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::create_test_db;

    #[tokio::test]
    async fn test_banned_words_empty_without_policy_document() {
        let (db, _temp) = create_test_db().await;
        assert!(db.banned_words().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_and_read_banned_words() {
        let (db, _temp) = create_test_db().await;

        let words = vec!["카톡".to_string(), "sns".to_string()];
        db.set_banned_words(&words).await.unwrap();
        assert_eq!(db.banned_words().await.unwrap(), words);

        // Replacing the list is a full overwrite
        let replacement = vec!["연락처".to_string()];
        db.set_banned_words(&replacement).await.unwrap();
        assert_eq!(db.banned_words().await.unwrap(), replacement);
    }

    #[tokio::test]
    async fn test_malformed_policy_document_is_an_error() {
        let (db, _temp) = create_test_db().await;
        sqlx::query(
            "INSERT INTO moderation_policy (id, banned_words, updated_at) VALUES (1, 'not json', 0)",
        )
        .execute(&db.pool)
        .await
        .unwrap();

        assert!(db.banned_words().await.is_err());
    }
}
