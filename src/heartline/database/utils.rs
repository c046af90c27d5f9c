use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use super::DatabaseError;

/// Decode a JSON text column, reporting failures as column-decode errors so
/// they surface with the offending column name.
pub(crate) fn decode_json_column<T: DeserializeOwned>(
    index: &str,
    raw: &str,
) -> Result<T, sqlx::Error> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: index.to_string(),
        source: Box::new(e),
    })
}

/// Decode a millisecond timestamp column.
pub(crate) fn decode_timestamp_column(
    index: &str,
    millis: i64,
) -> Result<DateTime<Utc>, sqlx::Error> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(DatabaseError::InvalidTimestamp { timestamp: millis })
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: index.to_string(),
            source: Box::new(e),
        })
}
