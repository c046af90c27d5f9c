use thiserror::Error;

use crate::heartline::database::DatabaseError;

pub type Result<T> = core::result::Result<T, HeartlineError>;

#[derive(Error, Debug)]
pub enum HeartlineError {
    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Event queue closed")]
    EventQueueClosed,

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for HeartlineError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        HeartlineError::Other(anyhow::anyhow!(err.to_string()))
    }
}
