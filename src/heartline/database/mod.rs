use sqlx::{
    Sqlite, SqlitePool,
    migrate::{MigrateDatabase, Migrator},
    sqlite::SqlitePoolOptions,
};
use std::{path::PathBuf, sync::LazyLock, time::Duration};
use thiserror::Error;

pub mod chat_messages;
pub mod chat_rooms;
pub mod members;
pub mod policy;
pub(crate) mod utils;

pub static MIGRATOR: LazyLock<Migrator> = LazyLock::new(|| sqlx::migrate!("./db_migrations"));

const DB_ACQUIRE_TIMEOUT_SECS: u64 = 5;
const DB_MAX_CONNECTIONS: u32 = 10;
const DB_BUSY_TIMEOUT_MS: u32 = 5000;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),
    #[error("Invalid timestamp: {timestamp} cannot be converted to DateTime")]
    InvalidTimestamp { timestamp: i64 },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Handle to the document store holding member, chat and policy documents.
#[derive(Clone, Debug)]
pub struct Database {
    pub pool: SqlitePool,
    pub path: PathBuf,
}

impl Database {
    pub async fn new(db_path: PathBuf) -> Result<Self, DatabaseError> {
        // Create parent directories if they don't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}", db_path.display());

        tracing::debug!("Checking if DB exists...{:?}", db_url);
        match Sqlite::database_exists(&db_url).await {
            Ok(true) => {
                tracing::debug!("DB exists");
            }
            Ok(false) => {
                tracing::debug!("DB does not exist, creating...");
                Sqlite::create_database(&db_url).await.map_err(|e| {
                    tracing::error!("Error creating DB: {:?}", e);
                    DatabaseError::Sqlx(e)
                })?;
                tracing::debug!("DB created");
            }
            Err(e) => {
                tracing::warn!(
                    "Could not check if database exists: {:?}, attempting to create",
                    e
                );
                Sqlite::create_database(&db_url).await.map_err(|e| {
                    tracing::error!("Error creating DB: {:?}", e);
                    DatabaseError::Sqlx(e)
                })?;
            }
        }

        let pool = Self::create_connection_pool(&db_url).await?;

        // Automatically run migrations
        MIGRATOR.run(&pool).await?;

        Ok(Self {
            pool,
            path: db_path,
        })
    }

    /// Creates and configures a SQLite connection pool
    async fn create_connection_pool(db_url: &str) -> Result<SqlitePool, DatabaseError> {
        tracing::debug!("Creating connection pool...");
        let pool = SqlitePoolOptions::new()
            .acquire_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
            .max_connections(DB_MAX_CONNECTIONS)
            .after_connect(|conn, _| {
                Box::pin(async move {
                    let conn = &mut *conn;
                    // Enable WAL mode for better concurrent access
                    sqlx::query("PRAGMA journal_mode=WAL")
                        .execute(&mut *conn)
                        .await?;
                    // Set busy timeout for lock contention
                    sqlx::query(&format!("PRAGMA busy_timeout={DB_BUSY_TIMEOUT_MS}"))
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA foreign_keys = ON")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(&format!("{db_url}?mode=rwc"))
            .await?;
        Ok(pool)
    }
}
