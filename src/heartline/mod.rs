use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc::{self, Sender};

pub mod chats;
pub mod database;
pub mod dispatcher;
pub mod error;
mod event_processor;
pub mod members;
pub mod moderation;
pub mod notifications;
pub mod profile_diff;
pub mod push;

use crate::init_tracing;
use crate::types::ChangeEvent;
use chats::{ChatMessage, ChatRoom};
use database::Database;
use error::{HeartlineError, Result};
use members::Member;
use push::{HttpPushClient, PushSender};

/// Connection settings for the push-delivery service.
#[derive(Clone, Debug)]
pub struct PushConfig {
    /// Full URL of the delivery service's send endpoint
    pub endpoint: String,

    /// Optional bearer token attached to every send request
    pub api_key: Option<String>,
}

impl PushConfig {
    /// Loads the push configuration from the environment (an `.env` file is
    /// honored when present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        let endpoint = std::env::var("HEARTLINE_PUSH_ENDPOINT").map_err(|_| {
            HeartlineError::Configuration("HEARTLINE_PUSH_ENDPOINT is not set".to_string())
        })?;
        let api_key = std::env::var("HEARTLINE_PUSH_API_KEY").ok();
        Ok(Self { endpoint, api_key })
    }
}

#[derive(Clone, Debug)]
pub struct HeartlineConfig {
    /// Directory for application data
    pub data_dir: PathBuf,

    /// Directory for application logs
    pub logs_dir: PathBuf,

    /// Push-delivery service settings
    pub push: PushConfig,
}

impl HeartlineConfig {
    pub fn new(data_dir: &Path, logs_dir: &Path, push: PushConfig) -> Self {
        let env_suffix = if cfg!(debug_assertions) {
            "dev"
        } else {
            "release"
        };
        let formatted_data_dir = data_dir.join(env_suffix);
        let formatted_logs_dir = logs_dir.join(env_suffix);

        Self {
            data_dir: formatted_data_dir,
            logs_dir: formatted_logs_dir,
            push,
        }
    }
}

/// The application handle: document store, push client and the event queue.
///
/// Every collaborator is an explicitly constructed, injectable handle; there
/// is no process-wide instance, and tests substitute the push client with a
/// double.
pub struct Heartline {
    pub config: HeartlineConfig,
    pub(crate) database: Arc<Database>,
    pub(crate) push: Arc<dyn PushSender>,
    event_sender: Sender<ChangeEvent>,
    shutdown_sender: Sender<()>,
}

impl std::fmt::Debug for Heartline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Heartline")
            .field("config", &self.config)
            .field("database", &"<REDACTED>")
            .field("push", &"<REDACTED>")
            .finish()
    }
}

impl Heartline {
    /// Initializes the pipeline with the provided configuration.
    ///
    /// Sets up the data and log directories, configures logging, opens the
    /// document store, builds the HTTP push client from the configuration and
    /// starts the event processing loop.
    ///
    /// # Arguments
    ///
    /// * `config` - A [`HeartlineConfig`] specifying directories and the push
    ///   service settings.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created, the database cannot
    /// be opened or migrated, or the push client cannot be built.
    pub async fn initialize_heartline(config: HeartlineConfig) -> Result<Arc<Self>> {
        let push = Arc::new(HttpPushClient::new(config.push.clone())?);
        Self::initialize_with_push_sender(config, push).await
    }

    /// Initializes the pipeline with an externally constructed push client.
    ///
    /// This is the seam test doubles and alternative delivery backends plug
    /// into; [`Heartline::initialize_heartline`] delegates here.
    pub async fn initialize_with_push_sender(
        config: HeartlineConfig,
        push: Arc<dyn PushSender>,
    ) -> Result<Arc<Self>> {
        let data_dir = &config.data_dir;
        let logs_dir = &config.logs_dir;

        // Setup directories
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))
            .map_err(HeartlineError::from)?;
        std::fs::create_dir_all(logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))
            .map_err(HeartlineError::from)?;

        // Only initialize tracing once
        init_tracing(logs_dir);

        tracing::debug!(
            target: "heartline::initialize_heartline",
            "Logging initialized in directory: {:?}",
            logs_dir
        );

        let database = Arc::new(Database::new(data_dir.join("heartline.sqlite")).await?);

        // Create event processing channels
        let (event_sender, event_receiver) = mpsc::channel(500);
        let (shutdown_sender, shutdown_receiver) = mpsc::channel(1);

        let heartline = Arc::new(Self {
            config,
            database,
            push,
            event_sender,
            shutdown_sender,
        });

        // Start the event processing loop only when not running tests
        if !cfg!(test) {
            heartline
                .clone()
                .start_event_processing_loop(event_receiver, shutdown_receiver);
        }

        Ok(heartline)
    }

    // Thin store operations the application glue calls; the pipeline itself
    // reads and writes through the same document store.

    pub async fn find_member(&self, uid: &str) -> Result<Option<Member>> {
        Ok(self.database.find_member(uid).await?)
    }

    pub async fn save_member(&self, member: &Member) -> Result<()> {
        Ok(self.database.save_member(member).await?)
    }

    /// Adds a delivery token to a member's registry, de-duplicating on write.
    pub async fn register_push_token(&self, uid: &str, token: &str) -> Result<()> {
        Ok(self.database.register_push_token(uid, token).await?)
    }

    pub async fn find_chat_room(&self, chat_id: &str) -> Result<Option<ChatRoom>> {
        Ok(self.database.find_chat_room(chat_id).await?)
    }

    /// Creates a chat room between the given participants.
    pub async fn create_chat_room(&self, participants: Vec<String>) -> Result<ChatRoom> {
        let room = ChatRoom::new(uuid::Uuid::new_v4().to_string(), participants);
        self.database.save_chat_room(&room).await?;
        Ok(room)
    }

    pub async fn find_chat_message(
        &self,
        chat_id: &str,
        message_id: &str,
    ) -> Result<Option<ChatMessage>> {
        Ok(self.database.find_chat_message(chat_id, message_id).await?)
    }

    /// Stores a new chat message document. The caller queues the matching
    /// [`ChangeEvent::MessageCreated`] to run the pipeline over it.
    pub async fn create_chat_message(
        &self,
        chat_id: &str,
        sender_id: &str,
        text: Option<String>,
    ) -> Result<ChatMessage> {
        let message = ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            text,
            is_blocked: false,
            created_at: chrono::Utc::now(),
        };
        self.database.insert_chat_message(&message).await?;
        Ok(message)
    }

    /// Replaces the banned-word list of the moderation policy.
    pub async fn set_banned_words(&self, words: &[String]) -> Result<()> {
        Ok(self.database.set_banned_words(words).await?)
    }
}
