use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::heartline::members::ProfileSnapshot;

/// The created-document payload carried by a new-message change event.
///
/// `text` is `None` for media-only messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagePayload {
    pub sender_id: String,
    pub text: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A document-mutation event delivered to the pipeline.
///
/// Events arrive with at-least-once semantics: the same event may be delivered
/// more than once, and every handler must be safe to re-run with the same
/// input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ChangeEvent {
    /// A new message document was created inside a chat room.
    MessageCreated {
        chat_id: String,
        message_id: String,
        message: MessagePayload,
    },
    /// A member profile document was updated; carries full before/after
    /// snapshots of the fields the pipeline diffs.
    ProfileUpdated {
        user_id: String,
        before: ProfileSnapshot,
        after: ProfileSnapshot,
    },
}
