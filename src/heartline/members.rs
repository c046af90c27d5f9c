use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One notification preference as the member stored it.
///
/// `Unset` means the member never touched the setting; the single place that
/// decides what that means is [`NotificationSetting::is_enabled`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum NotificationSetting {
    #[default]
    Unset,
    Enabled,
    Disabled,
}

impl NotificationSetting {
    /// Resolve the stored value to an effective on/off decision. A setting the
    /// member never touched counts as enabled.
    pub fn is_enabled(self) -> bool {
        !matches!(self, NotificationSetting::Disabled)
    }

    pub(crate) fn from_column(value: Option<bool>) -> Self {
        match value {
            None => NotificationSetting::Unset,
            Some(true) => NotificationSetting::Enabled,
            Some(false) => NotificationSetting::Disabled,
        }
    }

    pub(crate) fn to_column(self) -> Option<bool> {
        match self {
            NotificationSetting::Unset => None,
            NotificationSetting::Enabled => Some(true),
            NotificationSetting::Disabled => Some(false),
        }
    }
}

/// Per-category notification preferences on a member profile.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationPreferences {
    pub chats: NotificationSetting,
    pub matches: NotificationSetting,
    pub likes: NotificationSetting,
}

/// A member profile document.
///
/// `push_tokens` is the member's delivery-token registry: ordered, duplicates
/// removed on write. `matched` holds partner uids with set semantics, and
/// `likes_received` maps a peer uid to the cumulative number of likes received
/// from that peer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub uid: String,
    pub gender: Option<String>,
    pub display_name: String,
    pub push_tokens: Vec<String>,
    pub preferences: NotificationPreferences,
    pub matched: Vec<String>,
    pub likes_received: BTreeMap<String, u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Member {
    pub fn new(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.into(),
            gender: None,
            display_name: display_name.into(),
            push_tokens: Vec::new(),
            preferences: NotificationPreferences::default(),
            matched: Vec::new(),
            likes_received: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The subset of the profile the change detector diffs.
    pub fn snapshot(&self) -> ProfileSnapshot {
        ProfileSnapshot {
            display_name: self.display_name.clone(),
            push_tokens: self.push_tokens.clone(),
            preferences: self.preferences,
            matched: self.matched.clone(),
            likes_received: self.likes_received.clone(),
        }
    }
}

/// Point-in-time view of the mutable profile fields, as carried by a
/// profile-updated change event (one snapshot for before, one for after).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProfileSnapshot {
    pub display_name: String,
    pub push_tokens: Vec<String>,
    pub preferences: NotificationPreferences,
    pub matched: Vec<String>,
    pub likes_received: BTreeMap<String, u32>,
}
