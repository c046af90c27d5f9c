use crate::heartline::Heartline;
use crate::heartline::error::Result;
use crate::heartline::notifications::FALLBACK_DISPLAY_NAME;

mod handle_message_created;
mod handle_profile_updated;

impl Heartline {
    /// Resolves a member's display name for notification text. A missing
    /// profile or an empty name yields the fixed fallback, never an error.
    pub(crate) async fn display_name_or_fallback(&self, uid: &str) -> Result<String> {
        Ok(self
            .database
            .find_member(uid)
            .await?
            .map(|member| member.display_name)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string()))
    }
}
