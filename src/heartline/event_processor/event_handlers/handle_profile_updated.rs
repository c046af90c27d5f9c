use crate::heartline::Heartline;
use crate::heartline::error::Result;
use crate::heartline::members::ProfileSnapshot;
use crate::heartline::notifications;
use crate::heartline::profile_diff::{self, ProfileEvent};

impl Heartline {
    /// Reacts to a member profile update.
    ///
    /// Diffs the two snapshots for new matches and likes; every surviving
    /// event is composed and dispatched independently to the member's tokens
    /// from the `after` snapshot. A redelivered event produces the same diff
    /// and the same dispatches; nothing here depends on invocation count.
    pub async fn on_member_profile_updated(
        &self,
        user_id: &str,
        before: &ProfileSnapshot,
        after: &ProfileSnapshot,
    ) -> Result<()> {
        let events = profile_diff::detect_events(before, after);
        if events.is_empty() {
            tracing::debug!(
                target: "heartline::event_processor::handle_profile_updated",
                "No notifiable change for member {}",
                user_id
            );
            return Ok(());
        }

        for event in events {
            let peer_name = self.display_name_or_fallback(event.peer()).await?;
            let payload = match &event {
                ProfileEvent::Match { .. } => notifications::match_payload(&peer_name),
                ProfileEvent::Like { .. } => notifications::like_payload(&peer_name),
            };

            let report = self
                .dispatch_to_member(user_id, &after.push_tokens, &payload)
                .await?;
            tracing::info!(
                target: "heartline::event_processor::handle_profile_updated",
                "Notified {} about new {} from peer {}: {}/{} tokens",
                user_id,
                event.kind(),
                event.peer(),
                report.delivered_count(),
                after.push_tokens.len()
            );
        }

        Ok(())
    }
}
