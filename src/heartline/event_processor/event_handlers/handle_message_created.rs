use crate::heartline::error::Result;
use crate::heartline::moderation::{self, BannedWordList};
use crate::heartline::notifications;
use crate::heartline::Heartline;
use crate::types::MessagePayload;

impl Heartline {
    /// Reacts to a newly created chat message.
    ///
    /// The message is classified before anything can propagate: a policy
    /// violation redacts it in place, flags the room and stops here, so
    /// blocked content is never dispatched. Clean messages clear a stale
    /// room-level block, then fan out a notification to the other
    /// participant. Safe to re-run with the same input: redaction is a fixed
    /// point and delivery is tolerant of duplicates.
    pub async fn on_chat_message_created(
        &self,
        chat_id: &str,
        message_id: &str,
        message: &MessagePayload,
    ) -> Result<()> {
        tracing::debug!(
            target: "heartline::event_processor::handle_message_created",
            "New message {} from {} in chat {}",
            message_id,
            message.sender_id,
            chat_id
        );

        if let Some(text) = &message.text {
            let policy = self.load_banned_words().await;
            if moderation::violates_policy(text, &policy) {
                return self.block_message(chat_id, message_id, &message.sender_id).await;
            }
        }

        let Some(room) = self.database.find_chat_room(chat_id).await? else {
            tracing::warn!(
                target: "heartline::event_processor::handle_message_created",
                "Chat room {} not found",
                chat_id
            );
            return Ok(());
        };

        // The room-level blocked flag only reflects the latest message; a
        // clean one lifts it before dispatch.
        if room.is_blocked {
            self.database.clear_room_blocked(chat_id).await?;
        }

        let Some(recipient_id) = room.other_participant(&message.sender_id) else {
            tracing::warn!(
                target: "heartline::event_processor::handle_message_created",
                "No recipient found in chat {}",
                chat_id
            );
            return Ok(());
        };

        let Some(recipient) = self.database.find_member(recipient_id).await? else {
            tracing::warn!(
                target: "heartline::event_processor::handle_message_created",
                "Recipient member {} not found",
                recipient_id
            );
            return Ok(());
        };

        if !recipient.preferences.chats.is_enabled() {
            tracing::debug!(
                target: "heartline::event_processor::handle_message_created",
                "Recipient {} has chat notifications disabled",
                recipient.uid
            );
            return Ok(());
        }

        if recipient.push_tokens.is_empty() {
            tracing::debug!(
                target: "heartline::event_processor::handle_message_created",
                "Recipient {} has no delivery tokens",
                recipient.uid
            );
            return Ok(());
        }

        let sender_name = self.display_name_or_fallback(&message.sender_id).await?;
        let payload = notifications::chat_message_payload(
            &sender_name,
            &message.sender_id,
            message.text.as_deref(),
        );

        let report = self
            .dispatch_to_member(&recipient.uid, &recipient.push_tokens, &payload)
            .await?;
        tracing::info!(
            target: "heartline::event_processor::handle_message_created",
            "Notified {} for chat {}: {}/{} tokens",
            recipient.uid,
            chat_id,
            report.delivered_count(),
            recipient.push_tokens.len()
        );

        Ok(())
    }

    /// Loads the banned-word list, degrading to an empty list when the policy
    /// document is unreadable so the static patterns still apply.
    async fn load_banned_words(&self) -> BannedWordList {
        match self.database.banned_words().await {
            Ok(words) => BannedWordList::new(words),
            Err(e) => {
                tracing::warn!(
                    target: "heartline::event_processor::handle_message_created",
                    "Moderation policy unavailable, using static checks only: {}",
                    e
                );
                BannedWordList::default()
            }
        }
    }

    /// Redacts a blocked message and flags its room. Never deletes anything,
    /// and never dispatches a notification for blocked content.
    async fn block_message(&self, chat_id: &str, message_id: &str, sender_id: &str) -> Result<()> {
        self.database.redact_chat_message(chat_id, message_id).await?;
        self.database.mark_room_blocked(chat_id, sender_id).await?;
        tracing::info!(
            target: "heartline::event_processor::handle_message_created",
            "Blocked message {} in chat {}",
            message_id,
            chat_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::heartline::chats::{BLOCKED_MESSAGE_PLACEHOLDER, ChatMessage, ChatRoom};
    use crate::heartline::members::{Member, NotificationSetting};
    use crate::heartline::notifications::{FALLBACK_DISPLAY_NAME, MEDIA_MESSAGE_BODY};
    use crate::heartline::test_utils::*;
    use crate::heartline::Heartline;
    use crate::types::MessagePayload;

    async fn seed_room(heartline: &Heartline) {
        heartline
            .database
            .save_chat_room(&ChatRoom::new(
                "room-1",
                vec!["uid-a".to_string(), "uid-b".to_string()],
            ))
            .await
            .unwrap();
    }

    async fn seed_members(heartline: &Heartline) {
        let sender = Member::new("uid-a", "하준");
        heartline.database.save_member(&sender).await.unwrap();

        let mut recipient = Member::new("uid-b", "수진");
        recipient.push_tokens = vec!["token-1".to_string()];
        heartline.database.save_member(&recipient).await.unwrap();
    }

    async fn seed_message(heartline: &Heartline, id: &str, text: Option<&str>) -> MessagePayload {
        let message = ChatMessage {
            id: id.to_string(),
            chat_id: "room-1".to_string(),
            sender_id: "uid-a".to_string(),
            text: text.map(str::to_string),
            is_blocked: false,
            created_at: Utc::now(),
        };
        heartline.database.insert_chat_message(&message).await.unwrap();
        MessagePayload {
            sender_id: message.sender_id,
            text: message.text,
            created_at: message.created_at,
        }
    }

    #[tokio::test]
    async fn test_phone_number_message_is_blocked_and_not_dispatched() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        seed_members(&heartline).await;
        let payload = seed_message(&heartline, "msg-1", Some("010-1234-5678")).await;

        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();

        let message = heartline
            .database
            .find_chat_message("room-1", "msg-1")
            .await
            .unwrap()
            .unwrap();
        assert!(message.is_blocked);
        assert_eq!(message.text.as_deref(), Some(BLOCKED_MESSAGE_PLACEHOLDER));

        let room = heartline
            .database
            .find_chat_room("room-1")
            .await
            .unwrap()
            .unwrap();
        assert!(room.is_blocked);
        assert_eq!(
            room.last_message.as_deref(),
            Some(BLOCKED_MESSAGE_PLACEHOLDER)
        );
        assert_eq!(room.read_markers.get("uid-a"), Some(&true));

        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_blocking_is_idempotent_under_redelivery() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        seed_members(&heartline).await;
        let payload = seed_message(&heartline, "msg-1", Some("010-1234-5678")).await;

        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();
        let first = heartline
            .database
            .find_chat_message("room-1", "msg-1")
            .await
            .unwrap()
            .unwrap();

        // The trigger source redelivers the same event
        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();
        let second = heartline
            .database
            .find_chat_message("room-1", "msg-1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(second, first);
        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_banned_word_from_policy_blocks_message() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        seed_members(&heartline).await;
        heartline
            .database
            .set_banned_words(&["카톡".to_string()])
            .await
            .unwrap();
        let payload = seed_message(&heartline, "msg-1", Some("카톡 아이디 알려줘")).await;

        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();

        let message = heartline
            .database
            .find_chat_message("room-1", "msg-1")
            .await
            .unwrap()
            .unwrap();
        assert!(message.is_blocked);
        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_policy_degrades_to_static_checks() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        seed_members(&heartline).await;
        // Corrupt policy document: the dynamic layer is skipped, static
        // patterns still apply
        sqlx::query(
            "INSERT INTO moderation_policy (id, banned_words, updated_at) VALUES (1, 'not json', 0)",
        )
        .execute(&heartline.database.pool)
        .await
        .unwrap();

        let clean = seed_message(&heartline, "msg-1", Some("카톡 아이디 알려줘")).await;
        heartline
            .on_chat_message_created("room-1", "msg-1", &clean)
            .await
            .unwrap();
        assert_eq!(push.sent().len(), 1);

        let phone = seed_message(&heartline, "msg-2", Some("010-1234-5678")).await;
        heartline
            .on_chat_message_created("room-1", "msg-2", &phone)
            .await
            .unwrap();
        let message = heartline
            .database
            .find_chat_message("room-1", "msg-2")
            .await
            .unwrap()
            .unwrap();
        assert!(message.is_blocked);
        assert_eq!(push.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_clean_message_is_dispatched_to_recipient() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        seed_members(&heartline).await;
        let payload = seed_message(&heartline, "msg-1", Some("영화 볼래요?")).await;

        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();

        let sent = push.sent();
        assert_eq!(sent.len(), 1);
        let (token, push_payload) = &sent[0];
        assert_eq!(token, "token-1");
        assert_eq!(push_payload.title, "하준님");
        assert_eq!(push_payload.body, "영화 볼래요?");
        assert_eq!(push_payload.url, "/chat/uid-a");
    }

    #[tokio::test]
    async fn test_clean_message_clears_stale_room_block() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        let mut room = ChatRoom::new("room-1", vec!["uid-a".to_string(), "uid-b".to_string()]);
        room.is_blocked = true;
        heartline.database.save_chat_room(&room).await.unwrap();
        seed_members(&heartline).await;
        let payload = seed_message(&heartline, "msg-1", Some("영화 볼래요?")).await;

        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();

        let room = heartline
            .database
            .find_chat_room("room-1")
            .await
            .unwrap()
            .unwrap();
        assert!(!room.is_blocked);
        assert_eq!(push.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_media_message_gets_placeholder_body() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        seed_members(&heartline).await;
        let payload = seed_message(&heartline, "msg-1", None).await;

        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();

        let sent = push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.body, MEDIA_MESSAGE_BODY);
    }

    #[tokio::test]
    async fn test_missing_room_is_a_noop() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_members(&heartline).await;
        let payload = MessagePayload {
            sender_id: "uid-a".to_string(),
            text: Some("영화 볼래요?".to_string()),
            created_at: Utc::now(),
        };

        let result = heartline
            .on_chat_message_created("room-x", "msg-1", &payload)
            .await;

        assert!(result.is_ok());
        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_missing_recipient_is_a_noop() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        // Only the sender exists
        heartline
            .database
            .save_member(&Member::new("uid-a", "하준"))
            .await
            .unwrap();
        let payload = seed_message(&heartline, "msg-1", Some("영화 볼래요?")).await;

        let result = heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await;

        assert!(result.is_ok());
        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_chat_preference_suppresses_dispatch() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        heartline
            .database
            .save_member(&Member::new("uid-a", "하준"))
            .await
            .unwrap();
        let mut recipient = Member::new("uid-b", "수진");
        recipient.push_tokens = vec!["token-1".to_string()];
        recipient.preferences.chats = NotificationSetting::Disabled;
        heartline.database.save_member(&recipient).await.unwrap();
        let payload = seed_message(&heartline, "msg-1", Some("영화 볼래요?")).await;

        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();

        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_recipient_without_tokens_gets_nothing() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        heartline
            .database
            .save_member(&Member::new("uid-a", "하준"))
            .await
            .unwrap();
        heartline
            .database
            .save_member(&Member::new("uid-b", "수진"))
            .await
            .unwrap();
        let payload = seed_message(&heartline, "msg-1", Some("영화 볼래요?")).await;

        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();

        assert!(push.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_sender_uses_fallback_name() {
        let (heartline, push, _data_temp, _logs_temp) = create_mock_heartline().await;
        seed_room(&heartline).await;
        // Recipient exists, sender profile does not
        let mut recipient = Member::new("uid-b", "수진");
        recipient.push_tokens = vec!["token-1".to_string()];
        heartline.database.save_member(&recipient).await.unwrap();
        let payload = seed_message(&heartline, "msg-1", Some("영화 볼래요?")).await;

        heartline
            .on_chat_message_created("room-1", "msg-1", &payload)
            .await
            .unwrap();

        let sent = push.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.title, format!("{FALLBACK_DISPLAY_NAME}님"));
    }
}
