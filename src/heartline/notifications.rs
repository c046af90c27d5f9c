//! Notification composition.
//!
//! Pure mapping from a detected event plus the resolved display name to the
//! delivery payload. The payload is data-only: the client service worker
//! reads `title`/`body`/`icon`/`url` keys itself and renders the
//! notification, so everything here is a plain string field.

use crate::heartline::push::PushPayload;

/// Shown when the acting member's profile cannot be resolved.
pub(crate) const FALLBACK_DISPLAY_NAME: &str = "누군가";

/// Body used for messages that carry no text (media-only).
pub(crate) const MEDIA_MESSAGE_BODY: &str = "사진을 보냈습니다.";

const DEFAULT_ICON: &str = "/icon-192.png";
const DEFAULT_BADGE: &str = "/badge-72.png";

const MATCH_TITLE: &str = "새로운 매칭이 성사되었어요! 💕";
const LIKE_TITLE: &str = "새로운 호감이 도착했어요 💗";

fn payload(title: String, body: String, url: String) -> PushPayload {
    PushPayload {
        title,
        body,
        icon: DEFAULT_ICON.to_string(),
        badge: DEFAULT_BADGE.to_string(),
        url,
    }
}

/// Payload for a new match with `partner_name`.
pub(crate) fn match_payload(partner_name: &str) -> PushPayload {
    payload(
        MATCH_TITLE.to_string(),
        format!("{partner_name}님과 매칭되었습니다. 지금 대화를 시작해보세요!"),
        "/matches".to_string(),
    )
}

/// Payload for a new like from `liker_name`.
pub(crate) fn like_payload(liker_name: &str) -> PushPayload {
    payload(
        LIKE_TITLE.to_string(),
        format!("{liker_name}님이 회원님에게 호감을 보냈습니다."),
        "/likes".to_string(),
    )
}

/// Payload for a new chat message. A missing `text` means a media-only
/// message and gets the fixed media body. The deep link targets the sender's
/// chat so tapping the notification opens the right conversation.
pub(crate) fn chat_message_payload(
    sender_name: &str,
    sender_id: &str,
    text: Option<&str>,
) -> PushPayload {
    payload(
        format!("{sender_name}님"),
        text.unwrap_or(MEDIA_MESSAGE_BODY).to_string(),
        format!("/chat/{sender_id}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_payload() {
        let payload = match_payload("지우");
        assert_eq!(payload.title, MATCH_TITLE);
        assert!(payload.body.contains("지우님"));
        assert_eq!(payload.url, "/matches");
        assert_eq!(payload.icon, DEFAULT_ICON);
    }

    #[test]
    fn test_like_payload() {
        let payload = like_payload("하준");
        assert_eq!(payload.title, LIKE_TITLE);
        assert!(payload.body.contains("하준님"));
        assert_eq!(payload.url, "/likes");
    }

    #[test]
    fn test_chat_message_payload_with_text() {
        let payload = chat_message_payload("서연", "uid-b", Some("내일 볼까요?"));
        assert_eq!(payload.title, "서연님");
        assert_eq!(payload.body, "내일 볼까요?");
        assert_eq!(payload.url, "/chat/uid-b");
    }

    #[test]
    fn test_chat_message_payload_for_media_message() {
        let payload = chat_message_payload("서연", "uid-b", None);
        assert_eq!(payload.body, MEDIA_MESSAGE_BODY);
    }

    #[test]
    fn test_fallback_name_composes_like_any_other() {
        let payload = chat_message_payload(FALLBACK_DISPLAY_NAME, "uid-b", Some("hi"));
        assert_eq!(payload.title, "누군가님");
    }
}
