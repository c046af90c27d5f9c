//! Message moderation.
//!
//! Classifies chat text against two layers of policy: a fixed set of
//! contact-information patterns (phone numbers, email addresses, social
//! handles) and a dynamically loaded banned-word list. The static layer is
//! always available; the dynamic layer degrades to a no-op when the policy
//! document cannot be read, so classification never fails the triggering
//! event.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

// The three fixed pattern families. A hit in any one of them blocks; they are
// checked in sequence with a short-circuit purely to skip needless work.

/// Korean-style mobile numbers: 10-11 digits grouped as 3/3-4/4 with optional
/// separators, e.g. `010-1234-5678` or `01012345678`.
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"01[0-9][-.\s]?\d{3,4}[-.\s]?\d{4}").expect("Failed to compile phone pattern")
});

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")
        .expect("Failed to compile email pattern")
});

/// `@handle` mentions and `platform.com/handle` profile links.
static HANDLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(r"@[a-z0-9_.]{2,}|\b[a-z0-9-]+\.com/[a-z0-9_.]{2,}")
        .case_insensitive(true)
        .build()
        .expect("Failed to compile handle pattern")
});

/// The dynamic layer of the moderation policy: a list of banned words loaded
/// from the external policy document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BannedWordList {
    words: Vec<String>,
}

impl BannedWordList {
    pub fn new(words: Vec<String>) -> Self {
        Self { words }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| w.trim().is_empty())
    }

    /// Compiles the list into a single case-insensitive alternation with
    /// Unicode word boundaries. Every word is escaped first so characters
    /// with special meaning in the pattern language match literally.
    ///
    /// Returns `None` for an empty list, or if the combined pattern fails to
    /// compile (treated the same as an unavailable policy).
    fn to_regex(&self) -> Option<Regex> {
        let escaped: Vec<String> = self
            .words
            .iter()
            .filter(|w| !w.trim().is_empty())
            .map(|w| regex::escape(w))
            .collect();
        if escaped.is_empty() {
            return None;
        }

        let pattern = format!(r"\b(?:{})\b", escaped.join("|"));
        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!(
                    target: "heartline::moderation",
                    "Failed to compile banned-word pattern, skipping dynamic checks: {}",
                    e
                );
                None
            }
        }
    }
}

/// Decides whether `text` violates the moderation policy.
///
/// The three static pattern families are each authoritative on their own; the
/// banned-word list is only consulted when none of them matched.
pub fn violates_policy(text: &str, policy: &BannedWordList) -> bool {
    if PHONE_PATTERN.is_match(text)
        || EMAIL_PATTERN.is_match(text)
        || HANDLE_PATTERN.is_match(text)
    {
        return true;
    }

    match policy.to_regex() {
        Some(re) => re.is_match(text),
        None => false,
    }
}
