//! Profile change detection.
//!
//! Diffs the before/after snapshots of a member profile update and reports
//! the semantically meaningful events the write produced: a new match, a new
//! like. Unrelated field changes never produce events, and re-running the
//! same diff yields the same events, which is what makes redelivered triggers
//! safe downstream.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::heartline::members::ProfileSnapshot;

/// A high-value event detected on a profile update, carrying the peer that
/// caused it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProfileEvent {
    Match { peer: String },
    Like { peer: String },
}

impl ProfileEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            ProfileEvent::Match { .. } => "match",
            ProfileEvent::Like { .. } => "like",
        }
    }

    pub fn peer(&self) -> &str {
        match self {
            ProfileEvent::Match { peer } | ProfileEvent::Like { peer } => peer,
        }
    }
}

/// Detects events between two snapshots of the same profile.
///
/// Each family reports at most one event per write: when several peers were
/// added or several like counts grew in a single write, only the first is
/// reported (first new uid in registry order for matches, first candidate in
/// ascending uid order for likes). A like from a peer that is matched in
/// `after` is suppressed; the match outranks it for that peer only.
pub(crate) fn detect_events(before: &ProfileSnapshot, after: &ProfileSnapshot) -> Vec<ProfileEvent> {
    // No tokens, no possible notification: skip the diff entirely.
    if after.push_tokens.is_empty() {
        return Vec::new();
    }

    let mut events = Vec::new();

    if after.preferences.matches.is_enabled() && after.matched.len() > before.matched.len() {
        let before_matched: HashSet<&str> = before.matched.iter().map(String::as_str).collect();
        if let Some(peer) = after
            .matched
            .iter()
            .find(|uid| !before_matched.contains(uid.as_str()))
        {
            events.push(ProfileEvent::Match { peer: peer.clone() });
        }
    }

    if after.preferences.likes.is_enabled() {
        let candidate = after.likes_received.iter().find(|(peer, count)| {
            let previous = before.likes_received.get(*peer).copied().unwrap_or(0);
            **count > previous && !after.matched.iter().any(|uid| uid == *peer)
        });
        if let Some((peer, _)) = candidate {
            events.push(ProfileEvent::Like { peer: peer.clone() });
        }
    }

    events
}
