use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public view of an account. Never carries the password hash or the
/// session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A message joined with its author's username.
///
/// `reply_count` is only populated for top-level listings; replies and
/// freshly posted messages leave it out of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageWithAuthor {
    pub id: i64,
    pub channel_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub replies_to: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_count: Option<i64>,
    #[serde(default)]
    pub reactions: Vec<ReactionCount>,
}

impl MessageWithAuthor {
    pub fn is_root(&self) -> bool {
        self.replies_to.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCount {
    pub emoji: String,
    pub count: i64,
}

/// Emoji -> distinct-user count for one message, ordered by emoji.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionSummary {
    pub message_id: i64,
    pub reactions: Vec<ReactionCount>,
}

impl ReactionSummary {
    /// Count for `emoji`, zero when nobody reacted with it.
    pub fn count(&self, emoji: &str) -> i64 {
        self.reactions
            .iter()
            .find(|r| r.emoji == emoji)
            .map_or(0, |r| r.count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCount {
    pub channel_id: i64,
    pub channel_name: String,
    pub unread_count: i64,
}

/// Outcome of marking a channel read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkRead {
    /// The cursor now points at this message id.
    Marked { last_read_message_id: i64 },
    /// The channel has no messages; no cursor was written.
    NothingToMark,
}
