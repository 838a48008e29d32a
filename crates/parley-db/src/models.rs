//! Database row types. These map directly to SQLite rows and stay distinct
//! from the parley-types wire models; conversions live here.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

use parley_types::models::{Channel, MessageWithAuthor, ReactionCount, UnreadCount, User};

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub session_token: Option<String>,
    pub created_at: String,
}

pub struct ChannelRow {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

pub struct MessageRow {
    pub id: i64,
    pub channel_id: i64,
    pub user_id: i64,
    pub username: String,
    pub content: String,
    pub replies_to: Option<i64>,
    pub created_at: String,
    pub reply_count: Option<i64>,
}

pub struct ReactionCountRow {
    pub message_id: i64,
    pub emoji: String,
    pub count: i64,
}

pub struct ReadCursorRow {
    pub user_id: i64,
    pub channel_id: i64,
    pub last_read_message_id: i64,
    pub last_read_at: String,
}

pub struct UnreadRow {
    pub channel_id: i64,
    pub channel_name: String,
    pub unread_count: i64,
}

/// SQLite's `datetime('now')` yields "YYYY-MM-DD HH:MM:SS" without a zone;
/// treat it as UTC. RFC 3339 strings are accepted too.
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt timestamp '{}': {}", raw, e);
            DateTime::default()
        })
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            username: row.username,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

impl From<ChannelRow> for Channel {
    fn from(row: ChannelRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: parse_timestamp(&row.created_at),
        }
    }
}

impl From<MessageRow> for MessageWithAuthor {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            channel_id: row.channel_id,
            user_id: row.user_id,
            username: row.username,
            content: row.content,
            replies_to: row.replies_to,
            created_at: parse_timestamp(&row.created_at),
            reply_count: row.reply_count,
            reactions: Vec::new(),
        }
    }
}

impl From<ReactionCountRow> for ReactionCount {
    fn from(row: ReactionCountRow) -> Self {
        Self {
            emoji: row.emoji,
            count: row.count,
        }
    }
}

impl From<UnreadRow> for UnreadCount {
    fn from(row: UnreadRow) -> Self {
        Self {
            channel_id: row.channel_id,
            channel_name: row.channel_name,
            unread_count: row.unread_count,
        }
    }
}
