use axum::{
    Extension, Json,
    extract::{Path, State},
};
use tracing::debug;

use parley_db::{
    Database,
    queries::{messages, reads},
};
use parley_types::api::MarkReadResponse;
use parley_types::models::{MarkRead, UnreadCount};

use crate::auth::AppState;
use crate::error::ApiResult;
use crate::run_blocking;
use crate::session::CurrentUser;

/// Per-(user, channel) last-read markers and the unread counts derived from
/// them.
pub struct ReadTracker<'a> {
    db: &'a Database,
}

impl<'a> ReadTracker<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Move the cursor to the channel's newest message. An empty channel
    /// writes nothing.
    pub fn mark_read(&self, user_id: i64, channel_id: i64) -> ApiResult<MarkRead> {
        self.db.write(|tx| {
            let Some(latest) = messages::latest_message_id(tx, channel_id)? else {
                return Ok(MarkRead::NothingToMark);
            };

            reads::upsert_read_cursor(tx, user_id, channel_id, latest)?;
            debug!("User {} read channel {} up to {}", user_id, channel_id, latest);
            Ok(MarkRead::Marked {
                last_read_message_id: latest,
            })
        })
    }

    /// Unread counts for every channel, all taken from one read transaction.
    pub fn unread_counts(&self, user_id: i64) -> ApiResult<Vec<UnreadCount>> {
        let rows = self.db.read(|tx| reads::unread_counts(tx, user_id))?;
        Ok(rows.into_iter().map(UnreadCount::from).collect())
    }
}

// -- Handlers --

pub async fn unread_counts(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<UnreadCount>>> {
    let counts = run_blocking(&state, move |db| ReadTracker::new(db).unread_counts(user.id)).await?;
    Ok(Json(counts))
}

pub async fn mark_channel_read(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<MarkReadResponse>> {
    let outcome =
        run_blocking(&state, move |db| ReadTracker::new(db).mark_read(user.id, channel_id))
            .await?;

    let body = match outcome {
        MarkRead::Marked { last_read_message_id } => MarkReadResponse {
            message: "Channel marked as read".to_string(),
            last_read_message_id: Some(last_read_message_id),
        },
        MarkRead::NothingToMark => MarkReadResponse {
            message: "No messages in channel".to_string(),
            last_read_message_id: None,
        },
    };
    Ok(Json(body))
}
