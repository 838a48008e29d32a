use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use rusqlite::Connection;
use tracing::{debug, info};

use parley_db::{
    Database, is_foreign_key_violation,
    models::MessageRow,
    queries::{channels, messages, reactions},
};
use parley_types::api::{PostMessageRequest, PostReplyRequest};
use parley_types::models::{MessageWithAuthor, ReactionCount};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, required};
use crate::run_blocking;
use crate::session::CurrentUser;

/// Root messages and their one level of replies.
///
/// All authenticated users can read and post in every channel; there is no
/// per-channel membership.
pub struct ThreadEngine<'a> {
    db: &'a Database,
}

impl<'a> ThreadEngine<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Post into `channel_id`, optionally as a reply.
    ///
    /// A reply target must exist, live in the same channel and be a root
    /// message; anything else is `InvalidParent`. Roots come back with
    /// `reply_count = 0`.
    pub fn post_message(
        &self,
        channel_id: i64,
        user_id: i64,
        content: Option<&str>,
        replies_to: Option<i64>,
    ) -> ApiResult<MessageWithAuthor> {
        let content = required(content, "Message content")?;

        let row = self.db.write(|tx| {
            if channels::channel_by_id(tx, channel_id)?.is_none() {
                return Err(ApiError::NotFound("Channel"));
            }

            if let Some(parent_id) = replies_to {
                let parent =
                    messages::message_by_id(tx, parent_id)?.ok_or(ApiError::InvalidParent)?;
                check_parent(&parent, channel_id)?;
            }

            insert_and_fetch(tx, channel_id, user_id, &content, replies_to)
        })?;

        info!("User {} posted message {} in channel {}", user_id, row.id, channel_id);
        Ok(into_posted(row))
    }

    /// Reply to `parent_id`; the channel is taken from the parent.
    pub fn post_reply(
        &self,
        parent_id: i64,
        user_id: i64,
        content: Option<&str>,
    ) -> ApiResult<MessageWithAuthor> {
        let content = required(content, "Reply content")?;

        let row = self.db.write(|tx| {
            let parent = messages::message_by_id(tx, parent_id)?
                .ok_or(ApiError::NotFound("Original message"))?;
            check_parent(&parent, parent.channel_id)?;

            insert_and_fetch(tx, parent.channel_id, user_id, &content, Some(parent_id))
        })?;

        info!("User {} replied to message {} with {}", user_id, parent_id, row.id);
        Ok(into_posted(row))
    }

    /// Root messages of the channel, newest first, with reply counts.
    pub fn list_top_level(&self, channel_id: i64) -> ApiResult<Vec<MessageWithAuthor>> {
        self.db.read(|tx| {
            let rows = messages::top_level_messages(tx, channel_id)?;
            debug!("Listing {} root messages in channel {}", rows.len(), channel_id);
            with_reactions(tx, rows)
        })
    }

    /// Direct replies to `message_id`, oldest first.
    pub fn list_replies(&self, message_id: i64) -> ApiResult<Vec<MessageWithAuthor>> {
        self.db.read(|tx| {
            let rows = messages::replies_to_message(tx, message_id)?;
            with_reactions(tx, rows)
        })
    }
}

/// Replies nest exactly one level deep.
fn check_parent(parent: &MessageRow, channel_id: i64) -> ApiResult<()> {
    if parent.channel_id != channel_id || parent.replies_to.is_some() {
        return Err(ApiError::InvalidParent);
    }
    Ok(())
}

fn insert_and_fetch(
    conn: &Connection,
    channel_id: i64,
    user_id: i64,
    content: &str,
    replies_to: Option<i64>,
) -> ApiResult<MessageRow> {
    let id = messages::insert_message(conn, channel_id, user_id, content, replies_to).map_err(|e| {
        if is_foreign_key_violation(&e) {
            ApiError::InvalidParent
        } else {
            ApiError::from(e)
        }
    })?;

    messages::message_by_id(conn, id)?
        .ok_or_else(|| ApiError::internal(format!("message {} missing after insert", id)))
}

fn into_posted(row: MessageRow) -> MessageWithAuthor {
    let mut message = MessageWithAuthor::from(row);
    if message.is_root() {
        message.reply_count = Some(0);
    }
    message
}

/// Attach reaction summaries with one batch query.
fn with_reactions(conn: &Connection, rows: Vec<MessageRow>) -> ApiResult<Vec<MessageWithAuthor>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

    let mut by_message: HashMap<i64, Vec<ReactionCount>> = HashMap::new();
    for r in reactions::reaction_counts_for_messages(conn, &ids)? {
        by_message.entry(r.message_id).or_default().push(r.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let reactions = by_message.remove(&row.id).unwrap_or_default();
            let mut message = MessageWithAuthor::from(row);
            message.reactions = reactions;
            message
        })
        .collect())
}

// -- Handlers --

pub async fn list_messages(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
) -> ApiResult<Json<Vec<MessageWithAuthor>>> {
    let listed =
        run_blocking(&state, move |db| ThreadEngine::new(db).list_top_level(channel_id)).await?;
    Ok(Json(listed))
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Json(req), _): WithRejection<Json<PostMessageRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let message = run_blocking(&state, move |db| {
        ThreadEngine::new(db).post_message(
            channel_id,
            user.id,
            req.content.as_deref(),
            req.replies_to,
        )
    })
    .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_replies(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
) -> ApiResult<Json<Vec<MessageWithAuthor>>> {
    let replies =
        run_blocking(&state, move |db| ThreadEngine::new(db).list_replies(message_id)).await?;
    Ok(Json(replies))
}

pub async fn post_reply(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Json(req), _): WithRejection<Json<PostReplyRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let reply = run_blocking(&state, move |db| {
        ThreadEngine::new(db).post_reply(message_id, user.id, req.content.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(reply)))
}
