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
    Database, is_foreign_key_violation, is_unique_violation,
    queries::{messages, reactions},
};
use parley_types::api::{ReactionRequest, ReactionResponse};
use parley_types::models::{ReactionCount, ReactionSummary};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, required};
use crate::run_blocking;
use crate::session::CurrentUser;

/// (user, message, emoji) rows, at most one per tuple. Summaries are always
/// recounted from the rows inside the mutating transaction.
pub struct ReactionLedger<'a> {
    db: &'a Database,
}

impl<'a> ReactionLedger<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record the reaction. Repeating an existing one is `DuplicateReaction`
    /// and leaves the ledger untouched.
    pub fn add(
        &self,
        user_id: i64,
        message_id: i64,
        emoji: Option<&str>,
    ) -> ApiResult<ReactionSummary> {
        let emoji = required(emoji, "Reaction emoji")?;

        let summary = self.db.write(|tx| {
            if !messages::message_exists(tx, message_id)? {
                return Err(ApiError::NotFound("Message"));
            }

            reactions::insert_reaction(tx, user_id, message_id, &emoji).map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::DuplicateReaction
                } else if is_foreign_key_violation(&e) {
                    ApiError::NotFound("Message")
                } else {
                    ApiError::from(e)
                }
            })?;

            summarize(tx, message_id)
        })?;

        info!("User {} reacted {} to message {}", user_id, emoji, message_id);
        Ok(summary)
    }

    /// Drop the reaction if present; absence is not an error.
    pub fn remove(
        &self,
        user_id: i64,
        message_id: i64,
        emoji: Option<&str>,
    ) -> ApiResult<ReactionSummary> {
        let emoji = required(emoji, "Emoji")?;

        self.db.write(|tx| {
            let removed = reactions::delete_reaction(tx, user_id, message_id, &emoji)?;
            debug!(
                "User {} removed {} reaction(s) {} from message {}",
                user_id, removed, emoji, message_id
            );
            summarize(tx, message_id)
        })
    }

    pub fn summary(&self, message_id: i64) -> ApiResult<ReactionSummary> {
        self.db.read(|tx| summarize(tx, message_id))
    }
}

fn summarize(conn: &Connection, message_id: i64) -> ApiResult<ReactionSummary> {
    let reactions = reactions::reaction_counts(conn, message_id)?
        .into_iter()
        .map(ReactionCount::from)
        .collect();
    Ok(ReactionSummary {
        message_id,
        reactions,
    })
}

// -- Handlers --

pub async fn add_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Json(req), _): WithRejection<Json<ReactionRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let summary = run_blocking(&state, move |db| {
        ReactionLedger::new(db).add(user.id, message_id, req.emoji.as_deref())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(ReactionResponse {
            message: "Reaction added".to_string(),
            reactions: summary.reactions,
        }),
    ))
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    Path(message_id): Path<i64>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Json(req), _): WithRejection<Json<ReactionRequest>, ApiError>,
) -> ApiResult<Json<ReactionResponse>> {
    let summary = run_blocking(&state, move |db| {
        ReactionLedger::new(db).remove(user.id, message_id, req.emoji.as_deref())
    })
    .await?;

    Ok(Json(ReactionResponse {
        message: "Reaction removed".to_string(),
        reactions: summary.reactions,
    }))
}
