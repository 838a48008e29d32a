//! HTTP surface and request-scoped operations for parley.
//!
//! Each component lives in its own module as a small struct borrowing the
//! [`Database`](parley_db::Database) (`CredentialStore`, `SessionAuthenticator`,
//! `ChannelRegistry`, `ThreadEngine`, `ReactionLedger`, `ReadTracker`), with
//! the axum handlers for it alongside.

pub mod auth;
pub mod channels;
pub mod error;
pub mod messages;
pub mod reactions;
pub mod reads;
pub mod session;

use axum::{
    Json, Router,
    extract::State,
    middleware,
    routing::{get, post},
};

use parley_db::Database;
use parley_types::api::StatusMessage;

use crate::auth::AppState;
use crate::error::ApiResult;

/// Run a store operation on the blocking pool so SQLite I/O never stalls the
/// async runtime.
pub(crate) async fn run_blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> ApiResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db)).await?
}

/// All routes, mounted under `/api`.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/health", get(health));

    let protected_routes = Router::new()
        .route("/auth/profile", get(auth::get_profile).put(auth::update_profile))
        .route("/auth/logout", post(auth::logout))
        .route("/channels", get(channels::list_channels).post(channels::create_channel))
        .route("/channels/unread", get(reads::unread_counts))
        .route("/channels/{channel_id}", get(channels::get_channel))
        .route(
            "/channels/{channel_id}/messages",
            get(messages::list_messages).post(messages::post_message),
        )
        .route("/channels/{channel_id}/read", post(reads::mark_channel_read))
        .route(
            "/messages/{message_id}/replies",
            get(messages::list_replies).post(messages::post_reply),
        )
        .route(
            "/messages/{message_id}/reactions",
            post(reactions::add_reaction).delete(reactions::remove_reaction),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), session::require_session));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<StatusMessage>> {
    run_blocking(&state, |db| {
        db.read(|tx| tx.query_row("SELECT 1", [], |row| row.get::<_, i64>(0)))?;
        Ok(())
    })
    .await?;
    Ok(Json(StatusMessage::new("ok")))
}
