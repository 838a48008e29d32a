use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use axum_extra::extract::WithRejection;
use tracing::info;

use parley_db::{Database, is_unique_violation, queries::channels};
use parley_types::api::CreateChannelRequest;
use parley_types::models::Channel;

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult, required};
use crate::run_blocking;

/// The set of named channels. Channels are never deleted.
pub struct ChannelRegistry<'a> {
    db: &'a Database,
}

impl<'a> ChannelRegistry<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn create(&self, name: Option<&str>) -> ApiResult<Channel> {
        let name = required(name, "Channel name")?;

        let row = self.db.write(|tx| {
            let id = channels::insert_channel(tx, &name).map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::DuplicateChannel
                } else {
                    ApiError::from(e)
                }
            })?;
            channels::channel_by_id(tx, id)?.ok_or(ApiError::NotFound("Channel"))
        })?;

        info!("Channel {} created as '{}'", row.id, row.name);
        Ok(row.into())
    }

    pub fn list(&self) -> ApiResult<Vec<Channel>> {
        let rows = self.db.read(|tx| channels::list_channels(tx))?;
        Ok(rows.into_iter().map(Channel::from).collect())
    }

    pub fn get(&self, id: i64) -> ApiResult<Channel> {
        self.db
            .read(|tx| channels::channel_by_id(tx, id))?
            .map(Channel::from)
            .ok_or(ApiError::NotFound("Channel"))
    }
}

// -- Handlers --

pub async fn list_channels(State(state): State<AppState>) -> ApiResult<Json<Vec<Channel>>> {
    let all = run_blocking(&state, |db| ChannelRegistry::new(db).list()).await?;
    Ok(Json(all))
}

pub async fn create_channel(
    State(state): State<AppState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateChannelRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let channel = run_blocking(&state, move |db| {
        ChannelRegistry::new(db).create(req.name.as_deref())
    })
    .await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

pub async fn get_channel(
    State(state): State<AppState>,
    Path(channel_id): Path<i64>,
) -> ApiResult<Json<Channel>> {
    let channel = run_blocking(&state, move |db| ChannelRegistry::new(db).get(channel_id)).await?;
    Ok(Json(channel))
}
