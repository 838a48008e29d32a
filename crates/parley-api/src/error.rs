use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use parley_types::api::StatusMessage;

pub type ApiResult<T> = Result<T, ApiError>;

/// Every way an operation can fail, in the terms a client acts on.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Missing or empty required field; the client must fix the request.
    #[error("{0}")]
    Validation(String),

    #[error("No session token provided")]
    Unauthenticated,

    #[error("Invalid session token")]
    InvalidSession,

    /// Same message for unknown username and wrong password.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Username already exists")]
    DuplicateUsername,

    #[error("Channel name already exists")]
    DuplicateChannel,

    #[error("Reaction already exists")]
    DuplicateReaction,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Reply target is missing, in another channel, or itself a reply.
    #[error("Invalid reply reference")]
    InvalidParent,

    #[error("store failure: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Conflicts are reported as 400, matching the reference clients.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::DuplicateUsername
            | Self::DuplicateChannel
            | Self::DuplicateReaction
            | Self::InvalidParent => StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::InvalidSession | Self::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateUsername | Self::DuplicateChannel | Self::DuplicateReaction
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Store(e) => {
                error!("Store error: {}", e);
                "Internal server error".to_string()
            }
            Self::Internal(msg) => {
                error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(StatusMessage::new(message))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::Internal(format!("spawn_blocking join error: {}", e))
    }
}

/// Reject `value` when absent or blank; otherwise return it unchanged.
pub fn required(value: Option<&str>, field: &str) -> ApiResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(ApiError::validation(format!("{} required", field))),
    }
}
