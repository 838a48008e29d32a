use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use tracing::debug;

use parley_db::{Database, queries::users};

use crate::auth::AppState;
use crate::error::{ApiError, ApiResult};
use crate::run_blocking;

pub const SESSION_COOKIE: &str = "session_token";

/// The acting principal of a request, inserted as a request extension by
/// [`require_session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
}

/// Resolves bearer tokens to users. Read-only.
pub struct SessionAuthenticator<'a> {
    db: &'a Database,
}

impl<'a> SessionAuthenticator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn authenticate(&self, token: Option<&str>) -> ApiResult<CurrentUser> {
        let token = match token {
            Some(t) if !t.is_empty() => t,
            _ => return Err(ApiError::Unauthenticated),
        };

        self.db
            .read(|tx| users::user_id_by_session_token(tx, token))?
            .map(|id| CurrentUser { id })
            .ok_or(ApiError::InvalidSession)
    }
}

/// Session cookie first, then `Authorization: Bearer <token>`.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(SESSION_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|Authorization(bearer)| bearer.token().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Reject the request unless it carries a live session token.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers());

    let user = run_blocking(&state, move |db| {
        SessionAuthenticator::new(db).authenticate(token.as_deref())
    })
    .await?;

    debug!("Request authenticated as user {}", user.id);
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
