use std::sync::{Arc, OnceLock};

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::{
    WithRejection,
    cookie::{Cookie, CookieJar, SameSite},
};
use rand::{Rng, distr::Alphanumeric};
use rand_core::OsRng;
use tracing::{info, warn};

use parley_db::{Database, is_unique_violation, queries::users};
use parley_types::api::{CredentialsRequest, SessionResponse, StatusMessage, UpdateProfileRequest};
use parley_types::models::User;

use crate::error::{ApiError, ApiResult, required};
use crate::run_blocking;
use crate::session::{CurrentUser, SESSION_COOKIE};

pub const SESSION_TOKEN_LEN: usize = 64;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    /// Mark the session cookie `Secure` (HTTPS deployments).
    pub secure_cookies: bool,
}

/// A freshly issued credential.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

/// 64 alphanumeric characters from the thread-local CSPRNG.
pub fn generate_session_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

/// Argon2id with a per-password random salt.
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::internal(format!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Unparseable password hash in store: {}", e);
            false
        }
    }
}

/// Hash checked against when the username is unknown, so both login
/// failure paths do the same work.
fn dummy_hash() -> &'static str {
    static DUMMY: OnceLock<String> = OnceLock::new();
    DUMMY.get_or_init(|| hash_password("parley-dummy-password").unwrap_or_default())
}

/// Users, password hashes and the single active session token per user.
pub struct CredentialStore<'a> {
    db: &'a Database,
}

impl<'a> CredentialStore<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub fn signup(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> ApiResult<IssuedSession> {
        let (username, password) = match (username, password) {
            (Some(u), Some(p)) if !u.trim().is_empty() && !p.is_empty() => (u, p),
            _ => return Err(ApiError::validation("Username and password required")),
        };

        let password_hash = hash_password(password)?;
        let token = generate_session_token();

        let user_id = self.db.write(|tx| {
            users::insert_user(tx, username, &password_hash, &token).map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::DuplicateUsername
                } else {
                    e.into()
                }
            })
        })?;

        info!("User {} signed up as '{}'", user_id, username);
        Ok(IssuedSession {
            user_id,
            username: username.to_string(),
            token,
        })
    }

    /// Verify credentials and rotate the session token, revoking the old one.
    pub fn login(
        &self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> ApiResult<IssuedSession> {
        let (username, password) = match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => (u, p),
            _ => return Err(ApiError::validation("Username and password required")),
        };

        let user = self.db.read(|tx| users::user_by_username(tx, username))?;

        // Verify outside any transaction.
        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            Some(_) => {
                warn!("Failed login for '{}'", username);
                return Err(ApiError::InvalidCredentials);
            }
            None => {
                let _ = verify_password(password, dummy_hash());
                warn!("Failed login for '{}'", username);
                return Err(ApiError::InvalidCredentials);
            }
        };

        let token = generate_session_token();
        let updated = self
            .db
            .write(|tx| users::set_session_token(tx, user.id, Some(token.as_str())))?;
        if updated == 0 {
            // Account vanished between the read and the write.
            return Err(ApiError::InvalidCredentials);
        }

        info!("User {} logged in", user.id);
        Ok(IssuedSession {
            user_id: user.id,
            username: user.username,
            token,
        })
    }

    pub fn logout(&self, user_id: i64) -> ApiResult<()> {
        self.db.write(|tx| users::set_session_token(tx, user_id, None))?;
        info!("User {} logged out", user_id);
        Ok(())
    }

    pub fn profile(&self, user_id: i64) -> ApiResult<User> {
        self.db
            .read(|tx| users::user_by_id(tx, user_id))?
            .map(User::from)
            .ok_or(ApiError::NotFound("User"))
    }

    /// Rename the user. `None` means the request carried no changes.
    pub fn update_profile(&self, user_id: i64, new_username: Option<&str>) -> ApiResult<User> {
        let Some(new_username) = new_username else {
            return Err(ApiError::validation("No changes provided"));
        };
        let new_username = required(Some(new_username), "Username")?;

        let user = self.db.write(|tx| {
            users::rename_user(tx, user_id, &new_username).map_err(|e| {
                if is_unique_violation(&e) {
                    ApiError::DuplicateUsername
                } else {
                    ApiError::from(e)
                }
            })?;
            users::user_by_id(tx, user_id)?.ok_or(ApiError::NotFound("User"))
        })?;

        info!("User {} renamed to '{}'", user_id, user.username);
        Ok(user.into())
    }
}

fn session_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn session_response(message: &str, session: IssuedSession) -> SessionResponse {
    SessionResponse {
        message: message.to_string(),
        user_id: session.user_id,
        username: session.username,
        token: session.token,
    }
}

// -- Handlers --

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<CredentialsRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let secure = state.secure_cookies;
    let session = run_blocking(&state, move |db| {
        CredentialStore::new(db).signup(req.username.as_deref(), req.password.as_deref())
    })
    .await?;

    let jar = jar.add(session_cookie(session.token.clone(), secure));
    Ok((
        StatusCode::CREATED,
        jar,
        Json(session_response("Signup successful", session)),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    WithRejection(Json(req), _): WithRejection<Json<CredentialsRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    let secure = state.secure_cookies;
    let session = run_blocking(&state, move |db| {
        CredentialStore::new(db).login(req.username.as_deref(), req.password.as_deref())
    })
    .await?;

    let jar = jar.add(session_cookie(session.token.clone(), secure));
    Ok((jar, Json(session_response("Login successful", session))))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> ApiResult<Json<User>> {
    let profile = run_blocking(&state, move |db| CredentialStore::new(db).profile(user.id)).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateProfileRequest>, ApiError>,
) -> ApiResult<Json<StatusMessage>> {
    run_blocking(&state, move |db| {
        CredentialStore::new(db).update_profile(user.id, req.username.as_deref())
    })
    .await?;
    Ok(Json(StatusMessage::new("Profile updated")))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    run_blocking(&state, move |db| CredentialStore::new(db).logout(user.id)).await?;

    // Sent even when the request authenticated by header, so a stale cookie
    // in the client is cleared too.
    let mut removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    removal.make_removal();
    Ok((jar.add(removal), Json(StatusMessage::new("Logout successful"))))
}
