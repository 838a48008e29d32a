use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

use parley_api::auth::AppStateInner;
use parley_db::Database;

struct TestApp {
    _dir: TempDir,
    router: Router,
}

fn app() -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("http.db")).unwrap();
    let state = Arc::new(AppStateInner {
        db,
        secure_cookies: false,
    });
    TestApp {
        _dir: dir,
        router: parley_api::router(state),
    }
}

enum Auth<'a> {
    None,
    Bearer(&'a str),
    Cookie(&'a str),
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    auth: Auth<'_>,
    body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    builder = match auth {
        Auth::None => builder,
        Auth::Bearer(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        Auth::Cookie(cookie) => builder.header(header::COOKIE, cookie),
    };
    let request = match body {
        Some(v) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&v).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, headers, value)
}

async fn signup(app: &TestApp, username: &str, password: &str) -> String {
    let (status, _, body) = send(
        app,
        Method::POST,
        "/api/auth/signup",
        Auth::None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"].as_str().unwrap().to_string()
}

/// `name=value` of the first Set-Cookie header.
fn cookie_pair(headers: &HeaderMap) -> String {
    let raw = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    raw.split(';').next().unwrap().to_string()
}

#[tokio::test]
async fn end_to_end_thread_flow() {
    let app = app();

    let (status, headers, _) = send(
        &app,
        Method::POST,
        "/api/auth/signup",
        Auth::None,
        Some(json!({ "username": "alice", "password": "pw1" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let signup_cookie = cookie_pair(&headers);
    assert!(signup_cookie.starts_with("session_token="));

    let (status, headers, body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        Auth::None,
        Some(json!({ "username": "alice", "password": "pw1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cookie = cookie_pair(&headers);
    assert_ne!(cookie, signup_cookie);
    assert_eq!(body["username"], "alice");

    // the signup token was revoked by the login
    let (status, _, _) = send(
        &app,
        Method::GET,
        "/api/auth/profile",
        Auth::Cookie(&signup_cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, channel) = send(
        &app,
        Method::POST,
        "/api/channels",
        Auth::Cookie(&cookie),
        Some(json!({ "name": "general" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let channel_id = channel["id"].as_i64().unwrap();

    let (status, _, message) = send(
        &app,
        Method::POST,
        &format!("/api/channels/{channel_id}/messages"),
        Auth::Cookie(&cookie),
        Some(json!({ "content": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["reply_count"], 0);
    assert_eq!(message["username"], "alice");
    let message_id = message["id"].as_i64().unwrap();

    let (status, _, reply) = send(
        &app,
        Method::POST,
        &format!("/api/messages/{message_id}/replies"),
        Auth::Cookie(&cookie),
        Some(json!({ "content": "hello back" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(reply["replies_to"], message_id);

    let (status, _, listed) = send(
        &app,
        Method::GET,
        &format!("/api/channels/{channel_id}/messages"),
        Auth::Cookie(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], message_id);
    assert_eq!(listed[0]["reply_count"], 1);

    let (status, _, replies) = send(
        &app,
        Method::GET,
        &format!("/api/messages/{message_id}/replies"),
        Auth::Cookie(&cookie),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let replies = replies.as_array().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["content"], "hello back");
}

#[tokio::test]
async fn login_failures_share_one_shape() {
    let app = app();
    signup(&app, "alice", "pw1").await;

    let (wrong_status, _, wrong_body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        Auth::None,
        Some(json!({ "username": "alice", "password": "nope" })),
    )
    .await;
    let (unknown_status, _, unknown_body) = send(
        &app,
        Method::POST,
        "/api/auth/login",
        Auth::None,
        Some(json!({ "username": "nobody", "password": "pw1" })),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, unknown_status);
    assert_eq!(wrong_body, unknown_body);
}

#[tokio::test]
async fn signup_validation_and_duplicates() {
    let app = app();

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/auth/signup",
        Auth::None,
        Some(json!({ "username": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    signup(&app, "alice", "pw1").await;
    let (status, _, body) = send(
        &app,
        Method::POST,
        "/api/auth/signup",
        Auth::None,
        Some(json!({ "username": "alice", "password": "different" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Username already exists");

    // malformed JSON is a client error, not a crash
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_routes_need_a_live_session() {
    let app = app();

    let (status, _, body) = send(&app, Method::GET, "/api/channels", Auth::None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "No session token provided");

    let (status, _, body) = send(
        &app,
        Method::GET,
        "/api/channels",
        Auth::Bearer("bogus"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid session token");

    let token = signup(&app, "alice", "pw1").await;
    let (status, _, profile) = send(
        &app,
        Method::GET,
        "/api/auth/profile",
        Auth::Bearer(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["username"], "alice");
    assert!(profile.get("password_hash").is_none());
    assert!(profile.get("session_token").is_none());

    let (status, headers, _) = send(
        &app,
        Method::POST,
        "/api/auth/logout",
        Auth::Bearer(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let cleared = headers.get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(cleared.starts_with("session_token="));

    let (status, _, _) = send(
        &app,
        Method::GET,
        "/api/auth/profile",
        Auth::Bearer(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_updates() {
    let app = app();
    let token = signup(&app, "alice", "pw1").await;
    signup(&app, "bob", "pw2").await;

    let (status, _, body) = send(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Auth::Bearer(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No changes provided");

    let (status, _, _) = send(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Auth::Bearer(&token),
        Some(json!({ "username": "bob" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        Method::PUT,
        "/api/auth/profile",
        Auth::Bearer(&token),
        Some(json!({ "username": "alicia" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn channel_and_thread_errors() {
    let app = app();
    let token = signup(&app, "alice", "pw1").await;

    let (status, _, _) = send(
        &app,
        Method::GET,
        "/api/channels/77",
        Auth::Bearer(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, channel) = send(
        &app,
        Method::POST,
        "/api/channels",
        Auth::Bearer(&token),
        Some(json!({ "name": "general" })),
    )
    .await;
    let channel_id = channel["id"].as_i64().unwrap();
    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/channels",
        Auth::Bearer(&token),
        Some(json!({ "name": "general" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let messages_uri = format!("/api/channels/{channel_id}/messages");
    let (status, _, _) = send(
        &app,
        Method::POST,
        &messages_uri,
        Auth::Bearer(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        Method::POST,
        &messages_uri,
        Auth::Bearer(&token),
        Some(json!({ "content": "orphan", "replies_to": 4242 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/messages/4242/replies",
        Auth::Bearer(&token),
        Some(json!({ "content": "anyone?" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, _, root) = send(
        &app,
        Method::POST,
        &messages_uri,
        Auth::Bearer(&token),
        Some(json!({ "content": "root" })),
    )
    .await;
    let root_id = root["id"].as_i64().unwrap();
    let (_, _, reply) = send(
        &app,
        Method::POST,
        &format!("/api/messages/{root_id}/replies"),
        Auth::Bearer(&token),
        Some(json!({ "content": "reply" })),
    )
    .await;
    let reply_id = reply["id"].as_i64().unwrap();

    let (status, _, body) = send(
        &app,
        Method::POST,
        &format!("/api/messages/{reply_id}/replies"),
        Auth::Bearer(&token),
        Some(json!({ "content": "too deep" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid reply reference");
}

#[tokio::test]
async fn reactions_over_http() {
    let app = app();
    let token = signup(&app, "alice", "pw1").await;
    let (_, _, channel) = send(
        &app,
        Method::POST,
        "/api/channels",
        Auth::Bearer(&token),
        Some(json!({ "name": "general" })),
    )
    .await;
    let (_, _, message) = send(
        &app,
        Method::POST,
        &format!("/api/channels/{}/messages", channel["id"]),
        Auth::Bearer(&token),
        Some(json!({ "content": "react to me" })),
    )
    .await;
    let uri = format!("/api/messages/{}/reactions", message["id"]);

    let (status, _, body) = send(
        &app,
        Method::POST,
        &uri,
        Auth::Bearer(&token),
        Some(json!({ "emoji": "👍" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["reactions"], json!([{ "emoji": "👍", "count": 1 }]));

    let (status, _, body) = send(
        &app,
        Method::POST,
        &uri,
        Auth::Bearer(&token),
        Some(json!({ "emoji": "👍" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Reaction already exists");

    let (status, _, _) = send(
        &app,
        Method::POST,
        &uri,
        Auth::Bearer(&token),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = send(
        &app,
        Method::POST,
        "/api/messages/999/reactions",
        Auth::Bearer(&token),
        Some(json!({ "emoji": "👍" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, body) = send(
        &app,
        Method::DELETE,
        &uri,
        Auth::Bearer(&token),
        Some(json!({ "emoji": "👍" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reactions"], json!([]));

    let (status, _, _) = send(
        &app,
        Method::DELETE,
        &uri,
        Auth::Bearer(&token),
        Some(json!({ "emoji": "👍" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unread_counts_follow_the_read_cursor() {
    let app = app();
    let alice = signup(&app, "alice", "pw1").await;
    let bob = signup(&app, "bob", "pw2").await;

    let (_, _, channel) = send(
        &app,
        Method::POST,
        "/api/channels",
        Auth::Bearer(&alice),
        Some(json!({ "name": "general" })),
    )
    .await;
    let channel_id = channel["id"].as_i64().unwrap();
    let read_uri = format!("/api/channels/{channel_id}/read");
    let messages_uri = format!("/api/channels/{channel_id}/messages");

    let (status, _, body) = send(&app, Method::POST, &read_uri, Auth::Bearer(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "No messages in channel");

    for text in ["one", "two"] {
        send(
            &app,
            Method::POST,
            &messages_uri,
            Auth::Bearer(&bob),
            Some(json!({ "content": text })),
        )
        .await;
    }

    let unread = |body: &Value| body[0]["unread_count"].as_i64().unwrap();

    let (status, _, body) = send(
        &app,
        Method::GET,
        "/api/channels/unread",
        Auth::Bearer(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["channel_name"], "general");
    assert_eq!(unread(&body), 2);

    let (_, _, marked) = send(&app, Method::POST, &read_uri, Auth::Bearer(&alice), None).await;
    assert_eq!(marked["message"], "Channel marked as read");
    let last_read = marked["last_read_message_id"].as_i64().unwrap();

    let (_, _, body) = send(
        &app,
        Method::GET,
        "/api/channels/unread",
        Auth::Bearer(&alice),
        None,
    )
    .await;
    assert_eq!(unread(&body), 0);

    let (_, _, newer) = send(
        &app,
        Method::POST,
        &messages_uri,
        Auth::Bearer(&bob),
        Some(json!({ "content": "three" })),
    )
    .await;
    assert!(newer["id"].as_i64().unwrap() > last_read);

    let (_, _, body) = send(
        &app,
        Method::GET,
        "/api/channels/unread",
        Auth::Bearer(&alice),
        None,
    )
    .await;
    assert_eq!(unread(&body), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_posts_get_distinct_consecutive_ids() {
    const POSTERS: usize = 16;

    let app = Arc::new(app());
    let token = signup(&app, "alice", "pw1").await;
    let (_, _, channel) = send(
        &app,
        Method::POST,
        "/api/channels",
        Auth::Bearer(&token),
        Some(json!({ "name": "busy" })),
    )
    .await;
    let uri = format!("/api/channels/{}/messages", channel["id"]);

    let handles: Vec<_> = (0..POSTERS)
        .map(|i| {
            let app = app.clone();
            let token = token.clone();
            let uri = uri.clone();
            tokio::spawn(async move {
                let (status, _, body) = send(
                    &app,
                    Method::POST,
                    &uri,
                    Auth::Bearer(&token),
                    Some(json!({ "content": format!("post {i}") })),
                )
                .await;
                assert_eq!(status, StatusCode::CREATED);
                body["id"].as_i64().unwrap()
            })
        })
        .collect();

    let mut ids = Vec::with_capacity(POSTERS);
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();

    assert!(ids.windows(2).all(|w| w[1] == w[0] + 1), "ids skipped or repeated: {ids:?}");

    let (_, _, listed) = send(&app, Method::GET, &uri, Auth::Bearer(&token), None).await;
    let listed: Vec<i64> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["id"].as_i64().unwrap())
        .collect();
    assert_eq!(listed.len(), POSTERS);
    let mut expected = ids.clone();
    expected.reverse();
    assert_eq!(listed, expected);
}

#[tokio::test]
async fn health_is_public() {
    let app = app();

    let (status, _, body) = send(&app, Method::GET, "/api/health", Auth::None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "ok");

    let (status, _, _) = send(&app, Method::GET, "/api/nope", Auth::None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
