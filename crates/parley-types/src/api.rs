use serde::{Deserialize, Serialize};

use crate::models::ReactionCount;

// Request bodies keep every field optional so a missing field surfaces as a
// validation error with a useful message rather than a generic decode failure.

// -- Auth --

#[derive(Debug, Default, Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub message: String,
    pub user_id: i64,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub username: Option<String>,
}

// -- Channels --

#[derive(Debug, Default, Deserialize)]
pub struct CreateChannelRequest {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_read_message_id: Option<i64>,
}

// -- Messages --

#[derive(Debug, Default, Deserialize)]
pub struct PostMessageRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub replies_to: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostReplyRequest {
    #[serde(default)]
    pub content: Option<String>,
}

// -- Reactions --

#[derive(Debug, Default, Deserialize)]
pub struct ReactionRequest {
    #[serde(default)]
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub message: String,
    pub reactions: Vec<ReactionCount>,
}

// -- Generic --

/// Plain `{"message": ...}` body used for acknowledgements and errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusMessage {
    pub message: String,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
