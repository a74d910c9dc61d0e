use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::NotificationKind;

// -- JWT Claims --

/// JWT claims shared between the REST middleware and the WebSocket gateway
/// authentication. Canonical definition lives here to avoid duplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub surname: Option<String>,
    pub image: Option<String>,
}

// -- Shared display info --

/// The sender fields clients need to render a notification or message
/// without an extra user lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SenderInfo {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub image: Option<String>,
}

// -- Notifications --

/// Wire form of a notification, used both for the REST feed and the live
/// `notification` gateway event. The kind tag and its refs flatten into the
/// top level, so clients see `{"id":..,"type":"post_like","post_id":..}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: NotificationKind,
    pub sender: SenderInfo,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct NextUnreadRequest {
    /// Notification ids the client has already seen this session.
    #[serde(default)]
    pub exclude: Vec<Uuid>,
}

// -- Posts / comments / likes --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct PostResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub shares: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub likes: u64,
    pub is_liked: bool,
}

// -- Friends --

#[derive(Debug, Serialize)]
pub struct FriendResponse {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub image: Option<String>,
}

// -- Messages --

/// Wire form of a direct message, used for conversation pages and the
/// `receive_message` gateway event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePayload {
    pub id: Uuid,
    pub sender: SenderInfo,
    pub recipient_id: Uuid,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ConversationResponse {
    pub messages: Vec<MessagePayload>,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkConversationReadResponse {
    pub success: bool,
    /// Whether any other conversation still has unread messages, to drive
    /// the global unread indicator.
    pub other_unread_messages: bool,
}
