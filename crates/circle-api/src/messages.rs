use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use circle_db::StoreError;
use circle_types::api::{Claims, ConversationResponse, MarkConversationReadResponse, MessagePayload};

use crate::{AppState, join_status, store_status};

/// Messages per conversation page. One extra row is fetched to learn
/// whether an older page exists.
const PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct MoreQuery {
    #[serde(default = "first_page")]
    pub page: u32,
}

fn first_page() -> u32 {
    1
}

/// One row per conversation partner: the newest message exchanged with
/// each, newest conversation first.
pub async fn latest_conversations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.latest_conversations(&user_id))
        .await
        .map_err(join_status)?
        .map_err(store_status)?;

    let messages = rows
        .into_iter()
        .map(|row| row.into_payload())
        .collect::<anyhow::Result<Vec<MessagePayload>>>()
        .map_err(|e| store_status(StoreError::Other(e)))?;

    Ok(Json(messages))
}

/// Initial page of a conversation, oldest message first so the client can
/// render top-down without reordering.
pub async fn conversation(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    conversation_page(state, claims, username, 0).await
}

/// Older pages, `page=1` being the first page past the initial one.
pub async fn conversation_more(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(query): Query<MoreQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    conversation_page(state, claims, username, query.page.max(1) * PAGE_SIZE).await
}

async fn conversation_page(
    state: AppState,
    claims: Claims,
    username: String,
    offset: u32,
) -> Result<Json<ConversationResponse>, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || {
        let other = db.get_user_by_username(&username)?.ok_or(StoreError::NotFound)?;
        db.conversation_page(&user_id, &other.id, PAGE_SIZE + 1, offset)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    let has_more = rows.len() as u32 > PAGE_SIZE;
    let mut messages = rows
        .into_iter()
        .take(PAGE_SIZE as usize)
        .map(|row| row.into_payload())
        .collect::<anyhow::Result<Vec<MessagePayload>>>()
        .map_err(|e| store_status(StoreError::Other(e)))?;
    // Storage pages newest-first; the wire form is oldest-first.
    messages.reverse();

    Ok(Json(ConversationResponse { messages, has_more }))
}

/// Flip every unread message from `username` to read and report whether
/// any other conversation still holds unread messages.
pub async fn mark_conversation_read(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let other_unread = tokio::task::spawn_blocking(move || {
        let other = db.get_user_by_username(&username)?.ok_or(StoreError::NotFound)?;
        db.mark_conversation_read(&user_id, &other.id)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    Ok(Json(MarkConversationReadResponse {
        success: true,
        other_unread_messages: other_unread,
    }))
}
