use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;
use uuid::Uuid;

use circle_db::StoreError;
use circle_db::models::NotificationRow;
use circle_types::api::{Claims, NextUnreadRequest, NotificationPayload};

use crate::{AppState, join_status, store_status};

/// How many notifications the bell dropdown shows.
const BELL_LIMIT: u32 = 5;

#[derive(Debug, Serialize)]
pub struct ReadAllResponse {
    pub marked: usize,
}

/// Full history, read and unread, newest first.
pub async fn all_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.all_notifications(&user_id))
        .await
        .map_err(join_status)?
        .map_err(store_status)?;

    Ok(Json(payloads(rows)?))
}

/// The bell dropdown view: newest unread, capped.
pub async fn unread_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let rows =
        tokio::task::spawn_blocking(move || db.unread_notifications(&user_id, Some(BELL_LIMIT)))
            .await
            .map_err(join_status)?
            .map_err(store_status)?;

    Ok(Json(payloads(rows)?))
}

/// Every unread notification, for the dedicated notifications view.
pub async fn all_unread_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.unread_notifications(&user_id, None))
        .await
        .map_err(join_status)?
        .map_err(store_status)?;

    Ok(Json(payloads(rows)?))
}

/// Newest unread notification the client has not seen yet this session.
/// 204 when everything unread was already shown.
pub async fn next_unread(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NextUnreadRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || {
        db.next_unread_notification(&user_id, &req.exclude)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    match row {
        Some(row) => {
            let payload = row
                .into_payload()
                .map_err(|e| store_status(StoreError::Other(e)))?;
            Ok(Json(payload).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Mark one notification read. 404 when it does not exist or belongs to
/// someone else.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let flipped = tokio::task::spawn_blocking(move || {
        db.mark_notification_read(&notification_id.to_string(), &user_id)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    if flipped {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let marked = tokio::task::spawn_blocking(move || db.mark_all_notifications_read(&user_id))
        .await
        .map_err(join_status)?
        .map_err(store_status)?;

    Ok(Json(ReadAllResponse { marked }))
}

fn payloads(rows: Vec<NotificationRow>) -> Result<Vec<NotificationPayload>, StatusCode> {
    rows.into_iter()
        .map(|row| row.into_payload())
        .collect::<anyhow::Result<Vec<_>>>()
        .map_err(|e| store_status(StoreError::Other(e)))
}
