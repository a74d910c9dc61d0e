use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Serialize;

use circle_db::friends::FriendRequestOutcome;
use circle_db::models::UserRow;
use circle_types::api::{Claims, FriendResponse};

use crate::posts::parse;
use crate::{AppState, emit_notification, join_status, store_status};

#[derive(Debug, Serialize)]
pub struct FriendRequestResponse {
    pub status: &'static str,
}

pub async fn send_request(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let actor_id = claims.sub.to_string();
    let (outcome, status) = tokio::task::spawn_blocking(move || {
        let target = db.get_user_by_username(&username)?.ok_or(circle_db::StoreError::NotFound)?;
        db.send_friend_request(&actor_id, &target.id)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)
    .map(|outcome| match outcome {
        FriendRequestOutcome::Requested(n) => (Some(n), "requested"),
        FriendRequestOutcome::Accepted(n) => (Some(n), "accepted"),
        FriendRequestOutcome::AlreadyFriends => (None, "already_friends"),
        FriendRequestOutcome::AlreadyRequested => (None, "already_requested"),
    })?;

    if let Some(notification) = outcome {
        emit_notification(&state, notification).await;
    }

    Ok((StatusCode::CREATED, Json(FriendRequestResponse { status })))
}

pub async fn accept_request(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let actor_id = claims.sub.to_string();
    let notification = tokio::task::spawn_blocking(move || {
        let requester = db.get_user_by_username(&username)?.ok_or(circle_db::StoreError::NotFound)?;
        db.accept_friend_request(&actor_id, &requester.id)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    emit_notification(&state, notification).await;

    Ok(Json(FriendRequestResponse { status: "accepted" }))
}

pub async fn decline_request(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let actor_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || {
        let requester = db.get_user_by_username(&username)?.ok_or(circle_db::StoreError::NotFound)?;
        db.decline_friend_request(&actor_id, &requester.id)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    Ok(Json(FriendRequestResponse { status: "declined" }))
}

pub async fn remove_friend(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let actor_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || {
        let other = db.get_user_by_username(&username)?.ok_or(circle_db::StoreError::NotFound)?;
        db.remove_friend(&actor_id, &other.id)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.friends_of(&user_id))
        .await
        .map_err(join_status)?
        .map_err(store_status)?;

    Ok(Json(friend_list(rows)?))
}

pub async fn list_received_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let user_id = claims.sub.to_string();
    let rows = tokio::task::spawn_blocking(move || db.received_requests(&user_id))
        .await
        .map_err(join_status)?
        .map_err(store_status)?;

    Ok(Json(friend_list(rows)?))
}

fn friend_list(rows: Vec<UserRow>) -> Result<Vec<FriendResponse>, StatusCode> {
    rows.into_iter()
        .map(|row| {
            Ok(FriendResponse {
                id: parse(&row.id)?,
                username: row.username,
                name: row.name,
                surname: row.surname,
                image: row.image,
            })
        })
        .collect()
}
