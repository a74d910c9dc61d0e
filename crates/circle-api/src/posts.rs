use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use circle_db::models::{CommentRow, PostRow};
use circle_types::api::{
    Claims, CommentResponse, CreateCommentRequest, CreatePostRequest, LikeResponse, PostResponse,
};
use circle_types::models::LikeTarget;

use crate::{AppState, emit_notification, join_status, store_status};

#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let post_id = Uuid::new_v4();
    let db = state.db.clone();
    let author_id = claims.sub.to_string();
    let row = tokio::task::spawn_blocking(move || {
        db.create_post(&post_id.to_string(), &author_id, &req.content)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    Ok((StatusCode::CREATED, Json(post_response(row)?)))
}

pub async fn reshare_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let reshare_id = Uuid::new_v4();
    let db = state.db.clone();
    let author_id = claims.sub.to_string();
    let (row, notification) = tokio::task::spawn_blocking(move || {
        db.reshare_post(
            &reshare_id.to_string(),
            &author_id,
            &post_id.to_string(),
            &req.content,
        )
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    if let Some(notification) = notification {
        emit_notification(&state, notification).await;
    }

    Ok((StatusCode::CREATED, Json(post_response(row)?)))
}

pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let actor_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || db.delete_post(&post_id.to_string(), &actor_id))
        .await
        .map_err(join_status)?
        .map_err(store_status)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    if req.content.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let comment_id = Uuid::new_v4();
    let db = state.db.clone();
    let author_id = claims.sub.to_string();
    let (row, notification) = tokio::task::spawn_blocking(move || {
        db.create_comment(
            &comment_id.to_string(),
            &author_id,
            &post_id.to_string(),
            &req.content,
        )
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    if let Some(notification) = notification {
        emit_notification(&state, notification).await;
    }

    Ok((StatusCode::CREATED, Json(comment_response(row)?)))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let actor_id = claims.sub.to_string();
    tokio::task::spawn_blocking(move || db.delete_comment(&comment_id.to_string(), &actor_id))
        .await
        .map_err(join_status)?
        .map_err(store_status)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_comments(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Query(query): Query<CommentsQuery>,
    Extension(_claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    let db = state.db.clone();
    let limit = query.limit.min(200);
    let offset = query.offset;
    let rows = tokio::task::spawn_blocking(move || {
        db.comments_page(&post_id.to_string(), limit, offset)
    })
    .await
    .map_err(join_status)?
    .map_err(store_status)?;

    let comments = rows
        .into_iter()
        .map(comment_response)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(comments))
}

pub async fn like_post(
    State(state): State<AppState>,
    Path(post_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    toggle_like(state, claims, LikeTarget::Post { post_id }).await
}

pub async fn like_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, StatusCode> {
    toggle_like(state, claims, LikeTarget::Comment { comment_id }).await
}

async fn toggle_like(
    state: AppState,
    claims: Claims,
    target: LikeTarget,
) -> Result<Json<LikeResponse>, StatusCode> {
    let like_id = Uuid::new_v4();
    let db = state.db.clone();
    let actor_id = claims.sub.to_string();
    let outcome =
        tokio::task::spawn_blocking(move || db.toggle_like(&like_id.to_string(), &actor_id, target))
            .await
            .map_err(join_status)?
            .map_err(store_status)?;

    if let Some(notification) = outcome.notification {
        emit_notification(&state, notification).await;
    }

    Ok(Json(LikeResponse {
        likes: outcome.like_count,
        is_liked: outcome.is_liked,
    }))
}

fn post_response(row: PostRow) -> Result<PostResponse, StatusCode> {
    Ok(PostResponse {
        id: parse(&row.id)?,
        user_id: parse(&row.user_id)?,
        parent_id: row.parent_id.as_deref().map(parse).transpose()?,
        content: row.content,
        shares: row.shares.max(0) as u64,
        created_at: parse_ts(&row.created_at)?,
    })
}

fn comment_response(row: CommentRow) -> Result<CommentResponse, StatusCode> {
    Ok(CommentResponse {
        id: parse(&row.id)?,
        user_id: parse(&row.user_id)?,
        post_id: parse(&row.post_id)?,
        content: row.content,
        created_at: parse_ts(&row.created_at)?,
    })
}

pub(crate) fn parse(s: &str) -> Result<Uuid, StatusCode> {
    s.parse().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

pub(crate) fn parse_ts(s: &str) -> Result<chrono::DateTime<chrono::Utc>, StatusCode> {
    s.parse().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
