pub mod auth;
pub mod friends;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod posts;

use std::sync::Arc;

use axum::http::StatusCode;
use tracing::{error, warn};

use circle_db::models::NotificationRow;
use circle_db::{Database, StoreError};
use circle_gateway::emitter::EventEmitter;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub emitter: EventEmitter,
}

/// Map storage errors onto HTTP status codes. Missing rows and foreign
/// ownership both come back as 404 so callers cannot probe for existence.
pub(crate) fn store_status(err: StoreError) -> StatusCode {
    match err {
        StoreError::NotFound | StoreError::Forbidden => StatusCode::NOT_FOUND,
        StoreError::NotFriends => StatusCode::UNPROCESSABLE_ENTITY,
        StoreError::Db(e) => {
            error!("database error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
        StoreError::Other(e) => {
            error!("storage error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub(crate) fn join_status(err: tokio::task::JoinError) -> StatusCode {
    error!("spawn_blocking join error: {}", err);
    StatusCode::INTERNAL_SERVER_ERROR
}

/// Push a freshly committed notification to the recipient's live
/// connections. Called only after the surrounding handler got its row back,
/// so the storing transaction is already durable. Failures here are
/// logged and swallowed; the notification is persisted either way.
pub(crate) async fn emit_notification(state: &AppState, row: NotificationRow) {
    let recipient_id = match row.recipient_id.parse::<uuid::Uuid>() {
        Ok(id) => id,
        Err(e) => {
            warn!("notification {} has bad recipient id: {}", row.id, e);
            return;
        }
    };
    match row.into_payload() {
        Ok(payload) => state.emitter.notify(recipient_id, payload).await,
        Err(e) => warn!("notification could not be serialized: {}", e),
    }
}
