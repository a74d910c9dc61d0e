use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use circle_api::middleware::require_auth;
use circle_api::{AppState, AppStateInner, auth, friends, messages, notifications, posts};
use circle_gateway::connection;
use circle_gateway::emitter::EventEmitter;
use circle_gateway::registry::ConnectionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "circle=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("CIRCLE_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("CIRCLE_DB_PATH").unwrap_or_else(|_| "circle.db".into());
    let host = std::env::var("CIRCLE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("CIRCLE_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;

    // Init database
    let db = Arc::new(circle_db::Database::open(&PathBuf::from(&db_path))?);

    // Shared state
    let registry = ConnectionRegistry::new();
    let emitter = EventEmitter::new(registry);
    let app_state: AppState = Arc::new(AppStateInner {
        db: db.clone(),
        jwt_secret: jwt_secret.clone(),
        emitter: emitter.clone(),
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/profile", put(auth::update_profile))
        .route("/posts", post(posts::create_post))
        .route("/posts/{post_id}/reshare", post(posts::reshare_post))
        .route("/posts/{post_id}", delete(posts::delete_post))
        .route("/posts/{post_id}/comments", get(posts::get_comments))
        .route("/posts/{post_id}/comments", post(posts::create_comment))
        .route("/comments/{comment_id}", delete(posts::delete_comment))
        .route("/posts/{post_id}/like", post(posts::like_post))
        .route("/comments/{comment_id}/like", post(posts::like_comment))
        .route("/friends", get(friends::list_friends))
        .route("/friends/{username}", delete(friends::remove_friend))
        .route("/friends/requests", get(friends::list_received_requests))
        .route("/friends/requests/{username}", post(friends::send_request))
        .route("/friends/requests/{username}/accept", post(friends::accept_request))
        .route("/friends/requests/{username}/decline", post(friends::decline_request))
        .route("/messages", get(messages::latest_conversations))
        .route("/messages/{username}", get(messages::conversation))
        .route("/messages/{username}/more", get(messages::conversation_more))
        .route("/messages/{username}/read", post(messages::mark_conversation_read))
        .route("/notifications", get(notifications::all_notifications))
        .route("/notifications/unread", get(notifications::unread_notifications))
        .route("/notifications/unread/all", get(notifications::all_unread_notifications))
        .route("/notifications/next-unread", post(notifications::next_unread))
        .route("/notifications/{notification_id}/read", post(notifications::mark_read))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .layer(middleware::from_fn(require_auth))
        .with_state(app_state.clone());

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Circle server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_connection(
            socket,
            state.db.clone(),
            state.emitter.clone(),
            state.jwt_secret.clone(),
        )
    })
}
