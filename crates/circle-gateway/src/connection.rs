use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use circle_db::{Database, StoreError};
use circle_types::events::{ClientCommand, ServerEvent};

use crate::emitter::EventEmitter;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long an unauthenticated socket may sit before Identify arrives.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle a single WebSocket connection from Identify handshake to teardown.
pub async fn handle_connection(
    socket: WebSocket,
    db: Arc<Database>,
    emitter: EventEmitter,
    jwt_secret: String,
) {
    let (mut sender, mut receiver) = socket.split();

    // Step 1: Wait for Identify command with JWT
    let (user_id, username) = match wait_for_identify(&mut receiver, &jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            return;
        }
    };

    info!("{} ({}) connected to gateway", username, user_id);

    // Step 2: Send Ready event
    let ready = ServerEvent::Ready {
        user_id,
        username: username.clone(),
    };
    if sender
        .send(Message::Text(serde_json::to_string(&ready).unwrap().into()))
        .await
        .is_err()
    {
        return;
    }

    // Step 3: register this connection so fan-out can reach it. The per
    // connection sender lets the command handler echo results back to
    // exactly the socket that issued the command.
    let registry = emitter.registry().clone();
    let (conn_id, conn_tx, mut user_rx) = registry.register(user_id).await;

    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();
    let pong_flag_recv = pong_received.clone();

    // Forward targeted events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = user_rx.recv() => {
                    let event = match result {
                        Some(event) => event,
                        None => break,
                    };
                    let text = serde_json::to_string(&event).unwrap();
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Read commands from client
    let username_recv = username.clone();
    let emitter_recv = emitter.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(cmd) => {
                        handle_command(&db, &emitter_recv, user_id, &username_recv, cmd, &conn_tx)
                            .await;
                    }
                    Err(e) => {
                        warn!(
                            "{} ({}) bad command: {} -- raw: {}",
                            username_recv,
                            user_id,
                            e,
                            truncate_log(&text, 200)
                        );
                    }
                },
                Message::Pong(_) => {
                    pong_flag_recv.store(true, Ordering::Release);
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Wait for either task to finish
    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    registry.unregister(user_id, conn_id).await;
    info!("{} ({}) disconnected from gateway", username, user_id);
}

async fn wait_for_identify(
    receiver: &mut futures_util::stream::SplitStream<WebSocket>,
    jwt_secret: &str,
) -> Option<(Uuid, String)> {
    use circle_types::api::Claims;
    use jsonwebtoken::{DecodingKey, Validation, decode};

    let timeout = tokio::time::timeout(IDENTIFY_TIMEOUT, async {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                if let Ok(ClientCommand::Identify { token }) =
                    serde_json::from_str::<ClientCommand>(&text)
                {
                    let token_data = decode::<Claims>(
                        &token,
                        &DecodingKey::from_secret(jwt_secret.as_bytes()),
                        &Validation::default(),
                    )
                    .ok()?;

                    return Some((token_data.claims.sub, token_data.claims.username));
                }
            }
        }
        None
    });

    timeout.await.ok().flatten()
}

async fn handle_command(
    db: &Arc<Database>,
    emitter: &EventEmitter,
    user_id: Uuid,
    username: &str,
    cmd: ClientCommand,
    conn_tx: &mpsc::UnboundedSender<ServerEvent>,
) {
    match cmd {
        ClientCommand::Identify { .. } => {} // Already handled

        ClientCommand::SendMessage {
            to,
            content,
            first_message,
        } => {
            if content.trim().is_empty() {
                let _ = conn_tx.send(ServerEvent::MessageError {
                    error: "Message cannot be empty".to_string(),
                });
                return;
            }

            let db = db.clone();
            let recipient_username = to.clone();
            let stored = tokio::task::spawn_blocking(move || {
                let recipient = db
                    .get_user_by_username(&recipient_username)?
                    .ok_or(StoreError::NotFound)?;
                let message_id = Uuid::new_v4().to_string();
                let row = db.insert_message(
                    &message_id,
                    &user_id.to_string(),
                    &recipient.id,
                    &content,
                )?;
                Ok::<_, StoreError>(row)
            })
            .await;

            let row = match stored {
                Ok(Ok(row)) => row,
                Ok(Err(err)) => {
                    info!("{} ({}) message to {} rejected: {}", username, user_id, to, err);
                    let _ = conn_tx.send(ServerEvent::MessageError {
                        error: reject_reason(&err),
                    });
                    return;
                }
                Err(join_err) => {
                    warn!("message storage task failed: {}", join_err);
                    let _ = conn_tx.send(ServerEvent::MessageError {
                        error: "Message could not be delivered".to_string(),
                    });
                    return;
                }
            };

            let recipient_id = match row.recipient_id.parse::<Uuid>() {
                Ok(id) => id,
                Err(e) => {
                    warn!("stored message has bad recipient id: {}", e);
                    return;
                }
            };
            let payload = match row.into_payload() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("stored message could not be serialized: {}", e);
                    return;
                }
            };

            emitter.message(user_id, recipient_id, payload).await;

            if first_message {
                let _ = conn_tx.send(ServerEvent::FirstMessageSent { chat_with: to });
            }
        }
    }
}

/// Cap client text for log output. The cut must land on a char boundary;
/// slicing mid-character panics.
fn truncate_log(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

fn reject_reason(err: &StoreError) -> String {
    match err {
        StoreError::NotFound => "User not found".to_string(),
        StoreError::NotFriends => "You can only message your friends".to_string(),
        StoreError::Forbidden => "You cannot message yourself".to_string(),
        _ => "Message could not be delivered".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_truncation_backs_off_to_a_char_boundary() {
        // Multibyte char straddling the cap must not split.
        let mut raw = "a".repeat(199);
        raw.push('é');
        let cut = truncate_log(&raw, 200);
        assert_eq!(cut.len(), 199);
        assert!(cut.chars().all(|c| c == 'a'));
    }

    #[test]
    fn log_truncation_leaves_short_text_alone() {
        assert_eq!(truncate_log("héllo", 200), "héllo");
        assert_eq!(truncate_log("abcdef", 3), "abc");
    }
}
