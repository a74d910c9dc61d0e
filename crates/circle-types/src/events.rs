use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{MessagePayload, NotificationPayload};

/// Events sent from the server over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid, username: String },

    /// A durable notification was created for this user
    Notification(NotificationPayload),

    /// A direct message, delivered to both participants' live connections
    ReceiveMessage(MessagePayload),

    /// Echoed to the sender when the first message of a conversation went
    /// through, so the client can navigate to the new conversation
    FirstMessageSent { chat_with: String },

    /// The sent message was rejected
    MessageError { error: String },

    /// Lightweight unread badge signal, distinct from the full message
    /// payload so clients can show an indicator without re-fetching
    NewUnreadMessage,
}

/// Commands sent from the client to the server over the WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Send a direct message to a friend, addressed by username
    SendMessage {
        to: String,
        content: String,
        #[serde(default)]
        first_message: bool,
    },
}
