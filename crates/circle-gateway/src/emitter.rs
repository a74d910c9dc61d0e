//! Fan-out of server events to live connections.
//!
//! Emission is strictly best-effort: an offline recipient or a dead handle
//! never fails the HTTP request or database write that triggered the event.

use tracing::debug;
use uuid::Uuid;

use circle_types::api::{MessagePayload, NotificationPayload};
use circle_types::events::ServerEvent;

use crate::registry::ConnectionRegistry;

#[derive(Clone)]
pub struct EventEmitter {
    registry: ConnectionRegistry,
}

impl EventEmitter {
    pub fn new(registry: ConnectionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Push a notification to every live connection of `recipient_id`.
    /// No-op when the recipient is offline; they see it on next bell fetch.
    pub async fn notify(&self, recipient_id: Uuid, payload: NotificationPayload) {
        self.send_to(recipient_id, ServerEvent::Notification(payload))
            .await;
    }

    /// Deliver a freshly stored message. Both sides receive the message
    /// itself (the sender's other tabs need it too); only the recipient
    /// gets the unread-badge nudge.
    pub async fn message(&self, sender_id: Uuid, recipient_id: Uuid, payload: MessagePayload) {
        self.send_to(recipient_id, ServerEvent::ReceiveMessage(payload.clone()))
            .await;
        self.send_to(recipient_id, ServerEvent::NewUnreadMessage).await;
        if sender_id != recipient_id {
            self.send_to(sender_id, ServerEvent::ReceiveMessage(payload))
                .await;
        }
    }

    async fn send_to(&self, user_id: Uuid, event: ServerEvent) {
        let senders = self.registry.senders(user_id).await;
        if senders.is_empty() {
            debug!(%user_id, "no live connections, event dropped");
            return;
        }
        for sender in senders {
            // A send can race connection teardown; the unregister that
            // follows cleans the stale handle up.
            if sender.send(event.clone()).is_err() {
                debug!(%user_id, "send to closed connection dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use circle_types::api::SenderInfo;

    fn payload(sender_id: Uuid) -> NotificationPayload {
        NotificationPayload {
            id: Uuid::new_v4(),
            kind: circle_types::models::NotificationKind::FriendRequest,
            sender: SenderInfo {
                id: sender_id,
                username: "ana".into(),
                name: None,
                surname: None,
                image: None,
            },
            is_read: false,
            created_at: chrono::Utc::now(),
        }
    }

    fn message_payload(sender_id: Uuid, recipient_id: Uuid) -> MessagePayload {
        MessagePayload {
            id: Uuid::new_v4(),
            sender: SenderInfo {
                id: sender_id,
                username: "ana".into(),
                name: None,
                surname: None,
                image: None,
            },
            recipient_id,
            content: "hey".into(),
            is_read: false,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn notify_reaches_every_connection() {
        let registry = ConnectionRegistry::new();
        let emitter = EventEmitter::new(registry.clone());
        let user = Uuid::new_v4();

        let (_c1, _tx1, mut rx1) = registry.register(user).await;
        let (_c2, _tx2, mut rx2) = registry.register(user).await;

        emitter.notify(user, payload(Uuid::new_v4())).await;

        assert!(matches!(rx1.recv().await, Some(ServerEvent::Notification(_))));
        assert!(matches!(rx2.recv().await, Some(ServerEvent::Notification(_))));
    }

    #[tokio::test]
    async fn notify_offline_recipient_is_a_no_op() {
        let registry = ConnectionRegistry::new();
        let emitter = EventEmitter::new(registry);
        emitter.notify(Uuid::new_v4(), payload(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn message_fans_out_to_both_sides() {
        let registry = ConnectionRegistry::new();
        let emitter = EventEmitter::new(registry.clone());
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();

        let (_cs, _txs, mut sender_rx) = registry.register(sender).await;
        let (_cr, _txr, mut recipient_rx) = registry.register(recipient).await;

        emitter
            .message(sender, recipient, message_payload(sender, recipient))
            .await;

        assert!(matches!(
            recipient_rx.recv().await,
            Some(ServerEvent::ReceiveMessage(_))
        ));
        assert!(matches!(
            recipient_rx.recv().await,
            Some(ServerEvent::NewUnreadMessage)
        ));
        // The sender's tabs get the message but never the unread nudge.
        assert!(matches!(
            sender_rx.recv().await,
            Some(ServerEvent::ReceiveMessage(_))
        ));
        assert!(sender_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_handle_does_not_block_others() {
        let registry = ConnectionRegistry::new();
        let emitter = EventEmitter::new(registry.clone());
        let user = Uuid::new_v4();

        let (_c1, _tx1, rx1) = registry.register(user).await;
        drop(rx1);
        let (_c2, _tx2, mut rx2) = registry.register(user).await;

        emitter.notify(user, payload(Uuid::new_v4())).await;
        assert!(matches!(rx2.recv().await, Some(ServerEvent::Notification(_))));
    }
}
