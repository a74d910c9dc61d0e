//! Presence tracking: which users currently hold live gateway connections.
//!
//! Process-local and ephemeral by design; nothing here survives a restart.
//! A user may hold several simultaneous connections (tabs, devices), so the
//! registry keeps a map of conn_id -> sender per user rather than a single
//! most-recent handle.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use circle_types::events::ServerEvent;

#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// user_id -> (conn_id -> live send handle)
    connections: RwLock<HashMap<Uuid, HashMap<Uuid, mpsc::UnboundedSender<ServerEvent>>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                connections: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Register a new live connection for `user_id`. Returns the connection
    /// id, a sender for events targeted at this connection only, and the
    /// receiver the connection loop drains into the socket.
    pub async fn register(
        &self,
        user_id: Uuid,
    ) -> (Uuid, mpsc::UnboundedSender<ServerEvent>, mpsc::UnboundedReceiver<ServerEvent>) {
        let conn_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .connections
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(conn_id, tx.clone());
        (conn_id, tx, rx)
    }

    /// Remove one connection. Other connections of the same user stay live;
    /// the user's entry disappears with their last connection.
    pub async fn unregister(&self, user_id: Uuid, conn_id: Uuid) {
        let mut connections = self.inner.connections.write().await;
        if let Some(handles) = connections.get_mut(&user_id) {
            handles.remove(&conn_id);
            if handles.is_empty() {
                connections.remove(&user_id);
            }
        }
    }

    /// Snapshot of the live send handles for `user_id`. Empty when offline.
    pub async fn senders(&self, user_id: Uuid) -> Vec<mpsc::UnboundedSender<ServerEvent>> {
        self.inner
            .connections
            .read()
            .await
            .get(&user_id)
            .map(|handles| handles.values().cloned().collect())
            .unwrap_or_default()
    }

    pub async fn is_online(&self, user_id: Uuid) -> bool {
        self.inner.connections.read().await.contains_key(&user_id)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
