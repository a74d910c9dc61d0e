//! Direct-message storage and the conversation aggregation queries.

use rusqlite::{Connection, OptionalExtension, params};

use crate::models::{MessageRow, now_ts};
use crate::{Database, Result, StoreError};

const MESSAGE_COLUMNS: &str = "m.id, m.sender_id, m.recipient_id, m.content, m.is_read,
    m.created_at, u.username, u.name, u.surname, u.image";

impl Database {
    /// Persist a direct message. Self-chat is rejected and the pair must be
    /// friends; both checks run inside the insert transaction.
    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        recipient_id: &str,
        content: &str,
    ) -> Result<MessageRow> {
        if sender_id == recipient_id {
            return Err(StoreError::Forbidden);
        }

        self.with_tx(|tx| {
            let friends: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM friends WHERE user_id = ?1 AND friend_id = ?2",
                    params![sender_id, recipient_id],
                    |row| row.get(0),
                )
                .optional()?;
            if friends.is_none() {
                return Err(StoreError::NotFriends);
            }

            tx.execute(
                "INSERT INTO messages (id, sender_id, recipient_id, content, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![id, sender_id, recipient_id, content, now_ts()],
            )?;

            message_by_id(tx, id)
        })
    }

    /// For every conversation partner of `user_id`, the single most recent
    /// message, newest conversation first. Participant pairs are normalized
    /// to a canonical (min, max) key so both flow directions group together.
    pub fn latest_conversations(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 JOIN users u ON m.sender_id = u.id
                 JOIN (
                     SELECT MIN(sender_id, recipient_id) AS a,
                            MAX(sender_id, recipient_id) AS b,
                            MAX(created_at) AS latest
                     FROM messages
                     WHERE sender_id = ?1 OR recipient_id = ?1
                     GROUP BY a, b
                 ) latest_per_pair
                   ON MIN(m.sender_id, m.recipient_id) = latest_per_pair.a
                  AND MAX(m.sender_id, m.recipient_id) = latest_per_pair.b
                  AND m.created_at = latest_per_pair.latest
                 ORDER BY m.created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// One page of the conversation between `user_id` and `other_id`,
    /// newest first. The REST layer reverses the initial page so it renders
    /// oldest-to-newest.
    pub fn conversation_page(
        &self,
        user_id: &str,
        other_id: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {MESSAGE_COLUMNS} FROM messages m
                 JOIN users u ON m.sender_id = u.id
                 WHERE (m.sender_id = ?1 AND m.recipient_id = ?2)
                    OR (m.sender_id = ?2 AND m.recipient_id = ?1)
                 ORDER BY m.created_at DESC
                 LIMIT ?3 OFFSET ?4"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![user_id, other_id, limit, offset], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Bulk-flip every unread message from `other_id` to `user_id`, then
    /// report whether any *other* conversation still holds unread messages.
    /// Both steps share one transaction so no partial flip is observable.
    pub fn mark_conversation_read(&self, user_id: &str, other_id: &str) -> Result<bool> {
        self.with_tx(|tx| {
            tx.execute(
                "UPDATE messages SET is_read = 1
                 WHERE sender_id = ?1 AND recipient_id = ?2 AND is_read = 0",
                params![other_id, user_id],
            )?;

            let remaining: i64 = tx.query_row(
                "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND is_read = 0",
                [user_id],
                |row| row.get(0),
            )?;
            Ok(remaining > 0)
        })
    }

    /// Global unread indicator.
    pub fn has_unread_messages(&self, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let row: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM messages WHERE recipient_id = ?1 AND is_read = 0 LIMIT 1",
                    [user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(row.is_some())
        })
    }
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        recipient_id: row.get(2)?,
        content: row.get(3)?,
        is_read: row.get(4)?,
        created_at: row.get(5)?,
        sender_username: row.get(6)?,
        sender_name: row.get(7)?,
        sender_surname: row.get(8)?,
        sender_image: row.get(9)?,
    })
}

fn message_by_id(conn: &Connection, id: &str) -> Result<MessageRow> {
    let sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM messages m
         JOIN users u ON m.sender_id = u.id
         WHERE m.id = ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([id], message_from_row)
        .optional()?
        .ok_or(StoreError::NotFound)
}
