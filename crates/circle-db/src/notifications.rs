//! Notification store: durable records, read-state machine, feed queries.
//!
//! Inserts take a plain `&Connection` so they participate in whatever
//! transaction the calling domain operation has open; a notification is
//! never committed independently of the action that caused it. Ids are
//! generated before insert, so emission payloads can be built pre-commit.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use circle_types::models::NotificationKind;

use crate::models::{NotificationRow, now_ts};
use crate::{Database, Result, StoreError};

const NOTIFICATION_COLUMNS: &str = "n.id, n.recipient_id, n.sender_id, n.kind, n.post_id,
    n.comment_id, n.is_read, n.created_at, u.username, u.name, u.surname, u.image";

/// Insert an unread notification inside the caller's transaction and return
/// the joined row for the emission payload.
pub(crate) fn insert_notification(
    conn: &Connection,
    recipient_id: &str,
    sender_id: &str,
    kind: &NotificationKind,
) -> Result<NotificationRow> {
    let id = Uuid::new_v4().to_string();
    let (tag, post_id, comment_id) = kind.storage_parts();
    conn.execute(
        "INSERT INTO notifications (id, recipient_id, sender_id, kind, post_id, comment_id, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
        params![
            id,
            recipient_id,
            sender_id,
            tag,
            post_id.map(|p| p.to_string()),
            comment_id.map(|c| c.to_string()),
            now_ts(),
        ],
    )?;
    fetch_notification(conn, &id)
}

pub(crate) fn fetch_notification(conn: &Connection, id: &str) -> Result<NotificationRow> {
    let sql = format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
         JOIN users u ON n.sender_id = u.id
         WHERE n.id = ?1"
    );
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([id], notification_from_row)
        .optional()?
        .ok_or(StoreError::NotFound)
}

/// Flip the matching unread friend_request notification to read. Used when a
/// request is accepted (explicitly or via mutual-request resolution): the
/// original request notification is superseded.
pub(crate) fn mark_friend_request_read(
    conn: &Connection,
    recipient_id: &str,
    sender_id: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE notifications SET is_read = 1
         WHERE recipient_id = ?1 AND sender_id = ?2
           AND kind = 'friend_request' AND is_read = 0",
        params![recipient_id, sender_id],
    )?;
    Ok(())
}

fn notification_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: row.get(0)?,
        recipient_id: row.get(1)?,
        sender_id: row.get(2)?,
        kind: row.get(3)?,
        post_id: row.get(4)?,
        comment_id: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
        sender_username: row.get(8)?,
        sender_name: row.get(9)?,
        sender_surname: row.get(10)?,
        sender_image: row.get(11)?,
    })
}

impl Database {
    /// Unread notifications, newest first. `limit` is 5 for the compact bell
    /// view; `None` returns the full unread list.
    pub fn unread_notifications(&self, recipient_id: &str, limit: Option<u32>) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
                 JOIN users u ON n.sender_id = u.id
                 WHERE n.recipient_id = ?1 AND n.is_read = 0
                 ORDER BY n.created_at DESC
                 LIMIT ?2"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![recipient_id, limit.map(i64::from).unwrap_or(-1)], notification_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Full notification history, newest first.
    pub fn all_notifications(&self, recipient_id: &str) -> Result<Vec<NotificationRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
                 JOIN users u ON n.sender_id = u.id
                 WHERE n.recipient_id = ?1
                 ORDER BY n.created_at DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([recipient_id], notification_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Newest unread notification not in `exclude`, for the sequential
    /// mark-read-as-you-scroll flow. `None` when the client has seen them all.
    pub fn next_unread_notification(
        &self,
        recipient_id: &str,
        exclude: &[Uuid],
    ) -> Result<Option<NotificationRow>> {
        self.with_conn(|conn| {
            // SQLite rejects an empty IN list, so the clause is only added
            // when there is something to exclude.
            let not_in = if exclude.is_empty() {
                String::new()
            } else {
                let placeholders: Vec<String> =
                    (2..=exclude.len() + 1).map(|i| format!("?{}", i)).collect();
                format!("AND n.id NOT IN ({})", placeholders.join(", "))
            };
            let sql = format!(
                "SELECT {NOTIFICATION_COLUMNS} FROM notifications n
                 JOIN users u ON n.sender_id = u.id
                 WHERE n.recipient_id = ?1 AND n.is_read = 0
                   {not_in}
                 ORDER BY n.created_at DESC
                 LIMIT 1"
            );
            let mut stmt = conn.prepare(&sql)?;

            let exclude_strings: Vec<String> = exclude.iter().map(|id| id.to_string()).collect();
            let mut sql_params: Vec<&dyn rusqlite::types::ToSql> = vec![&recipient_id];
            for id in &exclude_strings {
                sql_params.push(id);
            }

            let row = stmt
                .query_row(sql_params.as_slice(), notification_from_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Mark one notification read. Returns `false` (and flips nothing) when
    /// the notification does not belong to `recipient_id`.
    pub fn mark_notification_read(&self, id: &str, recipient_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1
                 WHERE id = ?1 AND recipient_id = ?2",
                params![id, recipient_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Flip every unread notification for `recipient_id` in one statement.
    pub fn mark_all_notifications_read(&self, recipient_id: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE notifications SET is_read = 1
                 WHERE recipient_id = ?1 AND is_read = 0",
                [recipient_id],
            )?;
            Ok(changed)
        })
    }
}
