//! Friend graph transitions and their notification side effects.
//!
//! Friendship is symmetric: both directed rows are inserted or removed in
//! the same transaction, and a user never appears in their own edge sets.

use rusqlite::{Connection, OptionalExtension, params};

use circle_types::models::NotificationKind;

use crate::models::{NotificationRow, UserRow, now_ts};
use crate::notifications::{insert_notification, mark_friend_request_read};
use crate::users::user_from_row;
use crate::{Database, Result, StoreError};

/// What a send-request call actually did.
pub enum FriendRequestOutcome {
    /// A pending request now exists; the target was notified.
    Requested(NotificationRow),
    /// The target had already requested the actor, so the pair became
    /// friends immediately; the original requester was notified.
    Accepted(NotificationRow),
    AlreadyFriends,
    AlreadyRequested,
}

impl Database {
    /// Send a friend request from `actor_id` to `target_id`, resolving a
    /// mutual request as an immediate acceptance instead of a duplicate.
    pub fn send_friend_request(&self, actor_id: &str, target_id: &str) -> Result<FriendRequestOutcome> {
        if actor_id == target_id {
            return Err(StoreError::Forbidden);
        }

        self.with_tx(|tx| {
            if are_friends_inner(tx, actor_id, target_id)? {
                return Ok(FriendRequestOutcome::AlreadyFriends);
            }
            if request_exists(tx, actor_id, target_id)? {
                return Ok(FriendRequestOutcome::AlreadyRequested);
            }

            // Mutual request: the target already asked for this friendship.
            if request_exists(tx, target_id, actor_id)? {
                let notification = accept_inner(tx, actor_id, target_id)?;
                return Ok(FriendRequestOutcome::Accepted(notification));
            }

            tx.execute(
                "INSERT INTO friend_requests (requester_id, target_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![actor_id, target_id, now_ts()],
            )?;
            let notification =
                insert_notification(tx, target_id, actor_id, &NotificationKind::FriendRequest)?;
            Ok(FriendRequestOutcome::Requested(notification))
        })
    }

    /// Explicitly accept a pending request from `requester_id`.
    pub fn accept_friend_request(&self, actor_id: &str, requester_id: &str) -> Result<NotificationRow> {
        self.with_tx(|tx| {
            if !request_exists(tx, requester_id, actor_id)? {
                return Err(StoreError::NotFound);
            }
            accept_inner(tx, actor_id, requester_id)
        })
    }

    pub fn decline_friend_request(&self, actor_id: &str, requester_id: &str) -> Result<()> {
        self.with_tx(|tx| {
            let removed = tx.execute(
                "DELETE FROM friend_requests WHERE requester_id = ?1 AND target_id = ?2",
                params![requester_id, actor_id],
            )?;
            if removed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    /// Remove an existing friendship; both directed rows go together.
    pub fn remove_friend(&self, actor_id: &str, other_id: &str) -> Result<()> {
        self.with_tx(|tx| {
            let removed = tx.execute(
                "DELETE FROM friends
                 WHERE (user_id = ?1 AND friend_id = ?2)
                    OR (user_id = ?2 AND friend_id = ?1)",
                params![actor_id, other_id],
            )?;
            if removed == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
    }

    pub fn are_friends(&self, a: &str, b: &str) -> Result<bool> {
        self.with_conn(|conn| are_friends_inner(conn, a, b))
    }

    pub fn friends_of(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.email, u.password, u.name, u.surname, u.image, u.created_at
                 FROM friends f
                 JOIN users u ON f.friend_id = u.id
                 WHERE f.user_id = ?1
                 ORDER BY u.username",
            )?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Users whose requests are waiting on `user_id`, newest first.
    pub fn received_requests(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.email, u.password, u.name, u.surname, u.image, u.created_at
                 FROM friend_requests r
                 JOIN users u ON r.requester_id = u.id
                 WHERE r.target_id = ?1
                 ORDER BY r.created_at DESC",
            )?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

/// Acceptance body shared by the explicit accept and the mutual-request
/// path: create both friendship rows, clear the directed request, notify the
/// original requester, and mark their request notification read.
fn accept_inner(conn: &Connection, actor_id: &str, requester_id: &str) -> Result<NotificationRow> {
    conn.execute(
        "INSERT INTO friends (user_id, friend_id) VALUES (?1, ?2), (?2, ?1)",
        params![actor_id, requester_id],
    )?;
    conn.execute(
        "DELETE FROM friend_requests WHERE requester_id = ?1 AND target_id = ?2",
        params![requester_id, actor_id],
    )?;

    let notification =
        insert_notification(conn, requester_id, actor_id, &NotificationKind::FriendAccepted)?;

    // The request notification the actor received is now superseded.
    mark_friend_request_read(conn, actor_id, requester_id)?;

    Ok(notification)
}

fn are_friends_inner(conn: &Connection, a: &str, b: &str) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM friends WHERE user_id = ?1 AND friend_id = ?2",
            params![a, b],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}

fn request_exists(conn: &Connection, requester_id: &str, target_id: &str) -> Result<bool> {
    let row: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM friend_requests WHERE requester_id = ?1 AND target_id = ?2",
            params![requester_id, target_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(row.is_some())
}
