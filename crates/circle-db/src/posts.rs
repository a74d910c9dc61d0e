//! Post graph operations. Every mutation that the binding policy maps to a
//! notification runs the domain write and the notification insert in one
//! transaction; callers emit only after these return, i.e. after commit.

use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use circle_types::models::LikeTarget;
use circle_types::policy::{self, DomainAction};

use crate::models::{CommentRow, NotificationRow, PostRow, now_ts};
use crate::notifications::insert_notification;
use crate::{Database, Result, StoreError};

/// Result of a like toggle.
pub struct LikeOutcome {
    pub is_liked: bool,
    pub like_count: u64,
    /// Present only when a like edge was created for someone else's content.
    pub notification: Option<NotificationRow>,
}

impl Database {
    pub fn create_post(&self, id: &str, user_id: &str, content: &str) -> Result<PostRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO posts (id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, user_id, content, now_ts()],
            )?;
            post_by_id(conn, id)
        })
    }

    /// Reshare: new post referencing the parent, parent share counter bump,
    /// and a post_share notification for the original owner, all in one
    /// transaction.
    pub fn reshare_post(
        &self,
        id: &str,
        user_id: &str,
        parent_id: &str,
        content: &str,
    ) -> Result<(PostRow, Option<NotificationRow>)> {
        self.with_tx(|tx| {
            let parent = post_by_id(tx, parent_id)?;

            tx.execute("UPDATE posts SET shares = shares + 1 WHERE id = ?1", [parent_id])?;
            tx.execute(
                "INSERT INTO posts (id, user_id, parent_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, parent_id, content, now_ts()],
            )?;

            let post = post_by_id(tx, id)?;
            let action = DomainAction::PostShared {
                post_id: parse_uuid(id)?,
                original_owner: parse_uuid(&parent.user_id)?,
            };
            let notification = apply_policy(tx, user_id, &action)?;
            Ok((post, notification))
        })
    }

    /// Delete a post. Fails closed when `user_id` is not the owner; likes
    /// and comments cascade, notification refs are nulled by the schema.
    pub fn delete_post(&self, post_id: &str, user_id: &str) -> Result<()> {
        self.with_tx(|tx| {
            let post = post_by_id(tx, post_id)?;
            if post.user_id != user_id {
                return Err(StoreError::Forbidden);
            }
            tx.execute("DELETE FROM posts WHERE id = ?1", [post_id])?;
            Ok(())
        })
    }

    pub fn get_post(&self, post_id: &str) -> Result<PostRow> {
        self.with_conn(|conn| post_by_id(conn, post_id))
    }

    pub fn create_comment(
        &self,
        id: &str,
        user_id: &str,
        post_id: &str,
        content: &str,
    ) -> Result<(CommentRow, Option<NotificationRow>)> {
        self.with_tx(|tx| {
            let post = post_by_id(tx, post_id)?;

            tx.execute(
                "INSERT INTO comments (id, user_id, post_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, user_id, post_id, content, now_ts()],
            )?;

            let comment = comment_by_id(tx, id)?;
            let action = DomainAction::PostCommented {
                post_id: parse_uuid(post_id)?,
                comment_id: parse_uuid(id)?,
                post_owner: parse_uuid(&post.user_id)?,
            };
            let notification = apply_policy(tx, user_id, &action)?;
            Ok((comment, notification))
        })
    }

    pub fn delete_comment(&self, comment_id: &str, user_id: &str) -> Result<()> {
        self.with_tx(|tx| {
            let comment = comment_by_id(tx, comment_id)?;
            if comment.user_id != user_id {
                return Err(StoreError::Forbidden);
            }
            tx.execute("DELETE FROM comments WHERE id = ?1", [comment_id])?;
            Ok(())
        })
    }

    /// Comments of a post, oldest first, paginated for the "load more" flow.
    pub fn comments_page(&self, post_id: &str, limit: u32, offset: u32) -> Result<Vec<CommentRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, post_id, content, created_at FROM comments
                 WHERE post_id = ?1
                 ORDER BY created_at ASC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt
                .query_map(params![post_id, limit, offset], comment_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Toggle a like on a post or comment. Creating the edge on someone
    /// else's content produces a notification; removing it never does.
    pub fn toggle_like(&self, like_id: &str, user_id: &str, target: LikeTarget) -> Result<LikeOutcome> {
        self.with_tx(|tx| {
            let (column, target_id, action) = match target {
                LikeTarget::Post { post_id } => {
                    let post = post_by_id(tx, &post_id.to_string())?;
                    let action = DomainAction::PostLiked {
                        post_id,
                        post_owner: parse_uuid(&post.user_id)?,
                    };
                    ("post_id", post_id, action)
                }
                LikeTarget::Comment { comment_id } => {
                    let comment = comment_by_id(tx, &comment_id.to_string())?;
                    let action = DomainAction::CommentLiked {
                        post_id: parse_uuid(&comment.post_id)?,
                        comment_id,
                        comment_owner: parse_uuid(&comment.user_id)?,
                    };
                    ("comment_id", comment_id, action)
                }
            };
            let target_id = target_id.to_string();

            let existing: Option<String> = tx
                .query_row(
                    &format!("SELECT id FROM likes WHERE user_id = ?1 AND {column} = ?2"),
                    params![user_id, target_id],
                    |row| row.get(0),
                )
                .optional()?;

            let (is_liked, notification) = match existing {
                Some(existing_id) => {
                    tx.execute("DELETE FROM likes WHERE id = ?1", [&existing_id])?;
                    (false, None)
                }
                None => {
                    tx.execute(
                        &format!(
                            "INSERT INTO likes (id, user_id, {column}, created_at)
                             VALUES (?1, ?2, ?3, ?4)"
                        ),
                        params![like_id, user_id, target_id, now_ts()],
                    )?;
                    (true, apply_policy(tx, user_id, &action)?)
                }
            };

            let like_count: i64 = tx.query_row(
                &format!("SELECT COUNT(*) FROM likes WHERE {column} = ?1"),
                [&target_id],
                |row| row.get(0),
            )?;

            Ok(LikeOutcome {
                is_liked,
                like_count: like_count as u64,
                notification,
            })
        })
    }
}

/// Run the binding policy for `action` and insert the notification it calls
/// for, if any. Self-actions yield `None`.
fn apply_policy(
    conn: &Connection,
    actor_id: &str,
    action: &DomainAction,
) -> Result<Option<NotificationRow>> {
    let actor = parse_uuid(actor_id)?;
    match policy::notification_for(actor, action) {
        Some((recipient, kind)) => {
            let row = insert_notification(conn, &recipient.to_string(), actor_id, &kind)?;
            Ok(Some(row))
        }
        None => Ok(None),
    }
}

pub(crate) fn parse_uuid(s: &str) -> Result<Uuid> {
    s.parse::<Uuid>()
        .map_err(|e| StoreError::Other(anyhow::anyhow!("bad uuid '{}': {}", s, e)))
}

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        parent_id: row.get(2)?,
        content: row.get(3)?,
        shares: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn comment_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        post_id: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn post_by_id(conn: &Connection, id: &str) -> Result<PostRow> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, parent_id, content, shares, created_at FROM posts WHERE id = ?1",
    )?;
    stmt.query_row([id], post_from_row)
        .optional()?
        .ok_or(StoreError::NotFound)
}

fn comment_by_id(conn: &Connection, id: &str) -> Result<CommentRow> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, post_id, content, created_at FROM comments WHERE id = ?1",
    )?;
    stmt.query_row([id], comment_from_row)
        .optional()?
        .ok_or(StoreError::NotFound)
}
