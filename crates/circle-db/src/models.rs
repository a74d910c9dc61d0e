//! Database row types — these map directly to SQLite rows.
//! Wire payloads live in circle-types; conversion happens here, at the
//! persistence boundary.

use anyhow::{Context, anyhow};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use circle_types::api::{MessagePayload, NotificationPayload, SenderInfo};
use circle_types::models::NotificationKind;

#[derive(Debug)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub surname: Option<String>,
    pub image: Option<String>,
    pub created_at: String,
}

#[derive(Debug)]
pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub parent_id: Option<String>,
    pub content: String,
    pub shares: i64,
    pub created_at: String,
}

#[derive(Debug)]
pub struct CommentRow {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub content: String,
    pub created_at: String,
}

/// A message row joined with the sender's display columns, so one query is
/// enough to build the wire payload.
#[derive(Debug)]
pub struct MessageRow {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
    pub sender_username: String,
    pub sender_name: Option<String>,
    pub sender_surname: Option<String>,
    pub sender_image: Option<String>,
}

/// A notification row joined with the sender's display columns.
#[derive(Debug)]
pub struct NotificationRow {
    pub id: String,
    pub recipient_id: String,
    pub sender_id: String,
    pub kind: String,
    pub post_id: Option<String>,
    pub comment_id: Option<String>,
    pub is_read: bool,
    pub created_at: String,
    pub sender_username: String,
    pub sender_name: Option<String>,
    pub sender_surname: Option<String>,
    pub sender_image: Option<String>,
}

/// Timestamp stored as RFC 3339 with microseconds: lexicographic order over
/// the column equals chronological order.
pub(crate) fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_ts(s: &str) -> anyhow::Result<DateTime<Utc>> {
    s.parse::<DateTime<Utc>>()
        .with_context(|| format!("bad timestamp '{}'", s))
}

fn parse_id(s: &str) -> anyhow::Result<Uuid> {
    s.parse::<Uuid>().with_context(|| format!("bad uuid '{}'", s))
}

fn parse_opt_id(s: &Option<String>) -> anyhow::Result<Option<Uuid>> {
    s.as_deref().map(parse_id).transpose()
}

impl NotificationRow {
    pub fn into_payload(self) -> anyhow::Result<NotificationPayload> {
        let kind = NotificationKind::from_storage(
            &self.kind,
            parse_opt_id(&self.post_id)?,
            parse_opt_id(&self.comment_id)?,
        )
        .ok_or_else(|| anyhow!("unknown notification kind '{}'", self.kind))?;

        Ok(NotificationPayload {
            id: parse_id(&self.id)?,
            kind,
            sender: SenderInfo {
                id: parse_id(&self.sender_id)?,
                username: self.sender_username,
                name: self.sender_name,
                surname: self.sender_surname,
                image: self.sender_image,
            },
            is_read: self.is_read,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

impl MessageRow {
    pub fn into_payload(self) -> anyhow::Result<MessagePayload> {
        Ok(MessagePayload {
            id: parse_id(&self.id)?,
            sender: SenderInfo {
                id: parse_id(&self.sender_id)?,
                username: self.sender_username,
                name: self.sender_name,
                surname: self.sender_surname,
                image: self.sender_image,
            },
            recipient_id: parse_id(&self.recipient_id)?,
            content: self.content,
            is_read: self.is_read,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}
