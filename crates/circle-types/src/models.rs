use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The target of a like: exactly one of a post or a comment.
/// The two nullable foreign keys only exist at the storage boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum LikeTarget {
    Post { post_id: Uuid },
    Comment { comment_id: Uuid },
}

/// Notification category, carrying only the refs that category needs.
/// The refs are `Option` because the referenced post/comment may have been
/// deleted since the notification was created; the row keeps a nulled ref
/// rather than disappearing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    FriendRequest,
    FriendAccepted,
    PostLike {
        post_id: Option<Uuid>,
    },
    PostComment {
        post_id: Option<Uuid>,
        comment_id: Option<Uuid>,
    },
    PostShare {
        post_id: Option<Uuid>,
    },
    CommentLike {
        post_id: Option<Uuid>,
        comment_id: Option<Uuid>,
    },
}

impl NotificationKind {
    /// Storage tag for the `kind` column.
    pub fn as_str(&self) -> &'static str {
        self.storage_parts().0
    }

    /// Split into the flat (kind, post_id, comment_id) storage columns.
    pub fn storage_parts(&self) -> (&'static str, Option<Uuid>, Option<Uuid>) {
        match *self {
            Self::FriendRequest => ("friend_request", None, None),
            Self::FriendAccepted => ("friend_accepted", None, None),
            Self::PostLike { post_id } => ("post_like", post_id, None),
            Self::PostComment { post_id, comment_id } => ("post_comment", post_id, comment_id),
            Self::PostShare { post_id } => ("post_share", post_id, None),
            Self::CommentLike { post_id, comment_id } => ("comment_like", post_id, comment_id),
        }
    }

    /// Rebuild the variant from the flat storage columns. Returns `None` for
    /// an unknown kind tag.
    pub fn from_storage(
        kind: &str,
        post_id: Option<Uuid>,
        comment_id: Option<Uuid>,
    ) -> Option<Self> {
        match kind {
            "friend_request" => Some(Self::FriendRequest),
            "friend_accepted" => Some(Self::FriendAccepted),
            "post_like" => Some(Self::PostLike { post_id }),
            "post_comment" => Some(Self::PostComment { post_id, comment_id }),
            "post_share" => Some(Self::PostShare { post_id }),
            "comment_like" => Some(Self::CommentLike { post_id, comment_id }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_storage_round_trip() {
        let post = Uuid::new_v4();
        let comment = Uuid::new_v4();
        let kinds = [
            NotificationKind::FriendRequest,
            NotificationKind::FriendAccepted,
            NotificationKind::PostLike { post_id: Some(post) },
            NotificationKind::PostComment { post_id: Some(post), comment_id: Some(comment) },
            NotificationKind::PostShare { post_id: Some(post) },
            NotificationKind::CommentLike { post_id: Some(post), comment_id: Some(comment) },
        ];
        for kind in kinds {
            let (tag, p, c) = kind.storage_parts();
            assert_eq!(NotificationKind::from_storage(tag, p, c), Some(kind));
        }
    }

    #[test]
    fn unknown_kind_tag_is_rejected() {
        assert_eq!(NotificationKind::from_storage("poke", None, None), None);
    }

    #[test]
    fn kind_serializes_with_flat_refs() {
        let post = Uuid::new_v4();
        let json =
            serde_json::to_value(NotificationKind::PostLike { post_id: Some(post) }).unwrap();
        assert_eq!(json["type"], "post_like");
        assert_eq!(json["post_id"], serde_json::json!(post));
    }
}
