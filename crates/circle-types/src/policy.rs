//! Maps domain actions to the notification they must create, if any.
//!
//! One universal rule: a user is never notified about their own action.
//! Unlikes, declines and removals never notify.

use uuid::Uuid;

use crate::models::NotificationKind;

/// A domain action that may require a notification. Carries the ids the
/// resulting notification needs plus the id of the user on the receiving end.
#[derive(Debug, Clone, Copy)]
pub enum DomainAction {
    PostLiked {
        post_id: Uuid,
        post_owner: Uuid,
    },
    CommentLiked {
        post_id: Uuid,
        comment_id: Uuid,
        comment_owner: Uuid,
    },
    PostCommented {
        post_id: Uuid,
        comment_id: Uuid,
        post_owner: Uuid,
    },
    /// `post_id` is the id of the new reshare post, not the original.
    PostShared {
        post_id: Uuid,
        original_owner: Uuid,
    },
    FriendRequestSent {
        target: Uuid,
    },
    /// Covers both explicit accepts and the implicit accept that resolves a
    /// mutual request. `requester` is the user who sent the original request.
    FriendRequestAccepted {
        requester: Uuid,
    },
}

impl DomainAction {
    fn recipient(&self) -> Uuid {
        match *self {
            Self::PostLiked { post_owner, .. } => post_owner,
            Self::CommentLiked { comment_owner, .. } => comment_owner,
            Self::PostCommented { post_owner, .. } => post_owner,
            Self::PostShared { original_owner, .. } => original_owner,
            Self::FriendRequestSent { target } => target,
            Self::FriendRequestAccepted { requester } => requester,
        }
    }

    fn kind(&self) -> NotificationKind {
        match *self {
            Self::PostLiked { post_id, .. } => NotificationKind::PostLike {
                post_id: Some(post_id),
            },
            Self::CommentLiked { post_id, comment_id, .. } => NotificationKind::CommentLike {
                post_id: Some(post_id),
                comment_id: Some(comment_id),
            },
            Self::PostCommented { post_id, comment_id, .. } => NotificationKind::PostComment {
                post_id: Some(post_id),
                comment_id: Some(comment_id),
            },
            Self::PostShared { post_id, .. } => NotificationKind::PostShare {
                post_id: Some(post_id),
            },
            Self::FriendRequestSent { .. } => NotificationKind::FriendRequest,
            Self::FriendRequestAccepted { .. } => NotificationKind::FriendAccepted,
        }
    }
}

/// Decide whether `actor` performing `action` creates a notification, and for
/// whom. Returns `None` when the recipient would be the actor.
pub fn notification_for(actor: Uuid, action: &DomainAction) -> Option<(Uuid, NotificationKind)> {
    let recipient = action.recipient();
    if recipient == actor {
        return None;
    }
    Some((recipient, action.kind()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_action_never_notifies() {
        let me = Uuid::new_v4();
        let post = Uuid::new_v4();
        let actions = [
            DomainAction::PostLiked { post_id: post, post_owner: me },
            DomainAction::PostShared { post_id: post, original_owner: me },
            DomainAction::FriendRequestAccepted { requester: me },
        ];
        for action in &actions {
            assert!(notification_for(me, action).is_none());
        }
    }

    #[test]
    fn like_post_notifies_post_owner() {
        let actor = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let post = Uuid::new_v4();

        let (recipient, kind) =
            notification_for(actor, &DomainAction::PostLiked { post_id: post, post_owner: owner })
                .unwrap();

        assert_eq!(recipient, owner);
        assert_eq!(kind, NotificationKind::PostLike { post_id: Some(post) });
    }

    #[test]
    fn comment_like_carries_both_refs() {
        let actor = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let post = Uuid::new_v4();
        let comment = Uuid::new_v4();

        let (recipient, kind) = notification_for(
            actor,
            &DomainAction::CommentLiked { post_id: post, comment_id: comment, comment_owner: owner },
        )
        .unwrap();

        assert_eq!(recipient, owner);
        assert_eq!(
            kind,
            NotificationKind::CommentLike { post_id: Some(post), comment_id: Some(comment) }
        );
    }

    #[test]
    fn friend_request_has_no_refs() {
        let actor = Uuid::new_v4();
        let target = Uuid::new_v4();

        let (recipient, kind) =
            notification_for(actor, &DomainAction::FriendRequestSent { target }).unwrap();

        assert_eq!(recipient, target);
        assert_eq!(kind, NotificationKind::FriendRequest);
    }
}
