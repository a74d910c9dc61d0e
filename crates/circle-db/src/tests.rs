use uuid::Uuid;

use circle_types::models::{LikeTarget, NotificationKind};

use crate::friends::FriendRequestOutcome;
use crate::{Database, StoreError};

fn db() -> Database {
    Database::open_in_memory().unwrap()
}

fn new_user(db: &Database, username: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_user(&id, username, &format!("{username}@example.com"), "hash")
        .unwrap();
    id
}

fn make_friends(db: &Database, a: &str, b: &str) {
    match db.send_friend_request(a, b).unwrap() {
        FriendRequestOutcome::Requested(_) => {}
        _ => panic!("expected fresh request"),
    }
    db.accept_friend_request(b, a).unwrap();
}

fn new_post(db: &Database, user: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.create_post(&id, user, "hello world").unwrap();
    id
}

fn send(db: &Database, from: &str, to: &str, content: &str) -> String {
    let id = Uuid::new_v4().to_string();
    db.insert_message(&id, from, to, content).unwrap();
    id
}

// -- Users --

#[test]
fn registration_rejects_taken_username_and_email() {
    let db = db();

    assert!(db
        .create_user_if_free(&Uuid::new_v4().to_string(), "ada", "ada@example.com", "hash")
        .unwrap());

    // Same username, different email.
    assert!(!db
        .create_user_if_free(&Uuid::new_v4().to_string(), "ada", "other@example.com", "hash")
        .unwrap());
    // Same email, different username.
    assert!(!db
        .create_user_if_free(&Uuid::new_v4().to_string(), "ada2", "ada@example.com", "hash")
        .unwrap());

    // The losing attempts inserted nothing.
    assert!(db.get_user_by_username("ada2").unwrap().is_none());
    assert!(db.get_user_by_email("other@example.com").unwrap().is_none());
}

#[test]
fn profile_update_flows_into_payload_sender_info() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let post = new_post(&db, &ada);

    db.update_profile(&bob, Some("Bob"), None, Some("bob.png")).unwrap();
    let bob_row = db.get_user_by_id(&bob).unwrap().unwrap();
    assert_eq!(bob_row.name.as_deref(), Some("Bob"));
    assert!(bob_row.surname.is_none());

    db.toggle_like(
        &Uuid::new_v4().to_string(),
        &bob,
        LikeTarget::Post { post_id: post.parse().unwrap() },
    )
    .unwrap();

    let payload = db.all_notifications(&ada).unwrap().remove(0).into_payload().unwrap();
    assert_eq!(payload.sender.name.as_deref(), Some("Bob"));
    assert_eq!(payload.sender.image.as_deref(), Some("bob.png"));
}

// -- Likes and the binding policy --

#[test]
fn liking_own_post_creates_no_notification() {
    let db = db();
    let ada = new_user(&db, "ada");
    let post = new_post(&db, &ada);

    let outcome = db
        .toggle_like(
            &Uuid::new_v4().to_string(),
            &ada,
            LikeTarget::Post { post_id: post.parse().unwrap() },
        )
        .unwrap();

    assert!(outcome.is_liked);
    assert!(outcome.notification.is_none());
    assert!(db.unread_notifications(&ada, None).unwrap().is_empty());
}

#[test]
fn liking_a_post_notifies_its_owner() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let post = new_post(&db, &ada);

    let outcome = db
        .toggle_like(
            &Uuid::new_v4().to_string(),
            &bob,
            LikeTarget::Post { post_id: post.parse().unwrap() },
        )
        .unwrap();

    let row = outcome.notification.expect("owner should be notified");
    assert_eq!(row.recipient_id, ada);
    assert_eq!(row.sender_id, bob);
    assert_eq!(row.kind, "post_like");
    assert_eq!(row.post_id.as_deref(), Some(post.as_str()));
    assert!(!row.is_read);

    let unread = db.unread_notifications(&ada, Some(5)).unwrap();
    assert_eq!(unread.len(), 1);
}

#[test]
fn unliking_never_notifies() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let post = new_post(&db, &ada);
    let target = LikeTarget::Post { post_id: post.parse().unwrap() };

    db.toggle_like(&Uuid::new_v4().to_string(), &bob, target).unwrap();
    let outcome = db.toggle_like(&Uuid::new_v4().to_string(), &bob, target).unwrap();

    assert!(!outcome.is_liked);
    assert_eq!(outcome.like_count, 0);
    assert!(outcome.notification.is_none());
    // Only the original like notification exists.
    assert_eq!(db.all_notifications(&ada).unwrap().len(), 1);
}

#[test]
fn comment_like_carries_post_and_comment_refs() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let post = new_post(&db, &ada);

    let comment_id = Uuid::new_v4().to_string();
    db.create_comment(&comment_id, &ada, &post, "nice").unwrap();

    let outcome = db
        .toggle_like(
            &Uuid::new_v4().to_string(),
            &bob,
            LikeTarget::Comment { comment_id: comment_id.parse().unwrap() },
        )
        .unwrap();

    let row = outcome.notification.unwrap();
    assert_eq!(row.kind, "comment_like");
    assert_eq!(row.post_id.as_deref(), Some(post.as_str()));
    assert_eq!(row.comment_id.as_deref(), Some(comment_id.as_str()));
}

#[test]
fn commenting_notifies_the_post_owner() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let post = new_post(&db, &ada);

    let comment_id = Uuid::new_v4().to_string();
    let (comment, notification) = db.create_comment(&comment_id, &bob, &post, "hi").unwrap();

    assert_eq!(comment.post_id, post);
    let row = notification.unwrap();
    assert_eq!(row.recipient_id, ada);
    assert_eq!(row.kind, "post_comment");
    assert_eq!(row.comment_id.as_deref(), Some(comment_id.as_str()));
}

#[test]
fn commenting_on_own_post_is_silent() {
    let db = db();
    let ada = new_user(&db, "ada");
    let post = new_post(&db, &ada);

    let (_, notification) = db
        .create_comment(&Uuid::new_v4().to_string(), &ada, &post, "note to self")
        .unwrap();
    assert!(notification.is_none());
}

// -- Reshares --

#[test]
fn reshare_bumps_counter_and_notifies_original_owner() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let original = new_post(&db, &ada);

    let reshare_id = Uuid::new_v4().to_string();
    let (post, notification) = db.reshare_post(&reshare_id, &bob, &original, "look").unwrap();

    assert_eq!(post.parent_id.as_deref(), Some(original.as_str()));
    assert_eq!(db.get_post(&original).unwrap().shares, 1);

    let row = notification.unwrap();
    assert_eq!(row.recipient_id, ada);
    assert_eq!(row.kind, "post_share");
    // The ref points at the new reshare post, not the original.
    assert_eq!(row.post_id.as_deref(), Some(reshare_id.as_str()));
}

#[test]
fn resharing_own_post_is_silent() {
    let db = db();
    let ada = new_user(&db, "ada");
    let original = new_post(&db, &ada);

    let (_, notification) = db
        .reshare_post(&Uuid::new_v4().to_string(), &ada, &original, "again")
        .unwrap();
    assert!(notification.is_none());
    assert_eq!(db.get_post(&original).unwrap().shares, 1);
}

// -- Friend requests --

#[test]
fn fresh_request_notifies_target() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");

    let outcome = db.send_friend_request(&ada, &bob).unwrap();
    let row = match outcome {
        FriendRequestOutcome::Requested(row) => row,
        _ => panic!("expected a fresh request"),
    };
    assert_eq!(row.recipient_id, bob);
    assert_eq!(row.kind, "friend_request");
    assert!(!db.are_friends(&ada, &bob).unwrap());
    assert_eq!(db.received_requests(&bob).unwrap().len(), 1);
}

#[test]
fn duplicate_request_is_rejected_quietly() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");

    db.send_friend_request(&ada, &bob).unwrap();
    match db.send_friend_request(&ada, &bob).unwrap() {
        FriendRequestOutcome::AlreadyRequested => {}
        _ => panic!("expected AlreadyRequested"),
    }
    assert_eq!(db.all_notifications(&bob).unwrap().len(), 1);
}

#[test]
fn self_request_is_forbidden() {
    let db = db();
    let ada = new_user(&db, "ada");
    assert!(matches!(db.send_friend_request(&ada, &ada), Err(StoreError::Forbidden)));
}

#[test]
fn mutual_requests_resolve_to_friendship() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");

    db.send_friend_request(&ada, &bob).unwrap();
    let outcome = db.send_friend_request(&bob, &ada).unwrap();

    let accepted = match outcome {
        FriendRequestOutcome::Accepted(row) => row,
        _ => panic!("mutual request should resolve as acceptance"),
    };

    // Original requester gets the friend_accepted notification.
    assert_eq!(accepted.recipient_id, ada);
    assert_eq!(accepted.kind, "friend_accepted");

    // Symmetric friendship, no pending edges left in either direction.
    assert!(db.are_friends(&ada, &bob).unwrap());
    assert!(db.are_friends(&bob, &ada).unwrap());
    assert!(db.received_requests(&ada).unwrap().is_empty());
    assert!(db.received_requests(&bob).unwrap().is_empty());

    // Ada's original request notification (delivered to bob) is now read.
    let bobs = db.all_notifications(&bob).unwrap();
    assert_eq!(bobs.len(), 1);
    assert_eq!(bobs[0].kind, "friend_request");
    assert!(bobs[0].is_read);
}

#[test]
fn explicit_accept_marks_request_notification_read() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");

    db.send_friend_request(&ada, &bob).unwrap();
    let accepted = db.accept_friend_request(&bob, &ada).unwrap();

    assert_eq!(accepted.recipient_id, ada);
    assert!(db.are_friends(&ada, &bob).unwrap());
    assert!(db.unread_notifications(&bob, None).unwrap().is_empty());
}

#[test]
fn accept_without_pending_request_is_not_found() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    assert!(matches!(db.accept_friend_request(&bob, &ada), Err(StoreError::NotFound)));
}

#[test]
fn decline_clears_the_edge_without_notifying() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");

    db.send_friend_request(&ada, &bob).unwrap();
    db.decline_friend_request(&bob, &ada).unwrap();

    assert!(db.received_requests(&bob).unwrap().is_empty());
    assert!(!db.are_friends(&ada, &bob).unwrap());
    // Only the original request notification; no decline notification.
    assert_eq!(db.all_notifications(&ada).unwrap().len(), 0);
    assert_eq!(db.all_notifications(&bob).unwrap().len(), 1);
}

// -- Notification read state --

#[test]
fn foreign_mark_read_fails_and_flips_nothing() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let cat = new_user(&db, "cat");
    let post = new_post(&db, &ada);

    let outcome = db
        .toggle_like(
            &Uuid::new_v4().to_string(),
            &bob,
            LikeTarget::Post { post_id: post.parse().unwrap() },
        )
        .unwrap();
    let id = outcome.notification.unwrap().id;

    assert!(!db.mark_notification_read(&id, &cat).unwrap());
    assert_eq!(db.unread_notifications(&ada, None).unwrap().len(), 1);

    assert!(db.mark_notification_read(&id, &ada).unwrap());
    assert!(db.unread_notifications(&ada, None).unwrap().is_empty());
}

#[test]
fn mark_all_read_leaves_no_unread() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");

    for _ in 0..3 {
        let post = new_post(&db, &ada);
        db.toggle_like(
            &Uuid::new_v4().to_string(),
            &bob,
            LikeTarget::Post { post_id: post.parse().unwrap() },
        )
        .unwrap();
    }

    assert_eq!(db.mark_all_notifications_read(&ada).unwrap(), 3);
    assert!(db.unread_notifications(&ada, None).unwrap().is_empty());
    assert_eq!(db.all_notifications(&ada).unwrap().len(), 3);
}

#[test]
fn bell_view_returns_newest_five() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");

    for _ in 0..7 {
        let post = new_post(&db, &ada);
        db.toggle_like(
            &Uuid::new_v4().to_string(),
            &bob,
            LikeTarget::Post { post_id: post.parse().unwrap() },
        )
        .unwrap();
    }

    let bell = db.unread_notifications(&ada, Some(5)).unwrap();
    assert_eq!(bell.len(), 5);
    for pair in bell.windows(2) {
        assert!(pair[0].created_at >= pair[1].created_at);
    }
    assert_eq!(db.unread_notifications(&ada, None).unwrap().len(), 7);
}

#[test]
fn next_unread_skips_the_exclusion_set() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");

    let mut ids = Vec::new();
    for _ in 0..2 {
        let post = new_post(&db, &ada);
        let outcome = db
            .toggle_like(
                &Uuid::new_v4().to_string(),
                &bob,
                LikeTarget::Post { post_id: post.parse().unwrap() },
            )
            .unwrap();
        ids.push(outcome.notification.unwrap().id);
    }

    let newest = db.next_unread_notification(&ada, &[]).unwrap().unwrap();
    assert_eq!(newest.id, ids[1]);

    let older = db
        .next_unread_notification(&ada, &[ids[1].parse().unwrap()])
        .unwrap()
        .unwrap();
    assert_eq!(older.id, ids[0]);

    let exhausted = db
        .next_unread_notification(&ada, &[ids[0].parse().unwrap(), ids[1].parse().unwrap()])
        .unwrap();
    assert!(exhausted.is_none());
}

// -- Deletion edge cases --

#[test]
fn deleting_a_post_nulls_the_notification_ref() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let post = new_post(&db, &ada);

    db.toggle_like(
        &Uuid::new_v4().to_string(),
        &bob,
        LikeTarget::Post { post_id: post.parse().unwrap() },
    )
    .unwrap();
    db.delete_post(&post, &ada).unwrap();

    // Notification survives with its ref nulled.
    let rows = db.all_notifications(&ada).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].kind, "post_like");
    assert!(rows[0].post_id.is_none());

    let payload = db.all_notifications(&ada).unwrap().remove(0).into_payload().unwrap();
    assert_eq!(payload.kind, NotificationKind::PostLike { post_id: None });
}

#[test]
fn deleting_someone_elses_post_is_forbidden() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let post = new_post(&db, &ada);

    assert!(matches!(db.delete_post(&post, &bob), Err(StoreError::Forbidden)));
    db.get_post(&post).unwrap();
}

#[test]
fn deleting_a_comment_requires_ownership() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let post = new_post(&db, &ada);

    let comment_id = Uuid::new_v4().to_string();
    db.create_comment(&comment_id, &bob, &post, "hi").unwrap();

    assert!(matches!(db.delete_comment(&comment_id, &ada), Err(StoreError::Forbidden)));
    db.delete_comment(&comment_id, &bob).unwrap();
    assert!(db.comments_page(&post, 10, 0).unwrap().is_empty());
}

// -- Messaging --

#[test]
fn messages_require_friendship() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");

    let err = db
        .insert_message(&Uuid::new_v4().to_string(), &ada, &bob, "hi")
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFriends));
}

#[test]
fn self_chat_is_rejected() {
    let db = db();
    let ada = new_user(&db, "ada");
    let err = db
        .insert_message(&Uuid::new_v4().to_string(), &ada, &ada, "hello me")
        .unwrap_err();
    assert!(matches!(err, StoreError::Forbidden));
}

#[test]
fn offline_message_is_persisted_unread() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    make_friends(&db, &ada, &bob);

    send(&db, &ada, &bob, "hi");

    let page = db.conversation_page(&bob, &ada, 20, 0).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].content, "hi");
    assert!(!page[0].is_read);
    assert!(db.has_unread_messages(&bob).unwrap());
}

#[test]
fn latest_conversations_returns_one_row_per_partner() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let cat = new_user(&db, "cat");
    make_friends(&db, &ada, &bob);
    make_friends(&db, &ada, &cat);

    // Both directions of the ada-bob conversation must group together.
    send(&db, &ada, &bob, "one");
    send(&db, &bob, &ada, "two");
    let last_with_cat = send(&db, &cat, &ada, "hi ada");
    let last_with_bob = send(&db, &ada, &bob, "three");

    let latest = db.latest_conversations(&ada).unwrap();
    assert_eq!(latest.len(), 2);
    assert_eq!(latest[0].id, last_with_bob);
    assert_eq!(latest[0].content, "three");
    assert_eq!(latest[1].id, last_with_cat);
}

#[test]
fn conversation_pages_are_newest_first() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    make_friends(&db, &ada, &bob);

    for i in 0..5 {
        send(&db, &ada, &bob, &format!("msg {i}"));
    }

    let first = db.conversation_page(&ada, &bob, 2, 0).unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].content, "msg 4");
    assert_eq!(first[1].content, "msg 3");

    let second = db.conversation_page(&ada, &bob, 2, 2).unwrap();
    assert_eq!(second[0].content, "msg 2");
}

#[test]
fn conversation_read_flip_reports_other_unread() {
    let db = db();
    let ada = new_user(&db, "ada");
    let bob = new_user(&db, "bob");
    let cat = new_user(&db, "cat");
    make_friends(&db, &ada, &bob);
    make_friends(&db, &ada, &cat);

    send(&db, &bob, &ada, "from bob");
    send(&db, &cat, &ada, "from cat");

    // Reading bob's conversation leaves cat's unread.
    assert!(db.mark_conversation_read(&ada, &bob).unwrap());
    assert!(!db.mark_conversation_read(&ada, &cat).unwrap());
    assert!(!db.has_unread_messages(&ada).unwrap());

    let page = db.conversation_page(&ada, &bob, 20, 0).unwrap();
    assert!(page.iter().all(|m| m.is_read));
}
