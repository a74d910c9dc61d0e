use rusqlite::Connection;
use tracing::info;

use crate::Result;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            email       TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            name        TEXT,
            surname     TEXT,
            image       TEXT,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS posts (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            parent_id   TEXT REFERENCES posts(id) ON DELETE SET NULL,
            content     TEXT NOT NULL,
            shares      INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_posts_user
            ON posts(user_id, created_at);

        CREATE TABLE IF NOT EXISTS comments (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id     TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            content     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_comments_post
            ON comments(post_id, created_at);

        -- A like targets exactly one of a post or a comment.
        CREATE TABLE IF NOT EXISTS likes (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            post_id     TEXT REFERENCES posts(id) ON DELETE CASCADE,
            comment_id  TEXT REFERENCES comments(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            CHECK (
                (post_id IS NOT NULL AND comment_id IS NULL)
                OR (post_id IS NULL AND comment_id IS NOT NULL)
            ),
            UNIQUE(user_id, post_id),
            UNIQUE(user_id, comment_id)
        );

        CREATE INDEX IF NOT EXISTS idx_likes_post ON likes(post_id);
        CREATE INDEX IF NOT EXISTS idx_likes_comment ON likes(comment_id);

        CREATE TABLE IF NOT EXISTS messages (
            id            TEXT PRIMARY KEY,
            sender_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            recipient_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            content       TEXT NOT NULL,
            is_read       INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_recipient
            ON messages(recipient_id, is_read);
        CREATE INDEX IF NOT EXISTS idx_messages_created
            ON messages(created_at);

        -- Post/comment refs are nulled when the target is deleted; the
        -- notification itself stays.
        CREATE TABLE IF NOT EXISTS notifications (
            id            TEXT PRIMARY KEY,
            recipient_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            sender_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            kind          TEXT NOT NULL CHECK (kind IN (
                'friend_request', 'friend_accepted', 'post_like',
                'post_comment', 'post_share', 'comment_like'
            )),
            post_id       TEXT REFERENCES posts(id) ON DELETE SET NULL,
            comment_id    TEXT REFERENCES comments(id) ON DELETE SET NULL,
            is_read       INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_notifications_recipient
            ON notifications(recipient_id, is_read, created_at);

        -- Symmetric friendship, stored as both directed rows and mutated in
        -- pairs inside one transaction.
        CREATE TABLE IF NOT EXISTS friends (
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            friend_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, friend_id),
            CHECK (user_id <> friend_id)
        );

        -- Directed pending edge; 'pending' and 'received' are the two query
        -- views of this one table.
        CREATE TABLE IF NOT EXISTS friend_requests (
            requester_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            target_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at    TEXT NOT NULL,
            PRIMARY KEY (requester_id, target_id),
            CHECK (requester_id <> target_id)
        );
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
