use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        // AUTOINCREMENT keeps ids strictly increasing and never reused; cursors rely on it.
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                username        TEXT NOT NULL UNIQUE,
                name            TEXT,
                profile_photo   TEXT,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE posts (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id),
                content     TEXT,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_user ON posts(user_id, id);

            CREATE TABLE visual_media (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id             INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                kind                TEXT NOT NULL,
                url                 TEXT NOT NULL,
                file_name           TEXT,
                processing_status   TEXT
            );

            CREATE INDEX idx_visual_media_post ON visual_media(post_id);
            CREATE INDEX idx_visual_media_file ON visual_media(file_name);

            CREATE TABLE post_likes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                UNIQUE(post_id, user_id)
            );

            CREATE TABLE comments (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id     INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                parent_id   INTEGER REFERENCES comments(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_comments_post ON comments(post_id, id);
            CREATE INDEX idx_comments_parent ON comments(parent_id, id);

            CREATE TABLE comment_likes (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                comment_id  INTEGER NOT NULL REFERENCES comments(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id),
                created_at  TEXT NOT NULL,
                UNIQUE(comment_id, user_id)
            );

            CREATE TABLE follows (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                follower_id     TEXT NOT NULL REFERENCES users(id),
                following_id    TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                UNIQUE(follower_id, following_id)
            );

            CREATE TABLE activities (
                id                      INTEGER PRIMARY KEY AUTOINCREMENT,
                type                    TEXT NOT NULL,
                source_id               INTEGER NOT NULL,
                target_id               INTEGER,
                source_user_id          TEXT NOT NULL REFERENCES users(id),
                target_user_id          TEXT NOT NULL REFERENCES users(id),
                is_notification_read    INTEGER NOT NULL DEFAULT 0,
                is_notification_active  INTEGER NOT NULL DEFAULT 1,
                created_at              TEXT NOT NULL
            );

            CREATE INDEX idx_activities_target ON activities(target_user_id, id);

            CREATE TABLE push_subscriptions (
                endpoint    TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                p256dh      TEXT NOT NULL,
                auth        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_push_subscriptions_user ON push_subscriptions(user_id);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (announcements)");
        conn.execute_batch(
            "
            CREATE TABLE announcements (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL REFERENCES users(id),
                title       TEXT NOT NULL,
                content     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE announcement_dismissals (
                announcement_id INTEGER NOT NULL REFERENCES announcements(id) ON DELETE CASCADE,
                user_id         TEXT NOT NULL REFERENCES users(id),
                created_at      TEXT NOT NULL,
                PRIMARY KEY (announcement_id, user_id)
            );

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }
}
