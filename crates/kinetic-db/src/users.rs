use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use uuid::Uuid;

use kinetic_types::api::TopUser;
use kinetic_types::models::{ActivityType, UserSummary};

use crate::Database;
use crate::activities::{record_activity, remove_activity};
use crate::models::{Toggled, count_at, now, user_at};

impl Database {
    pub fn create_user(&self, id: Uuid, username: &str, name: Option<&str>) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                (id.to_string(), username, name, now()),
            )?;
            Ok(())
        })
    }

    /// Materialize the session user on first sight. Existing rows are left alone.
    pub fn ensure_user(&self, id: Uuid, username: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO users (id, username, created_at) VALUES (?1, ?2, ?3)",
                (id.to_string(), username, now()),
            )?;
            Ok(())
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<UserSummary>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Follow or unfollow `target`. `None` when the target does not exist.
    pub fn toggle_follow(&self, follower: Uuid, target: Uuid) -> Result<Option<Toggled>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            if query_user(&tx, target)?.is_none() {
                return Ok(None);
            }

            let (fid, tid) = (follower.to_string(), target.to_string());
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM follows WHERE follower_id = ?1 AND following_id = ?2",
                    (&fid, &tid),
                    |r| r.get(0),
                )
                .optional()?;

            let (active, activity_id) = match existing {
                Some(follow_id) => {
                    tx.execute("DELETE FROM follows WHERE id = ?1", [follow_id])?;
                    remove_activity(&tx, ActivityType::CreateFollow, follow_id)?;
                    (false, None)
                }
                None => {
                    tx.execute(
                        "INSERT INTO follows (follower_id, following_id, created_at) VALUES (?1, ?2, ?3)",
                        (&fid, &tid, now()),
                    )?;
                    let follow_id = tx.last_insert_rowid();
                    (true, record_activity(&tx, ActivityType::CreateFollow, follow_id, None, &fid, &tid)?)
                }
            };

            let count = tx.query_row(
                "SELECT COUNT(*) FROM follows WHERE following_id = ?1",
                [&tid],
                |r| count_at(r, 0),
            )?;
            tx.commit()?;

            Ok(Some(Toggled { active, count, activity_id }))
        })
    }

    /// Users ranked by number of posts.
    pub fn top_users(&self, limit: u32) -> Result<Vec<TopUser>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.username, u.name, u.profile_photo, COUNT(p.id) AS post_count
                 FROM users u
                 LEFT JOIN posts p ON p.user_id = u.id
                 GROUP BY u.id
                 ORDER BY post_count DESC, u.username ASC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map([limit], |row| {
                    Ok(TopUser {
                        user: user_at(row, 0)?,
                        post_count: count_at(row, 4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

pub(crate) fn query_user(conn: &Connection, id: Uuid) -> Result<Option<UserSummary>> {
    let user = conn
        .query_row(
            "SELECT id, username, name, profile_photo FROM users WHERE id = ?1",
            [id.to_string()],
            |row| user_at(row, 0),
        )
        .optional()?;
    Ok(user)
}
