use anyhow::{Result, anyhow};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use kinetic_types::models::{ActivityType, Comment, EngagementCounts};

use crate::Database;
use crate::activities::{record_activity, remove_activity};
use crate::models::{Created, Toggled, count_at, now, ts_at, user_at};

/// Comment projection; binds `:viewer` like the post projection.
const COMMENT_SELECT: &str = "
    SELECT c.id, c.post_id, c.parent_id, c.content, c.created_at,
           u.id, u.username, u.name, u.profile_photo,
           (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS like_count,
           (SELECT COUNT(*) FROM comments r WHERE r.parent_id = c.id) AS reply_count,
           EXISTS(SELECT 1 FROM comment_likes l WHERE l.comment_id = c.id AND l.user_id = :viewer) AS is_liked
    FROM comments c
    JOIN users u ON u.id = c.user_id";

impl Database {
    /// Top-level comment on a post. Notifies the post author.
    /// `None` when the post does not exist.
    pub fn create_comment(&self, post_id: i64, author: Uuid, content: &str) -> Result<Option<Created<Comment>>> {
        let created = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let post_author: Option<String> = tx
                .query_row("SELECT user_id FROM posts WHERE id = ?1", [post_id], |r| r.get(0))
                .optional()?;
            let Some(post_author) = post_author else {
                return Ok(None);
            };

            let uid = author.to_string();
            let id = insert_comment(&tx, post_id, None, &uid, content)?;
            let activity_id =
                record_activity(&tx, ActivityType::CreateComment, id, Some(post_id), &uid, &post_author)?;
            tx.commit()?;
            Ok(Some((id, activity_id)))
        })?;

        self.hydrate_created(created, author)
    }

    /// Reply to a comment. Notifies the parent comment's author.
    /// `None` when the parent does not exist.
    pub fn create_reply(&self, parent_id: i64, author: Uuid, content: &str) -> Result<Option<Created<Comment>>> {
        let created = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let parent: Option<(i64, String)> = tx
                .query_row(
                    "SELECT post_id, user_id FROM comments WHERE id = ?1",
                    [parent_id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let Some((post_id, parent_author)) = parent else {
                return Ok(None);
            };

            let uid = author.to_string();
            let id = insert_comment(&tx, post_id, Some(parent_id), &uid, content)?;
            let activity_id =
                record_activity(&tx, ActivityType::CreateReply, id, Some(parent_id), &uid, &parent_author)?;
            tx.commit()?;
            Ok(Some((id, activity_id)))
        })?;

        self.hydrate_created(created, author)
    }

    pub fn get_comment(&self, id: i64, viewer: Uuid) -> Result<Option<Comment>> {
        self.with_conn(|conn| {
            let viewer = viewer.to_string();
            let rows = select_comments(conn, "WHERE c.id = :id", rusqlite::named_params! { ":viewer": viewer, ":id": id })?;
            Ok(rows.into_iter().next())
        })
    }

    /// Like or unlike a comment or reply. `None` when it does not exist.
    pub fn toggle_comment_like(&self, comment_id: i64, user: Uuid) -> Result<Option<Toggled>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let comment: Option<(String, Option<i64>)> = tx
                .query_row(
                    "SELECT user_id, parent_id FROM comments WHERE id = ?1",
                    [comment_id],
                    |r| Ok((r.get(0)?, r.get(1)?)),
                )
                .optional()?;
            let Some((author, parent_id)) = comment else {
                return Ok(None);
            };
            let activity_type = if parent_id.is_some() {
                ActivityType::ReplyLike
            } else {
                ActivityType::CommentLike
            };

            let uid = user.to_string();
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
                    (comment_id, &uid),
                    |r| r.get(0),
                )
                .optional()?;

            let (active, activity_id) = match existing {
                Some(like_id) => {
                    tx.execute("DELETE FROM comment_likes WHERE id = ?1", [like_id])?;
                    remove_activity(&tx, activity_type, like_id)?;
                    (false, None)
                }
                None => {
                    tx.execute(
                        "INSERT INTO comment_likes (comment_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                        (comment_id, &uid, now()),
                    )?;
                    let like_id = tx.last_insert_rowid();
                    (true, record_activity(&tx, activity_type, like_id, Some(comment_id), &uid, &author)?)
                }
            };

            let count = tx.query_row(
                "SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?1",
                [comment_id],
                |r| count_at(r, 0),
            )?;
            tx.commit()?;

            Ok(Some(Toggled { active, count, activity_id }))
        })
    }

    fn hydrate_created(&self, created: Option<(i64, Option<i64>)>, viewer: Uuid) -> Result<Option<Created<Comment>>> {
        let Some((id, activity_id)) = created else {
            return Ok(None);
        };
        let item = self
            .get_comment(id, viewer)?
            .ok_or_else(|| anyhow!("comment {} missing right after insert", id))?;
        Ok(Some(Created { item, activity_id }))
    }
}

fn insert_comment(conn: &Connection, post_id: i64, parent_id: Option<i64>, author: &str, content: &str) -> Result<i64> {
    conn.execute(
        "INSERT INTO comments (post_id, parent_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        (post_id, parent_id, author, content, now()),
    )?;
    Ok(conn.last_insert_rowid())
}

pub(crate) fn select_comments(conn: &Connection, tail: &str, params: &[(&str, &dyn ToSql)]) -> Result<Vec<Comment>> {
    let sql = format!("{COMMENT_SELECT} {tail}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, comment_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        post_id: row.get(1)?,
        parent_id: row.get(2)?,
        content: row.get(3)?,
        created_at: ts_at(row, 4)?,
        author: user_at(row, 5)?,
        counts: EngagementCounts {
            likes: count_at(row, 9)?,
            comments: count_at(row, 10)?,
        },
        is_liked: row.get(11)?,
    })
}
