use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use kinetic_types::api::NewVisualMedia;
use kinetic_types::models::{ActivityType, EngagementCounts, MediaKind, Post, ProcessingStatus, VisualMedia};

use crate::Database;
use crate::activities::{deactivate_activities_for_target, record_activity, remove_activity};
use crate::models::{Ownership, Toggled, corrupt, count_at, now, timestamp, ts_at, user_at};

/// Post projection with author, counters and the viewer's like flag.
/// Every statement built on it binds `:viewer`.
const POST_SELECT: &str = "
    SELECT p.id, p.content, p.created_at,
           u.id, u.username, u.name, u.profile_photo,
           (SELECT COUNT(*) FROM post_likes l WHERE l.post_id = p.id) AS like_count,
           (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comment_count,
           EXISTS(SELECT 1 FROM post_likes l WHERE l.post_id = p.id AND l.user_id = :viewer) AS is_liked
    FROM posts p
    JOIN users u ON u.id = p.user_id";

impl Database {
    /// Insert a post and its media. Videos start out `Pending` until the
    /// transcoder reports back.
    pub fn create_post(&self, author: Uuid, content: Option<&str>, media: &[NewVisualMedia]) -> Result<Post> {
        let id = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO posts (user_id, content, created_at) VALUES (?1, ?2, ?3)",
                (author.to_string(), content, now()),
            )?;
            let id = tx.last_insert_rowid();

            for m in media {
                let status = (m.kind == MediaKind::Video).then_some(ProcessingStatus::Pending.as_str());
                tx.execute(
                    "INSERT INTO visual_media (post_id, kind, url, file_name, processing_status)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    (id, m.kind.as_str(), &m.url, m.file_name.as_deref(), status),
                )?;
            }

            tx.commit()?;
            Ok(id)
        })?;

        self.get_post(id, author)?
            .ok_or_else(|| anyhow!("post {} missing right after insert", id))
    }

    pub fn get_post(&self, id: i64, viewer: Uuid) -> Result<Option<Post>> {
        self.with_conn(|conn| {
            let viewer = viewer.to_string();
            let posts = select_posts(
                conn,
                "WHERE p.id = :id",
                rusqlite::named_params! { ":viewer": viewer, ":id": id },
            )?;
            Ok(posts.into_iter().next())
        })
    }

    /// Replace the content and media of a post owned by `user`. Media that
    /// keeps a known file name keeps its transcode status; new videos start
    /// out `Pending`.
    pub fn update_post(
        &self,
        id: i64,
        user: Uuid,
        content: Option<&str>,
        media: &[NewVisualMedia],
    ) -> Result<Ownership> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let owner: Option<String> = tx
                .query_row("SELECT user_id FROM posts WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;

            let outcome = match owner {
                None => Ownership::Missing,
                Some(owner) if owner != user.to_string() => Ownership::NotOwner,
                Some(_) => {
                    let known: HashMap<String, Option<String>> = {
                        let mut stmt = tx.prepare(
                            "SELECT file_name, processing_status FROM visual_media
                             WHERE post_id = ?1 AND file_name IS NOT NULL",
                        )?;
                        stmt.query_map([id], |r| Ok((r.get(0)?, r.get(1)?)))?
                            .collect::<std::result::Result<_, _>>()?
                    };

                    tx.execute("UPDATE posts SET content = ?1 WHERE id = ?2", (content, id))?;
                    tx.execute("DELETE FROM visual_media WHERE post_id = ?1", [id])?;
                    for m in media {
                        let status = match m.file_name.as_ref().and_then(|f| known.get(f)) {
                            Some(kept) => kept.clone(),
                            None => (m.kind == MediaKind::Video).then(|| ProcessingStatus::Pending.as_str().to_string()),
                        };
                        tx.execute(
                            "INSERT INTO visual_media (post_id, kind, url, file_name, processing_status)
                             VALUES (?1, ?2, ?3, ?4, ?5)",
                            (id, m.kind.as_str(), &m.url, m.file_name.as_deref(), status),
                        )?;
                    }
                    Ownership::Done
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Delete a post owned by `user`. Comments, likes and media cascade;
    /// notifications about the post are deactivated.
    pub fn delete_post(&self, id: i64, user: Uuid) -> Result<Ownership> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let owner: Option<String> = tx
                .query_row("SELECT user_id FROM posts WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;

            let outcome = match owner {
                None => Ownership::Missing,
                Some(owner) if owner != user.to_string() => Ownership::NotOwner,
                Some(_) => {
                    deactivate_activities_for_target(
                        &tx,
                        &[ActivityType::PostLike, ActivityType::PostMention, ActivityType::CreateComment],
                        id,
                    )?;
                    tx.execute("DELETE FROM posts WHERE id = ?1", [id])?;
                    Ownership::Done
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Like or unlike a post. `None` when the post does not exist.
    pub fn toggle_post_like(&self, post_id: i64, user: Uuid) -> Result<Option<Toggled>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let author: Option<String> = tx
                .query_row("SELECT user_id FROM posts WHERE id = ?1", [post_id], |r| r.get(0))
                .optional()?;
            let Some(author) = author else {
                return Ok(None);
            };

            let uid = user.to_string();
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM post_likes WHERE post_id = ?1 AND user_id = ?2",
                    (post_id, &uid),
                    |r| r.get(0),
                )
                .optional()?;

            let (active, activity_id) = match existing {
                Some(like_id) => {
                    tx.execute("DELETE FROM post_likes WHERE id = ?1", [like_id])?;
                    remove_activity(&tx, ActivityType::PostLike, like_id)?;
                    (false, None)
                }
                None => {
                    tx.execute(
                        "INSERT INTO post_likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                        (post_id, &uid, now()),
                    )?;
                    let like_id = tx.last_insert_rowid();
                    let activity = record_activity(&tx, ActivityType::PostLike, like_id, Some(post_id), &uid, &author)?;
                    (true, activity)
                }
            };

            let count = tx.query_row(
                "SELECT COUNT(*) FROM post_likes WHERE post_id = ?1",
                [post_id],
                |r| count_at(r, 0),
            )?;
            tx.commit()?;

            Ok(Some(Toggled { active, count, activity_id }))
        })
    }

    /// Most liked posts created at or after `since`.
    pub fn top_posts(&self, since: DateTime<Utc>, limit: u32, viewer: Uuid) -> Result<Vec<Post>> {
        self.with_conn(|conn| {
            let viewer = viewer.to_string();
            let since = timestamp(since);
            select_posts(
                conn,
                "WHERE p.created_at >= :since ORDER BY like_count DESC, p.id DESC LIMIT :limit",
                rusqlite::named_params! { ":viewer": viewer, ":since": since, ":limit": limit },
            )
        })
    }
}

/// Run `POST_SELECT` followed by `tail` and attach media to the results.
pub(crate) fn select_posts(conn: &Connection, tail: &str, params: &[(&str, &dyn ToSql)]) -> Result<Vec<Post>> {
    let sql = format!("{POST_SELECT} {tail}");
    let mut stmt = conn.prepare(&sql)?;
    let mut posts = stmt
        .query_map(params, post_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    attach_media(conn, &mut posts)?;
    Ok(posts)
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        content: row.get(1)?,
        created_at: ts_at(row, 2)?,
        author: user_at(row, 3)?,
        visual_media: Vec::new(),
        counts: EngagementCounts {
            likes: count_at(row, 7)?,
            comments: count_at(row, 8)?,
        },
        is_liked: row.get(9)?,
    })
}

/// Batch-load media for a set of posts in one query.
fn attach_media(conn: &Connection, posts: &mut [Post]) -> Result<()> {
    if posts.is_empty() {
        return Ok(());
    }

    let placeholders: Vec<String> = (1..=posts.len()).map(|i| format!("?{}", i)).collect();
    let sql = format!(
        "SELECT post_id, kind, url, file_name, processing_status
         FROM visual_media WHERE post_id IN ({}) ORDER BY id",
        placeholders.join(", ")
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params_from_iter(posts.iter().map(|p| p.id)), |row| {
            Ok((row.get::<_, i64>(0)?, media_from_row(row)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut by_post: HashMap<i64, Vec<VisualMedia>> = HashMap::new();
    for (post_id, media) in rows {
        by_post.entry(post_id).or_default().push(media);
    }
    for post in posts.iter_mut() {
        post.visual_media = by_post.remove(&post.id).unwrap_or_default();
    }
    Ok(())
}

/// Reads `kind, url, file_name, processing_status` starting at column 1.
pub(crate) fn media_from_row(row: &Row<'_>) -> rusqlite::Result<VisualMedia> {
    let kind: String = row.get(1)?;
    let status: Option<String> = row.get(4)?;
    let processing_status = match status {
        Some(s) => Some(ProcessingStatus::parse(&s).ok_or_else(|| corrupt(4, "processing status", &s))?),
        None => None,
    };

    Ok(VisualMedia {
        kind: MediaKind::parse(&kind).ok_or_else(|| corrupt(1, "media kind", &kind))?,
        url: row.get(2)?,
        file_name: row.get(3)?,
        processing_status,
    })
}
