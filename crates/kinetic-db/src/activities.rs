use anyhow::Result;
use rusqlite::types::ToSql;
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use kinetic_types::models::{Activity, ActivityType};

use crate::Database;
use crate::models::{corrupt, count_at, now, ts_at, user_at};

const ACTIVITY_SELECT: &str = "
    SELECT a.id, a.type, a.source_id, a.target_id, a.is_notification_read, a.created_at,
           su.id, su.username, su.name, su.profile_photo,
           tu.id, tu.username, tu.name, tu.profile_photo
    FROM activities a
    JOIN users su ON su.id = a.source_user_id
    JOIN users tu ON tu.id = a.target_user_id";

impl Database {
    pub fn get_activity(&self, id: i64) -> Result<Option<Activity>> {
        self.with_conn(|conn| query_activity(conn, id))
    }

    /// The activity, unless it was deactivated (its subject was deleted).
    pub fn get_active_activity(&self, id: i64) -> Result<Option<Activity>> {
        self.with_conn(|conn| {
            let rows = select_activities(
                conn,
                "WHERE a.id = :id AND a.is_notification_active = 1",
                rusqlite::named_params! { ":id": id },
            )?;
            Ok(rows.into_iter().next())
        })
    }

    /// Mark one of `user`'s notifications as read. `None` when the activity
    /// does not exist or belongs to someone else.
    pub fn mark_activity_read(&self, id: i64, user: Uuid) -> Result<Option<Activity>> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE activities SET is_notification_read = 1 WHERE id = ?1 AND target_user_id = ?2",
                (id, user.to_string()),
            )?;
            if updated == 0 {
                return Ok(None);
            }
            query_activity(conn, id)
        })
    }

    pub fn mark_all_read(&self, user: Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| {
            let updated = conn.execute(
                "UPDATE activities SET is_notification_read = 1
                 WHERE target_user_id = ?1 AND is_notification_read = 0 AND is_notification_active = 1",
                [user.to_string()],
            )?;
            Ok(updated)
        })
    }

    pub fn unread_count(&self, user: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let n = conn.query_row(
                "SELECT COUNT(*) FROM activities
                 WHERE target_user_id = ?1 AND is_notification_read = 0 AND is_notification_active = 1",
                [user.to_string()],
                |r| count_at(r, 0),
            )?;
            Ok(n)
        })
    }

    /// Text the notification is about: the post for post-level activities,
    /// the comment or reply otherwise.
    pub fn activity_content(&self, activity: &Activity) -> Result<Option<String>> {
        let lookup = match activity.activity_type {
            ActivityType::PostLike | ActivityType::PostMention | ActivityType::CreateComment => {
                activity.target_id.map(|id| ("SELECT content FROM posts WHERE id = ?1", id))
            }
            ActivityType::CommentLike | ActivityType::ReplyLike => {
                activity.target_id.map(|id| ("SELECT content FROM comments WHERE id = ?1", id))
            }
            ActivityType::CommentMention | ActivityType::CreateReply | ActivityType::ReplyMention => {
                Some(("SELECT content FROM comments WHERE id = ?1", activity.source_id))
            }
            ActivityType::CreateFollow => None,
        };

        let Some((sql, id)) = lookup else {
            return Ok(None);
        };

        self.with_conn(|conn| {
            let content: Option<Option<String>> = conn.query_row(sql, [id], |r| r.get(0)).optional()?;
            Ok(content.flatten().filter(|c| !c.is_empty()))
        })
    }
}

/// Record a notification for `target_user`. Self-notifications are skipped.
pub(crate) fn record_activity(
    conn: &Connection,
    activity_type: ActivityType,
    source_id: i64,
    target_id: Option<i64>,
    source_user: &str,
    target_user: &str,
) -> Result<Option<i64>> {
    if source_user == target_user {
        return Ok(None);
    }

    conn.execute(
        "INSERT INTO activities (type, source_id, target_id, source_user_id, target_user_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        (activity_type.as_str(), source_id, target_id, source_user, target_user, now()),
    )?;
    Ok(Some(conn.last_insert_rowid()))
}

/// Drop the activity produced by a source row that no longer exists (unlike, unfollow).
pub(crate) fn remove_activity(conn: &Connection, activity_type: ActivityType, source_id: i64) -> Result<()> {
    conn.execute(
        "DELETE FROM activities WHERE type = ?1 AND source_id = ?2",
        (activity_type.as_str(), source_id),
    )?;
    Ok(())
}

pub(crate) fn deactivate_activities_for_target(
    conn: &Connection,
    types: &[ActivityType],
    target_id: i64,
) -> Result<()> {
    for t in types {
        conn.execute(
            "UPDATE activities SET is_notification_active = 0 WHERE type = ?1 AND target_id = ?2",
            (t.as_str(), target_id),
        )?;
    }
    Ok(())
}

pub(crate) fn select_activities(conn: &Connection, tail: &str, params: &[(&str, &dyn ToSql)]) -> Result<Vec<Activity>> {
    let sql = format!("{ACTIVITY_SELECT} {tail}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, activity_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn query_activity(conn: &Connection, id: i64) -> Result<Option<Activity>> {
    let rows = select_activities(conn, "WHERE a.id = :id", rusqlite::named_params! { ":id": id })?;
    Ok(rows.into_iter().next())
}

fn activity_from_row(row: &Row<'_>) -> rusqlite::Result<Activity> {
    let raw_type: String = row.get(1)?;
    Ok(Activity {
        id: row.get(0)?,
        activity_type: ActivityType::parse(&raw_type).ok_or_else(|| corrupt(1, "activity type", &raw_type))?,
        source_id: row.get(2)?,
        target_id: row.get(3)?,
        is_read: row.get(4)?,
        created_at: ts_at(row, 5)?,
        source_user: user_at(row, 6)?,
        target_user: user_at(row, 10)?,
    })
}

#[cfg(test)]
mod tests {
    use kinetic_types::models::ActivityType;

    use crate::testing::{db, post, user};

    #[test]
    fn mark_read_is_scoped_to_target_user() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let id = post(&db, alice, "hi");
        let activity = db.toggle_post_like(id, bob).unwrap().unwrap().activity_id.unwrap();

        assert!(db.mark_activity_read(activity, bob).unwrap().is_none());
        let read = db.mark_activity_read(activity, alice).unwrap().unwrap();
        assert!(read.is_read);
        assert_eq!(read.activity_type, ActivityType::PostLike);
        assert_eq!(read.source_user.username, "bob");
        assert_eq!(db.unread_count(alice).unwrap(), 0);
    }

    #[test]
    fn deleting_post_deactivates_its_notifications() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let id = post(&db, alice, "hi");
        let activity = db.toggle_post_like(id, bob).unwrap().unwrap().activity_id.unwrap();
        assert!(db.get_active_activity(activity).unwrap().is_some());

        db.delete_post(id, alice).unwrap();
        assert!(db.get_active_activity(activity).unwrap().is_none());
        assert_eq!(db.unread_count(alice).unwrap(), 0);
    }

    #[test]
    fn mark_all_read_counts_only_unread() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        let id = post(&db, alice, "hi");
        db.toggle_post_like(id, bob).unwrap();
        db.toggle_post_like(id, carol).unwrap();

        assert_eq!(db.mark_all_read(alice).unwrap(), 2);
        assert_eq!(db.mark_all_read(alice).unwrap(), 0);
    }

    #[test]
    fn content_lookup_follows_activity_type() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let id = post(&db, alice, "the post body");

        let like = db.toggle_post_like(id, bob).unwrap().unwrap().activity_id.unwrap();
        let like = db.get_activity(like).unwrap().unwrap();
        assert_eq!(db.activity_content(&like).unwrap().as_deref(), Some("the post body"));

        let comment = db.create_comment(id, alice, "own comment").unwrap().unwrap();
        let reply = db.create_reply(comment.item.id, bob, "a reply").unwrap().unwrap();
        let reply_activity = db.get_activity(reply.activity_id.unwrap()).unwrap().unwrap();
        assert_eq!(reply_activity.activity_type, ActivityType::CreateReply);
        assert_eq!(db.activity_content(&reply_activity).unwrap().as_deref(), Some("a reply"));
    }
}
