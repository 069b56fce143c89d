use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, Row};
use uuid::Uuid;

use kinetic_types::models::Announcement;

use crate::Database;
use crate::models::{now, ts_at, user_at};

const ANNOUNCEMENT_SELECT: &str = "
    SELECT a.id, a.title, a.content, a.created_at,
           u.id, u.username, u.name, u.profile_photo
    FROM announcements a
    JOIN users u ON u.id = a.user_id";

impl Database {
    /// Publishing is an admin action outside this server; this exists for
    /// seeding and tooling.
    pub fn create_announcement(&self, author: Uuid, title: &str, content: &str) -> Result<Announcement> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO announcements (user_id, title, content, created_at) VALUES (?1, ?2, ?3, ?4)",
                (author.to_string(), title, content, now()),
            )?;
            let id = conn.last_insert_rowid();
            query_announcement(conn, id)?.ok_or_else(|| anyhow!("announcement {} missing right after insert", id))
        })
    }

    /// Newest announcements `viewer` has not dismissed.
    pub fn announcements_for(&self, viewer: Uuid, limit: u32) -> Result<Vec<Announcement>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{ANNOUNCEMENT_SELECT}
                 WHERE NOT EXISTS (
                     SELECT 1 FROM announcement_dismissals d
                     WHERE d.announcement_id = a.id AND d.user_id = :viewer
                 )
                 ORDER BY a.id DESC LIMIT :limit"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(
                    rusqlite::named_params! { ":viewer": viewer.to_string(), ":limit": limit },
                    announcement_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Hide an announcement for `user`. Dismissing twice is a no-op;
    /// `false` when the announcement does not exist.
    pub fn dismiss_announcement(&self, id: i64, user: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let exists = tx
                .query_row("SELECT 1 FROM announcements WHERE id = ?1", [id], |_| Ok(()))
                .optional()?
                .is_some();
            if exists {
                tx.execute(
                    "INSERT OR IGNORE INTO announcement_dismissals (announcement_id, user_id, created_at)
                     VALUES (?1, ?2, ?3)",
                    (id, user.to_string(), now()),
                )?;
            }
            tx.commit()?;
            Ok(exists)
        })
    }
}

fn query_announcement(conn: &Connection, id: i64) -> Result<Option<Announcement>> {
    let sql = format!("{ANNOUNCEMENT_SELECT} WHERE a.id = ?1");
    Ok(conn.query_row(&sql, [id], announcement_from_row).optional()?)
}

fn announcement_from_row(row: &Row<'_>) -> rusqlite::Result<Announcement> {
    Ok(Announcement {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        created_at: ts_at(row, 3)?,
        created_by: user_at(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use crate::testing::{db, user};

    #[test]
    fn dismissed_announcements_are_hidden_per_user() {
        let db = db();
        let admin = user(&db, "admin");
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        let old = db.create_announcement(admin, "Maintenance", "Down at noon").unwrap();
        let new = db.create_announcement(admin, "Welcome", "Say hi").unwrap();
        assert_eq!(new.created_by.username, "admin");

        let ids = |viewer: uuid::Uuid| -> Vec<i64> {
            db.announcements_for(viewer, 10).unwrap().iter().map(|a| a.id).collect()
        };
        assert_eq!(ids(alice), vec![new.id, old.id]);

        assert!(db.dismiss_announcement(new.id, alice).unwrap());
        assert!(db.dismiss_announcement(new.id, alice).unwrap());
        assert_eq!(ids(alice), vec![old.id]);
        assert_eq!(ids(bob), vec![new.id, old.id]);
    }

    #[test]
    fn listing_is_capped_and_missing_ids_are_reported() {
        let db = db();
        let admin = user(&db, "admin");
        for i in 0..12 {
            db.create_announcement(admin, &format!("n{i}"), "body").unwrap();
        }

        let listed = db.announcements_for(admin, 10).unwrap();
        assert_eq!(listed.len(), 10);
        assert_eq!(listed[0].title, "n11");
        assert!(!db.dismiss_announcement(999, admin).unwrap());
    }
}
