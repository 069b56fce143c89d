use anyhow::Result;
use uuid::Uuid;

use crate::Database;
use crate::models::{SubscriptionRow, now};

impl Database {
    /// Register a device. The endpoint is unique: re-subscribing moves it to
    /// `user` and replaces its keys.
    pub fn upsert_subscription(&self, endpoint: &str, user: Uuid, p256dh: &str, auth: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO push_subscriptions (endpoint, user_id, p256dh, auth, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(endpoint) DO UPDATE SET
                    user_id = excluded.user_id,
                    p256dh = excluded.p256dh,
                    auth = excluded.auth",
                (endpoint, user.to_string(), p256dh, auth, now()),
            )?;
            Ok(())
        })
    }

    /// Remove a subscription the push service reported as gone.
    pub fn delete_subscription(&self, endpoint: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute("DELETE FROM push_subscriptions WHERE endpoint = ?1", [endpoint])?;
            Ok(n > 0)
        })
    }

    /// Remove a subscription on behalf of its owner.
    pub fn delete_user_subscription(&self, endpoint: &str, user: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let n = conn.execute(
                "DELETE FROM push_subscriptions WHERE endpoint = ?1 AND user_id = ?2",
                (endpoint, user.to_string()),
            )?;
            Ok(n > 0)
        })
    }

    pub fn subscriptions_for_user(&self, user: Uuid) -> Result<Vec<SubscriptionRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT endpoint, user_id, p256dh, auth FROM push_subscriptions WHERE user_id = ?1",
            )?;
            let rows = stmt
                .query_map([user.to_string()], |row| {
                    Ok(SubscriptionRow {
                        endpoint: row.get(0)?,
                        user_id: row.get(1)?,
                        p256dh: row.get(2)?,
                        auth: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::{db, user};

    #[test]
    fn resubscribe_moves_endpoint_to_last_writer() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        db.upsert_subscription("https://push/1", alice, "k1", "a1").unwrap();
        db.upsert_subscription("https://push/1", bob, "k2", "a2").unwrap();

        assert!(db.subscriptions_for_user(alice).unwrap().is_empty());
        let subs = db.subscriptions_for_user(bob).unwrap();
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].p256dh, "k2");
        assert_eq!(subs[0].auth, "a2");
    }

    #[test]
    fn owner_scoped_delete() {
        let db = db();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        db.upsert_subscription("https://push/1", alice, "k", "a").unwrap();

        assert!(!db.delete_user_subscription("https://push/1", bob).unwrap());
        assert!(db.delete_user_subscription("https://push/1", alice).unwrap());
        assert!(!db.delete_subscription("https://push/1").unwrap());
    }
}
