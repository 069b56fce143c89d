use anyhow::Result;
use uuid::Uuid;

use kinetic_types::models::FeedItem;
use kinetic_types::pagination::{Cursor, Direction, FeedScope, ItemKey, ItemKind};

use crate::Database;
use crate::activities::select_activities;
use crate::comments::select_comments;
use crate::posts::select_posts;

/// `WHERE` fragment and sort order for one window relative to `:cursor`.
///
/// Forward reads strictly older ids newest-first (the start sentinel 0
/// disables the bound). Backward reads strictly newer ids oldest-first;
/// callers reverse those before merging.
fn window(alias: &str, direction: Direction) -> (String, &'static str) {
    match direction {
        Direction::Forward => (format!("(:cursor = 0 OR {alias}.id < :cursor)"), "DESC"),
        Direction::Backward => (format!("{alias}.id > :cursor"), "ASC"),
    }
}

impl Database {
    /// One window of a collection, in storage order: newest-first for
    /// forward, oldest-first for backward.
    ///
    /// A cursor that names a deleted row is still a valid bound; the window
    /// simply holds fewer rows.
    pub fn query_page(
        &self,
        scope: &FeedScope,
        cursor: Cursor,
        direction: Direction,
        page_size: u32,
        viewer: Uuid,
    ) -> Result<Vec<FeedItem>> {
        let cursor = cursor.id();
        let viewer = viewer.to_string();

        self.with_conn(|conn| {
            let items = match scope {
                FeedScope::Global => {
                    let (filter, order) = window("p", direction);
                    select_posts(
                        conn,
                        &format!("WHERE {filter} ORDER BY p.id {order} LIMIT :limit"),
                        rusqlite::named_params! { ":viewer": viewer, ":cursor": cursor, ":limit": page_size },
                    )?
                    .into_iter()
                    .map(FeedItem::Post)
                    .collect()
                }
                FeedScope::UserPosts(user) => {
                    let (filter, order) = window("p", direction);
                    let user = user.to_string();
                    select_posts(
                        conn,
                        &format!("WHERE p.user_id = :scope AND {filter} ORDER BY p.id {order} LIMIT :limit"),
                        rusqlite::named_params! {
                            ":viewer": viewer, ":scope": user, ":cursor": cursor, ":limit": page_size,
                        },
                    )?
                    .into_iter()
                    .map(FeedItem::Post)
                    .collect()
                }
                FeedScope::Comments(post_id) => {
                    let (filter, order) = window("c", direction);
                    select_comments(
                        conn,
                        &format!(
                            "WHERE c.post_id = :scope AND c.parent_id IS NULL AND {filter}
                             ORDER BY c.id {order} LIMIT :limit"
                        ),
                        rusqlite::named_params! {
                            ":viewer": viewer, ":scope": post_id, ":cursor": cursor, ":limit": page_size,
                        },
                    )?
                    .into_iter()
                    .map(FeedItem::Comment)
                    .collect()
                }
                FeedScope::Replies(parent_id) => {
                    let (filter, order) = window("c", direction);
                    select_comments(
                        conn,
                        &format!("WHERE c.parent_id = :scope AND {filter} ORDER BY c.id {order} LIMIT :limit"),
                        rusqlite::named_params! {
                            ":viewer": viewer, ":scope": parent_id, ":cursor": cursor, ":limit": page_size,
                        },
                    )?
                    .into_iter()
                    .map(FeedItem::Comment)
                    .collect()
                }
                FeedScope::Notifications(user) => {
                    let (filter, order) = window("a", direction);
                    let user = user.to_string();
                    select_activities(
                        conn,
                        &format!(
                            "WHERE a.target_user_id = :scope AND a.is_notification_active = 1 AND {filter}
                             ORDER BY a.id {order} LIMIT :limit"
                        ),
                        rusqlite::named_params! { ":scope": user, ":cursor": cursor, ":limit": page_size },
                    )?
                    .into_iter()
                    .map(FeedItem::Activity)
                    .collect()
                }
            };
            Ok(items)
        })
    }

    /// Fetch a single item. Activities are only visible to their target user.
    pub fn get_item(&self, key: ItemKey, viewer: Uuid) -> Result<Option<FeedItem>> {
        Ok(match key.kind {
            ItemKind::Post => self.get_post(key.id, viewer)?.map(FeedItem::Post),
            ItemKind::Comment => self.get_comment(key.id, viewer)?.map(FeedItem::Comment),
            ItemKind::Activity => self
                .get_activity(key.id)?
                .filter(|a| a.target_user.id == viewer)
                .map(FeedItem::Activity),
        })
    }
}
