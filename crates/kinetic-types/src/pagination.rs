use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default number of items per page, shared by server and client.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound the server applies to a requested `limit`.
pub const MAX_PAGE_SIZE: u32 = 50;

/// Boundary id of the previously fetched page.
///
/// `Cursor::START` (0) means "start of collection": a forward fetch from it
/// returns the newest items, a backward fetch returns everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(i64);

impl Cursor {
    pub const START: Cursor = Cursor(0);

    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn id(self) -> i64 {
        self.0
    }

    pub fn is_start(self) -> bool {
        self.0 == 0
    }
}

impl From<i64> for Cursor {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Older items: `id < cursor`, newest first.
    #[default]
    Forward,
    /// Newer items: `id > cursor`, returned oldest first by storage.
    Backward,
}

/// Which kind of entity an id refers to. Ids are only unique per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Post,
    Comment,
    Activity,
}

/// Key of an item-detail cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemKey {
    pub kind: ItemKind,
    pub id: i64,
}

impl ItemKey {
    pub fn post(id: i64) -> Self {
        Self { kind: ItemKind::Post, id }
    }

    pub fn comment(id: i64) -> Self {
        Self { kind: ItemKind::Comment, id }
    }

    pub fn activity(id: i64) -> Self {
        Self { kind: ItemKind::Activity, id }
    }

    pub fn with_id(self, id: i64) -> Self {
        Self { kind: self.kind, id }
    }
}

/// A logical paginated collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum FeedScope {
    /// Every post in the community, newest first.
    Global,
    /// Posts authored by one user.
    UserPosts(Uuid),
    /// Activities targeted at one user.
    Notifications(Uuid),
    /// Top-level comments of a post.
    Comments(i64),
    /// Replies to a comment.
    Replies(i64),
}

impl FeedScope {
    pub fn item_kind(&self) -> ItemKind {
        match self {
            FeedScope::Global | FeedScope::UserPosts(_) => ItemKind::Post,
            FeedScope::Notifications(_) => ItemKind::Activity,
            FeedScope::Comments(_) | FeedScope::Replies(_) => ItemKind::Comment,
        }
    }
}

/// Query string accepted by every collection endpoint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub cursor: Cursor,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl PageQuery {
    pub fn clamped_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults_to_forward_from_start() {
        let q: PageQuery = serde_json::from_str("{}").unwrap();
        assert!(q.cursor.is_start());
        assert_eq!(q.direction, Direction::Forward);
        assert_eq!(q.limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn limit_is_clamped() {
        let q = PageQuery { cursor: Cursor::START, direction: Direction::Backward, limit: 500 };
        assert_eq!(q.clamped_limit(), MAX_PAGE_SIZE);
        let q = PageQuery { limit: 0, ..q };
        assert_eq!(q.clamped_limit(), 1);
    }

    #[test]
    fn scope_item_kind() {
        assert_eq!(FeedScope::Global.item_kind(), ItemKind::Post);
        assert_eq!(FeedScope::Replies(3).item_kind(), ItemKind::Comment);
        assert_eq!(FeedScope::Notifications(Uuid::nil()).item_kind(), ItemKind::Activity);
    }
}
