//! Collaborator interfaces the client core is written against.

use async_trait::async_trait;

use kinetic_types::api::{CreatePostRequest, LikeResponse, UpdatePostRequest};
use kinetic_types::models::{Activity, Comment, FeedItem, Post};
use kinetic_types::pagination::{Cursor, Direction, FeedScope, ItemKey};

use crate::error::Result;

/// Read side of storage.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// One window in storage order: newest-first for `Forward`, oldest-first
    /// for `Backward`.
    async fn query_page(
        &self,
        scope: &FeedScope,
        cursor: Cursor,
        direction: Direction,
        page_size: u32,
    ) -> Result<Vec<FeedItem>>;

    async fn get_by_id(&self, key: ItemKey) -> Result<Option<FeedItem>>;
}

/// Where a new comment goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentTarget {
    Post { post_id: i64 },
    Reply { post_id: i64, parent_id: i64 },
}

impl CommentTarget {
    pub fn post_id(self) -> i64 {
        match self {
            CommentTarget::Post { post_id } | CommentTarget::Reply { post_id, .. } => post_id,
        }
    }

    pub fn parent_id(self) -> Option<i64> {
        match self {
            CommentTarget::Post { .. } => None,
            CommentTarget::Reply { parent_id, .. } => Some(parent_id),
        }
    }

    /// The collection the comment is listed in.
    pub fn scope(self) -> FeedScope {
        match self {
            CommentTarget::Post { post_id } => FeedScope::Comments(post_id),
            CommentTarget::Reply { parent_id, .. } => FeedScope::Replies(parent_id),
        }
    }
}

/// Write side. Each call returns the authoritative entity.
#[async_trait]
pub trait WriteApi: Send + Sync {
    async fn create_post(&self, request: &CreatePostRequest) -> Result<Post>;

    async fn update_post(&self, post_id: i64, request: &UpdatePostRequest) -> Result<Post>;

    async fn create_comment(&self, target: CommentTarget, content: &str) -> Result<Comment>;

    async fn toggle_like(&self, key: ItemKey) -> Result<LikeResponse>;

    async fn mark_read(&self, activity_id: i64) -> Result<Activity>;
}
