//! In-memory collaborator for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use uuid::Uuid;

use kinetic_types::api::{CreatePostRequest, LikeResponse, NewVisualMedia, UpdatePostRequest};
use kinetic_types::models::{
    Activity, ActivityType, Comment, EngagementCounts, FeedItem, MediaKind, Post, ProcessingStatus, UserSummary,
    VisualMedia,
};
use kinetic_types::pagination::{Cursor, Direction, FeedScope, ItemKey, ItemKind};

use crate::error::{FeedError, Result};
use crate::source::{CommentTarget, FeedSource, WriteApi};

pub fn viewer() -> UserSummary {
    UserSummary {
        id: Uuid::from_u128(1),
        username: "viewer".to_string(),
        name: Some("Viewer".to_string()),
        profile_photo: None,
    }
}

pub fn post(id: i64) -> Post {
    Post {
        id,
        content: Some(format!("post {id}")),
        created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        author: viewer(),
        visual_media: Vec::new(),
        is_liked: false,
        counts: EngagementCounts::default(),
    }
}

pub fn video_post(id: i64, status: ProcessingStatus) -> Post {
    Post {
        visual_media: vec![VisualMedia {
            kind: MediaKind::Video,
            url: format!("https://cdn.test/{id}.mp4"),
            file_name: Some(format!("{id}.mp4")),
            processing_status: Some(status),
        }],
        ..post(id)
    }
}

pub fn activity(id: i64) -> Activity {
    Activity {
        id,
        activity_type: ActivityType::PostLike,
        source_id: id,
        target_id: Some(1),
        source_user: UserSummary {
            id: Uuid::from_u128(2),
            username: "other".to_string(),
            name: None,
            profile_photo: None,
        },
        target_user: viewer(),
        is_read: false,
        created_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
    }
}

#[derive(Default)]
struct MemState {
    posts: Vec<Post>,
    comments: Vec<Comment>,
    activities: Vec<Activity>,
    liked: HashSet<ItemKey>,
    last_id: i64,
}

impl MemState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn bump(&mut self, id: i64) {
        self.last_id = self.last_id.max(id);
    }
}

/// Storage and write collaborator in one, with switches for failures.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemState>,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub queries: AtomicUsize,
    /// Per post content, how long `create_post` and `update_post` take.
    pub write_delays: Mutex<HashMap<String, Duration>>,
}

impl MemoryBackend {
    pub fn with_posts(ids: &[i64]) -> Arc<Self> {
        let backend = Arc::new(Self::default());
        for id in ids {
            backend.add_post(*id);
        }
        backend
    }

    pub fn add_post(&self, id: i64) {
        self.insert_post(post(id));
    }

    pub fn insert_post(&self, post: Post) {
        let mut state = self.state.lock().unwrap();
        state.bump(post.id);
        state.posts.push(post);
    }

    pub fn remove_post(&self, id: i64) {
        self.state.lock().unwrap().posts.retain(|p| p.id != id);
    }

    pub fn add_activity(&self, id: i64) {
        let mut state = self.state.lock().unwrap();
        state.bump(id);
        state.activities.push(activity(id));
    }

    pub fn set_media_status(&self, post_id: i64, status: ProcessingStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(post) = state.posts.iter_mut().find(|p| p.id == post_id) {
            for media in &mut post.visual_media {
                media.processing_status = Some(status);
            }
        }
    }

    pub fn post_ids(&self) -> Vec<i64> {
        self.state.lock().unwrap().posts.iter().map(|p| p.id).collect()
    }

    /// Sleep for the delay registered for this post content, if any.
    async fn delay_for(&self, content: Option<&str>) {
        let delay = content.and_then(|c| self.write_delays.lock().unwrap().get(c).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn check(&self, flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(FeedError::Status(500))
        } else {
            Ok(())
        }
    }
}

fn window(mut rows: Vec<FeedItem>, cursor: Cursor, direction: Direction, size: u32) -> Vec<FeedItem> {
    rows.retain(|item| match direction {
        Direction::Forward => cursor.is_start() || item.id() < cursor.id(),
        Direction::Backward => item.id() > cursor.id(),
    });
    match direction {
        Direction::Forward => rows.sort_by_key(|item| std::cmp::Reverse(item.id())),
        Direction::Backward => rows.sort_by_key(FeedItem::id),
    }
    rows.truncate(size as usize);
    rows
}

#[async_trait]
impl FeedSource for MemoryBackend {
    async fn query_page(
        &self,
        scope: &FeedScope,
        cursor: Cursor,
        direction: Direction,
        page_size: u32,
    ) -> Result<Vec<FeedItem>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.check(&self.fail_reads)?;

        let state = self.state.lock().unwrap();
        let rows: Vec<FeedItem> = match scope {
            FeedScope::Global => state.posts.iter().cloned().map(FeedItem::Post).collect(),
            FeedScope::UserPosts(user) => state
                .posts
                .iter()
                .filter(|p| p.author.id == *user)
                .cloned()
                .map(FeedItem::Post)
                .collect(),
            FeedScope::Notifications(user) => state
                .activities
                .iter()
                .filter(|a| a.target_user.id == *user)
                .cloned()
                .map(FeedItem::Activity)
                .collect(),
            FeedScope::Comments(post_id) => state
                .comments
                .iter()
                .filter(|c| c.post_id == *post_id && c.parent_id.is_none())
                .cloned()
                .map(FeedItem::Comment)
                .collect(),
            FeedScope::Replies(parent) => state
                .comments
                .iter()
                .filter(|c| c.parent_id == Some(*parent))
                .cloned()
                .map(FeedItem::Comment)
                .collect(),
        };
        Ok(window(rows, cursor, direction, page_size))
    }

    async fn get_by_id(&self, key: ItemKey) -> Result<Option<FeedItem>> {
        self.check(&self.fail_reads)?;
        let state = self.state.lock().unwrap();
        Ok(match key.kind {
            ItemKind::Post => state.posts.iter().find(|p| p.id == key.id).cloned().map(FeedItem::Post),
            ItemKind::Comment => state.comments.iter().find(|c| c.id == key.id).cloned().map(FeedItem::Comment),
            ItemKind::Activity => state
                .activities
                .iter()
                .find(|a| a.id == key.id)
                .cloned()
                .map(FeedItem::Activity),
        })
    }
}

fn stored_media(media: &[NewVisualMedia]) -> Vec<VisualMedia> {
    media
        .iter()
        .map(|m| VisualMedia {
            kind: m.kind,
            url: m.url.clone(),
            file_name: m.file_name.clone(),
            processing_status: (m.kind == MediaKind::Video).then_some(ProcessingStatus::Pending),
        })
        .collect()
}

#[async_trait]
impl WriteApi for MemoryBackend {
    async fn create_post(&self, request: &CreatePostRequest) -> Result<Post> {
        self.delay_for(request.content.as_deref()).await;
        self.check(&self.fail_writes)?;

        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        let post = Post {
            content: request.content.clone(),
            visual_media: stored_media(&request.visual_media),
            ..post(id)
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn update_post(&self, post_id: i64, request: &UpdatePostRequest) -> Result<Post> {
        self.delay_for(request.content.as_deref()).await;
        self.check(&self.fail_writes)?;

        let mut state = self.state.lock().unwrap();
        let post = state
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or(FeedError::NotFound)?;
        post.content = request.content.clone();
        post.visual_media = stored_media(&request.visual_media);
        Ok(post.clone())
    }

    async fn create_comment(&self, target: CommentTarget, content: &str) -> Result<Comment> {
        self.check(&self.fail_writes)?;
        let mut state = self.state.lock().unwrap();
        if !state.posts.iter().any(|p| p.id == target.post_id()) {
            return Err(FeedError::NotFound);
        }
        let id = state.next_id();
        let comment = Comment {
            id,
            post_id: target.post_id(),
            parent_id: target.parent_id(),
            content: content.to_string(),
            created_at: Utc::now(),
            author: viewer(),
            is_liked: false,
            counts: EngagementCounts::default(),
        };
        state.comments.push(comment.clone());
        Ok(comment)
    }

    async fn toggle_like(&self, key: ItemKey) -> Result<LikeResponse> {
        self.check(&self.fail_writes)?;
        let mut state = self.state.lock().unwrap();
        let liked = if state.liked.remove(&key) {
            false
        } else {
            state.liked.insert(key);
            true
        };

        let counts = match key.kind {
            ItemKind::Post => state.posts.iter_mut().find(|p| p.id == key.id).map(|p| &mut p.counts),
            ItemKind::Comment => state.comments.iter_mut().find(|c| c.id == key.id).map(|c| &mut c.counts),
            ItemKind::Activity => None,
        }
        .ok_or(FeedError::NotFound)?;

        if liked {
            counts.likes += 1;
        } else {
            counts.likes = counts.likes.saturating_sub(1);
        }
        Ok(LikeResponse { liked, likes: counts.likes })
    }

    async fn mark_read(&self, activity_id: i64) -> Result<Activity> {
        self.check(&self.fail_writes)?;
        let mut state = self.state.lock().unwrap();
        let activity = state
            .activities
            .iter_mut()
            .find(|a| a.id == activity_id)
            .ok_or(FeedError::NotFound)?;
        activity.is_read = true;
        Ok(activity.clone())
    }
}
