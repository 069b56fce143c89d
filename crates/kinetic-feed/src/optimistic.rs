//! Optimistic mutations.
//!
//! Every mutation edits the cache synchronously, dispatches exactly one
//! write, then either reconciles with the authoritative entity or undoes
//! its own edit. Reconciliation is a positional replace; lists are never
//! re-sorted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kinetic_types::api::{CreatePostRequest, LikeResponse, NewVisualMedia};
use kinetic_types::models::{
    Activity, Comment, EngagementCounts, FeedItem, MediaKind, Post, ProcessingStatus, UserSummary, VisualMedia,
};
use kinetic_types::pagination::{FeedScope, ItemKey, ItemKind};

use crate::cache::FeedCache;
use crate::error::{FeedError, Result};
use crate::preview::{PreviewHandle, PreviewRegistry};
use crate::source::{CommentTarget, WriteApi};

/// Media attached to a new post. `url` is where the upload landed.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftMedia {
    pub kind: MediaKind,
    pub url: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostDraft {
    pub content: Option<String>,
    pub media: Vec<DraftMedia>,
}

impl PostDraft {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            media: Vec::new(),
        }
    }

    fn request(&self) -> CreatePostRequest {
        CreatePostRequest {
            content: self.content.clone(),
            visual_media: self
                .media
                .iter()
                .map(|m| NewVisualMedia {
                    kind: m.kind,
                    url: m.url.clone(),
                    file_name: m.file_name.clone(),
                })
                .collect(),
        }
    }
}

/// What a like toggle changed, so failure can undo exactly that.
#[derive(Debug, Clone, Copy)]
struct LikeDelta {
    was_liked: bool,
    /// False when an unlike found the counter already at zero.
    counted: bool,
}

fn apply_like(item: &mut FeedItem) -> Option<LikeDelta> {
    let liked = item.is_liked_mut()?;
    let was_liked = *liked;
    *liked = !was_liked;

    let counts = item.counts_mut()?;
    let counted = if was_liked {
        let had_likes = counts.likes > 0;
        counts.likes = counts.likes.saturating_sub(1);
        had_likes
    } else {
        counts.likes += 1;
        true
    };
    Some(LikeDelta { was_liked, counted })
}

fn revert_like(item: &mut FeedItem, delta: LikeDelta) {
    if let Some(liked) = item.is_liked_mut() {
        *liked = delta.was_liked;
    }
    if let (true, Some(counts)) = (delta.counted, item.counts_mut()) {
        if delta.was_liked {
            counts.likes += 1;
        } else {
            counts.likes = counts.likes.saturating_sub(1);
        }
    }
}

/// Marks an item as having a write in flight; cleared on drop.
struct InFlight {
    keys: Arc<Mutex<HashSet<ItemKey>>>,
    key: ItemKey,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[derive(Clone)]
pub struct OptimisticCoordinator {
    writes: Arc<dyn WriteApi>,
    cache: FeedCache,
    previews: PreviewRegistry,
    viewer: UserSummary,
    session: CancellationToken,
    in_flight: Arc<Mutex<HashSet<ItemKey>>>,
    next_synthetic: Arc<AtomicI64>,
}

impl OptimisticCoordinator {
    /// `session` is cancelled on logout; mutations are refused afterwards.
    pub fn new(writes: Arc<dyn WriteApi>, cache: FeedCache, viewer: UserSummary, session: CancellationToken) -> Self {
        Self {
            writes,
            cache,
            previews: PreviewRegistry::new(),
            viewer,
            session,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            next_synthetic: Arc::new(AtomicI64::new(-1)),
        }
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn is_in_flight(&self, key: ItemKey) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }

    fn begin(&self, key: ItemKey) -> Result<InFlight> {
        if self.session.is_cancelled() {
            return Err(FeedError::Unauthorized);
        }
        let mut keys = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key) {
            return Err(FeedError::Busy);
        }
        Ok(InFlight {
            keys: self.in_flight.clone(),
            key,
        })
    }

    /// Draft media as shown before the write settles: local previews in
    /// place of uploads, videos pending.
    fn preview_media(&self, draft: &PostDraft) -> (Vec<PreviewHandle>, Vec<VisualMedia>) {
        let previews: Vec<PreviewHandle> = draft.media.iter().map(|_| self.previews.register()).collect();
        let media = draft
            .media
            .iter()
            .zip(&previews)
            .map(|(media, preview)| VisualMedia {
                kind: media.kind,
                url: preview.url(),
                file_name: media.file_name.clone(),
                processing_status: (media.kind == MediaKind::Video).then_some(ProcessingStatus::Pending),
            })
            .collect();
        (previews, media)
    }

    fn release_previews(&self, previews: Vec<PreviewHandle>) {
        for preview in previews {
            self.previews.release(preview);
        }
    }

    /// Ids count down from -1 so they can never collide with server ids.
    fn synthetic_id(&self) -> i64 {
        self.next_synthetic.fetch_sub(1, Ordering::SeqCst)
    }

    /// Show the post at the head of the global and own-posts lists, then
    /// create it. Media is shown through local previews until the post is
    /// confirmed; videos show as pending.
    pub async fn create_post(&self, draft: PostDraft) -> Result<Post> {
        let id = self.synthetic_id();
        let key = ItemKey::post(id);
        let _in_flight = self.begin(key)?;

        let (previews, visual_media) = self.preview_media(&draft);
        let optimistic = Post {
            id,
            content: draft.content.clone(),
            created_at: Utc::now(),
            author: self.viewer.clone(),
            visual_media,
            is_liked: false,
            counts: EngagementCounts::default(),
        };

        let scopes = [FeedScope::Global, FeedScope::UserPosts(self.viewer.id)];
        self.cache.update(|state| {
            state.details.insert(key, FeedItem::Post(optimistic));
            for scope in scopes {
                state.insert_head(scope, id);
            }
        });
        debug!("Optimistic post {} inserted", id);

        let result = self.writes.create_post(&draft.request()).await;
        self.release_previews(previews);

        match result {
            Ok(post) => {
                let item = FeedItem::Post(post.clone());
                self.cache.update(|state| state.replace_id(ItemKind::Post, id, post.id, item));
                debug!("Optimistic post {} confirmed as {}", id, post.id);
                Ok(post)
            }
            Err(e) => {
                self.cache.update(|state| state.remove_item(key));
                warn!("Creating post failed, rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Edit a post in place. The cached entry shows the new content and
    /// media at once and keeps its position in every list; failure puts the
    /// previous entry back.
    pub async fn update_post(&self, post_id: i64, draft: PostDraft) -> Result<Post> {
        let key = ItemKey::post(post_id);
        let _in_flight = self.begin(key)?;
        if post_id <= 0 {
            return Err(FeedError::NotFound);
        }

        let (previews, visual_media) = self.preview_media(&draft);
        let previous = self.cache.update(|state| match state.details.get_mut(&key) {
            Some(FeedItem::Post(post)) => {
                let before = post.clone();
                post.content = draft.content.clone();
                post.visual_media = visual_media;
                Some(before)
            }
            _ => None,
        });

        let result = self.writes.update_post(post_id, &draft.request()).await;
        self.release_previews(previews);

        match result {
            Ok(post) => {
                let item = FeedItem::Post(post.clone());
                self.cache.update(|state| {
                    if let Some(slot) = state.details.get_mut(&key) {
                        *slot = item;
                    }
                });
                debug!("Edit of post {} confirmed", post_id);
                Ok(post)
            }
            Err(e) => {
                if let Some(before) = previous {
                    self.cache.update(|state| {
                        if let Some(slot) = state.details.get_mut(&key) {
                            *slot = FeedItem::Post(before);
                        }
                    });
                }
                warn!("Editing post {} failed, rolled back: {}", post_id, e);
                Err(e)
            }
        }
    }

    /// Comment on a post or reply to a comment. The post's comment counter
    /// (and the parent's reply counter) move with the optimistic entry.
    pub async fn create_comment(&self, target: CommentTarget, content: &str) -> Result<Comment> {
        let id = self.synthetic_id();
        let key = ItemKey::comment(id);
        let _in_flight = self.begin(key)?;

        let optimistic = Comment {
            id,
            post_id: target.post_id(),
            parent_id: target.parent_id(),
            content: content.to_string(),
            created_at: Utc::now(),
            author: self.viewer.clone(),
            is_liked: false,
            counts: EngagementCounts::default(),
        };
        let owners = [
            Some(ItemKey::post(target.post_id())),
            target.parent_id().map(ItemKey::comment),
        ];

        let bumped: Vec<ItemKey> = self.cache.update(|state| {
            state.details.insert(key, FeedItem::Comment(optimistic));
            state.insert_head(target.scope(), id);

            owners
                .into_iter()
                .flatten()
                .filter(|owner| {
                    match state.details.get_mut(owner).and_then(FeedItem::counts_mut) {
                        Some(counts) => {
                            counts.comments += 1;
                            true
                        }
                        None => false,
                    }
                })
                .collect()
        });

        match self.writes.create_comment(target, content).await {
            Ok(comment) => {
                let item = FeedItem::Comment(comment.clone());
                self.cache.update(|state| state.replace_id(ItemKind::Comment, id, comment.id, item));
                Ok(comment)
            }
            Err(e) => {
                self.cache.update(|state| {
                    state.remove_item(key);
                    for owner in &bumped {
                        if let Some(counts) = state.details.get_mut(owner).and_then(FeedItem::counts_mut) {
                            counts.comments = counts.comments.saturating_sub(1);
                        }
                    }
                });
                warn!("Creating comment failed, rolled back: {}", e);
                Err(e)
            }
        }
    }

    /// Flip the like state of a post or comment. One toggle per item at a
    /// time; a second one while the first is in flight is `Busy`.
    pub async fn toggle_like(&self, key: ItemKey) -> Result<LikeResponse> {
        let _in_flight = self.begin(key)?;
        if key.kind == ItemKind::Activity || key.id <= 0 {
            return Err(FeedError::NotFound);
        }

        let delta = self
            .cache
            .update(|state| state.details.get_mut(&key).and_then(apply_like));

        match self.writes.toggle_like(key).await {
            Ok(response) => {
                self.cache.update(|state| {
                    if let Some(item) = state.details.get_mut(&key) {
                        if let Some(liked) = item.is_liked_mut() {
                            *liked = response.liked;
                        }
                        if let Some(counts) = item.counts_mut() {
                            counts.likes = response.likes;
                        }
                    }
                });
                Ok(response)
            }
            Err(e) => {
                if let Some(delta) = delta {
                    self.cache.update(|state| {
                        if let Some(item) = state.details.get_mut(&key) {
                            revert_like(item, delta);
                        }
                    });
                }
                warn!("Like toggle on {:?} failed, rolled back: {}", key, e);
                Err(e)
            }
        }
    }

    pub async fn mark_read(&self, activity_id: i64) -> Result<Activity> {
        let key = ItemKey::activity(activity_id);
        let _in_flight = self.begin(key)?;

        let flipped = self.cache.update(|state| match state.details.get_mut(&key) {
            Some(FeedItem::Activity(activity)) if !activity.is_read => {
                activity.is_read = true;
                true
            }
            _ => false,
        });

        match self.writes.mark_read(activity_id).await {
            Ok(activity) => {
                let item = FeedItem::Activity(activity.clone());
                self.cache.update(|state| {
                    if let Some(slot) = state.details.get_mut(&key) {
                        *slot = item;
                    }
                });
                Ok(activity)
            }
            Err(e) => {
                if flipped {
                    self.cache.update(|state| {
                        if let Some(FeedItem::Activity(activity)) = state.details.get_mut(&key) {
                            activity.is_read = false;
                        }
                    });
                }
                Err(e)
            }
        }
    }
}
