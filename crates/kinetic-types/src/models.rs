use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pagination::{ItemKey, ItemKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub name: Option<String>,
    pub profile_photo: Option<String>,
}

impl UserSummary {
    /// Name shown in notifications: display name, then username, then "Someone".
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if !self.username.is_empty() => &self.username,
            _ => "Someone",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "PHOTO",
            MediaKind::Video => "VIDEO",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PHOTO" => Some(MediaKind::Photo),
            "VIDEO" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Transcoding state reported by the media collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "PENDING",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Completed => "COMPLETED",
            ProcessingStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ProcessingStatus::Pending),
            "PROCESSING" => Some(ProcessingStatus::Processing),
            "COMPLETED" => Some(ProcessingStatus::Completed),
            "FAILED" => Some(ProcessingStatus::Failed),
            _ => None,
        }
    }

    pub fn is_settled(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualMedia {
    pub kind: MediaKind,
    pub url: String,
    pub file_name: Option<String>,
    /// `None` for photos, which never go through transcoding.
    pub processing_status: Option<ProcessingStatus>,
}

impl VisualMedia {
    pub fn is_processing(&self) -> bool {
        self.processing_status.is_some_and(|s| !s.is_settled())
    }
}

/// Engagement counters. For comments, `comments` counts replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    pub content: Option<String>,
    pub created_at: DateTime<Utc>,
    pub author: UserSummary,
    pub visual_media: Vec<VisualMedia>,
    pub is_liked: bool,
    pub counts: EngagementCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: UserSummary,
    pub is_liked: bool,
    pub counts: EngagementCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    CreateFollow,
    PostLike,
    PostMention,
    CreateComment,
    CommentLike,
    CommentMention,
    CreateReply,
    ReplyLike,
    ReplyMention,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::CreateFollow => "CREATE_FOLLOW",
            ActivityType::PostLike => "POST_LIKE",
            ActivityType::PostMention => "POST_MENTION",
            ActivityType::CreateComment => "CREATE_COMMENT",
            ActivityType::CommentLike => "COMMENT_LIKE",
            ActivityType::CommentMention => "COMMENT_MENTION",
            ActivityType::CreateReply => "CREATE_REPLY",
            ActivityType::ReplyLike => "REPLY_LIKE",
            ActivityType::ReplyMention => "REPLY_MENTION",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE_FOLLOW" => Some(ActivityType::CreateFollow),
            "POST_LIKE" => Some(ActivityType::PostLike),
            "POST_MENTION" => Some(ActivityType::PostMention),
            "CREATE_COMMENT" => Some(ActivityType::CreateComment),
            "COMMENT_LIKE" => Some(ActivityType::CommentLike),
            "COMMENT_MENTION" => Some(ActivityType::CommentMention),
            "CREATE_REPLY" => Some(ActivityType::CreateReply),
            "REPLY_LIKE" => Some(ActivityType::ReplyLike),
            "REPLY_MENTION" => Some(ActivityType::ReplyMention),
            _ => None,
        }
    }
}

/// A notification entry.
///
/// `source_id` is the row that caused the activity (like, comment, follow),
/// `target_id` the post or comment it is about, when there is one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub source_id: i64,
    pub target_id: Option<i64>,
    pub source_user: UserSummary,
    pub target_user: UserSummary,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Community-wide notice. Each user sees it until they dismiss it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub created_by: UserSummary,
    pub created_at: DateTime<Utc>,
}

/// Any entry of a paginated collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeedItem {
    Post(Post),
    Comment(Comment),
    Activity(Activity),
}

impl FeedItem {
    pub fn id(&self) -> i64 {
        match self {
            FeedItem::Post(p) => p.id,
            FeedItem::Comment(c) => c.id,
            FeedItem::Activity(a) => a.id,
        }
    }

    pub fn kind(&self) -> ItemKind {
        match self {
            FeedItem::Post(_) => ItemKind::Post,
            FeedItem::Comment(_) => ItemKind::Comment,
            FeedItem::Activity(_) => ItemKind::Activity,
        }
    }

    pub fn key(&self) -> ItemKey {
        ItemKey { kind: self.kind(), id: self.id() }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        match self {
            FeedItem::Post(p) => p.created_at,
            FeedItem::Comment(c) => c.created_at,
            FeedItem::Activity(a) => a.created_at,
        }
    }

    /// Engagement counters, for item kinds that carry them.
    pub fn counts_mut(&mut self) -> Option<&mut EngagementCounts> {
        match self {
            FeedItem::Post(p) => Some(&mut p.counts),
            FeedItem::Comment(c) => Some(&mut c.counts),
            FeedItem::Activity(_) => None,
        }
    }

    pub fn is_liked_mut(&mut self) -> Option<&mut bool> {
        match self {
            FeedItem::Post(p) => Some(&mut p.is_liked),
            FeedItem::Comment(c) => Some(&mut c.is_liked),
            FeedItem::Activity(_) => None,
        }
    }

    /// True while any attached media is still pending or transcoding.
    pub fn has_processing_media(&self) -> bool {
        match self {
            FeedItem::Post(p) => p.visual_media.iter().any(VisualMedia::is_processing),
            _ => false,
        }
    }
}
