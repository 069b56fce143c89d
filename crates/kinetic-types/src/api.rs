use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{MediaKind, ProcessingStatus, UserSummary};

// -- JWT Claims --

/// Claims of the session token issued by the auth collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Posts --

/// Reference to media already uploaded to object storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisualMedia {
    pub kind: MediaKind,
    pub url: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: Option<String>,
    #[serde(default)]
    pub visual_media: Vec<NewVisualMedia>,
}

/// Body of an edit. Content and media are replaced wholesale.
pub type UpdatePostRequest = CreatePostRequest;

// -- Comments --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub content: String,
}

// -- Likes / follows --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeResponse {
    pub liked: bool,
    pub likes: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FollowResponse {
    pub following: bool,
}

// -- Notifications --

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReadAllResponse {
    pub updated: usize,
}

// -- Push --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushKeys {
    pub p256dh: String,
    pub auth: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscribeRequest {
    pub endpoint: String,
    pub keys: PushKeys,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushUnsubscribeRequest {
    pub endpoint: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// -- Transcoding --

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TranscodeUpdateResponse {
    pub success: bool,
    pub updated: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeStatusQuery {
    pub file_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscodeStatusResponse {
    pub file_name: String,
    pub processing_status: Option<ProcessingStatus>,
}

// -- Discovery --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUser {
    #[serde(flatten)]
    pub user: UserSummary,
    pub post_count: u64,
}
