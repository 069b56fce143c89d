//! `reqwest` implementation of the storage and write collaborators against
//! the kinetic HTTP API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use kinetic_types::api::{CreateCommentRequest, CreatePostRequest, LikeResponse, SuccessResponse, UpdatePostRequest};
use kinetic_types::models::{Activity, Announcement, Comment, FeedItem, Post};
use kinetic_types::pagination::{Cursor, Direction, FeedScope, ItemKey, ItemKind, PageQuery};

use crate::error::{FeedError, Result};
use crate::source::{CommentTarget, FeedSource, WriteApi};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HttpFeedClient {
    http: Client,
    base_url: String,
    token: String,
}

impl HttpFeedClient {
    /// `base_url` without a trailing slash, e.g. `https://kinetic.example/api`.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    /// Announcements the session user has not dismissed, newest first.
    pub async fn announcements(&self) -> Result<Vec<Announcement>> {
        self.send(self.http.get(self.url("/announcements"))).await
    }

    pub async fn dismiss_announcement(&self, announcement_id: i64) -> Result<()> {
        let path = format!("/announcements/{announcement_id}/dismiss");
        self.send::<SuccessResponse>(self.http.post(self.url(&path)))
            .await
            .map(|_| ())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))?;

        match response.status() {
            s if s.is_success() => {}
            StatusCode::UNAUTHORIZED => return Err(FeedError::Unauthorized),
            StatusCode::FORBIDDEN => return Err(FeedError::AccessDenied),
            StatusCode::NOT_FOUND => return Err(FeedError::NotFound),
            s => return Err(FeedError::Status(s.as_u16())),
        }

        response
            .json::<T>()
            .await
            .map_err(|e| FeedError::Decode(e.to_string()))
    }
}

fn scope_path(scope: &FeedScope) -> String {
    match scope {
        FeedScope::Global => "/feed".to_string(),
        FeedScope::UserPosts(user) => format!("/users/{user}/posts"),
        FeedScope::Notifications(user) => format!("/users/{user}/notifications"),
        FeedScope::Comments(post_id) => format!("/posts/{post_id}/comments"),
        FeedScope::Replies(comment_id) => format!("/comments/{comment_id}/replies"),
    }
}

#[async_trait]
impl FeedSource for HttpFeedClient {
    async fn query_page(
        &self,
        scope: &FeedScope,
        cursor: Cursor,
        direction: Direction,
        page_size: u32,
    ) -> Result<Vec<FeedItem>> {
        let query = PageQuery {
            cursor,
            direction,
            limit: page_size,
        };
        debug!("GET {} {:?}", scope_path(scope), query);
        self.send(self.http.get(self.url(&scope_path(scope))).query(&query))
            .await
    }

    async fn get_by_id(&self, key: ItemKey) -> Result<Option<FeedItem>> {
        let result = match key.kind {
            ItemKind::Post => self
                .send::<Post>(self.http.get(self.url(&format!("/posts/{}", key.id))))
                .await
                .map(FeedItem::Post),
            ItemKind::Comment => {
                self.send(self.http.get(self.url(&format!("/comments/{}", key.id))))
                    .await
            }
            ItemKind::Activity => {
                self.send(self.http.get(self.url(&format!("/notifications/{}", key.id))))
                    .await
            }
        };

        match result {
            Ok(item) => Ok(Some(item)),
            Err(FeedError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl WriteApi for HttpFeedClient {
    async fn create_post(&self, request: &CreatePostRequest) -> Result<Post> {
        self.send(self.http.post(self.url("/posts")).json(request)).await
    }

    async fn update_post(&self, post_id: i64, request: &UpdatePostRequest) -> Result<Post> {
        self.send(self.http.patch(self.url(&format!("/posts/{post_id}"))).json(request))
            .await
    }

    async fn create_comment(&self, target: CommentTarget, content: &str) -> Result<Comment> {
        let path = match target {
            CommentTarget::Post { post_id } => format!("/posts/{post_id}/comments"),
            CommentTarget::Reply { parent_id, .. } => format!("/comments/{parent_id}/replies"),
        };
        let body = CreateCommentRequest {
            content: content.to_string(),
        };
        self.send(self.http.post(self.url(&path)).json(&body)).await
    }

    async fn toggle_like(&self, key: ItemKey) -> Result<LikeResponse> {
        let path = match key.kind {
            ItemKind::Post => format!("/posts/{}/like", key.id),
            ItemKind::Comment => format!("/comments/{}/like", key.id),
            ItemKind::Activity => return Err(FeedError::NotFound),
        };
        self.send(self.http.post(self.url(&path))).await
    }

    async fn mark_read(&self, activity_id: i64) -> Result<Activity> {
        self.send(self.http.post(self.url(&format!("/notifications/{activity_id}/read"))))
            .await
    }
}
