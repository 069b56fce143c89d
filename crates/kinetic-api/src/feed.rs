//! Cursor-paged collections. Every list endpoint shares one query shape:
//! `?cursor=<id>&direction=forward|backward&limit=<n>`.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use kinetic_types::api::Claims;
use kinetic_types::models::FeedItem;
use kinetic_types::pagination::{FeedScope, ItemKey, PageQuery};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

pub async fn global_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<FeedItem>>, ApiError> {
    page(&state, FeedScope::Global, query, claims.sub).await
}

pub async fn user_posts(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<FeedItem>>, ApiError> {
    page(&state, FeedScope::UserPosts(user_id), query, claims.sub).await
}

/// Notifications are private to their recipient.
pub async fn user_notifications(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<FeedItem>>, ApiError> {
    if user_id != claims.sub {
        return Err(ApiError::Forbidden);
    }
    page(&state, FeedScope::Notifications(user_id), query, claims.sub).await
}

pub async fn post_comments(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<FeedItem>>, ApiError> {
    page(&state, FeedScope::Comments(post_id), query, claims.sub).await
}

pub async fn comment_replies(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<FeedItem>>, ApiError> {
    page(&state, FeedScope::Replies(comment_id), query, claims.sub).await
}

/// Single comment or reply, for detail refreshes.
pub async fn get_comment(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FeedItem>, ApiError> {
    item(&state, ItemKey::comment(comment_id), claims.sub).await
}

/// Only the recipient can see an activity.
pub async fn get_activity(
    State(state): State<AppState>,
    Path(activity_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FeedItem>, ApiError> {
    item(&state, ItemKey::activity(activity_id), claims.sub).await
}

async fn item(state: &AppState, key: ItemKey, viewer: Uuid) -> Result<Json<FeedItem>, ApiError> {
    run_db(state, move |db| db.get_item(key, viewer))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn page(state: &AppState, scope: FeedScope, query: PageQuery, viewer: Uuid) -> Result<Json<Vec<FeedItem>>, ApiError> {
    let limit = query.clamped_limit();
    let items = run_db(state, move |db| {
        db.query_page(&scope, query.cursor, query.direction, limit, viewer)
    })
    .await?;
    Ok(Json(items))
}
