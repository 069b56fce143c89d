use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use kinetic_db::Ownership;
use kinetic_types::api::{Claims, CreatePostRequest, LikeResponse, NewVisualMedia, UpdatePostRequest};
use kinetic_types::models::Post;

use crate::error::ApiError;
use crate::state::{AppState, notify, run_db};

/// Trimmed content plus media; a post needs at least one of them.
fn post_body(req: CreatePostRequest) -> Result<(Option<String>, Vec<NewVisualMedia>), ApiError> {
    let content = req
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    if content.is_none() && req.visual_media.is_empty() {
        return Err(ApiError::BadRequest("post needs content or media".into()));
    }
    if req.visual_media.iter().any(|m| m.url.is_empty()) {
        return Err(ApiError::BadRequest("media url is required".into()));
    }
    Ok((content, req.visual_media))
}

/// Media must already be in object storage; only references arrive here.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreatePostRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (content, media) = post_body(req)?;
    let author = claims.sub;
    let post = run_db(&state, move |db| db.create_post(author, content.as_deref(), &media)).await?;

    info!("User {} created post {}", claims.username, post.id);
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Post>, ApiError> {
    let viewer = claims.sub;
    run_db(&state, move |db| db.get_post(post_id, viewer))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

/// Owner only. Returns the post as stored after the edit.
pub async fn update_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<Post>, ApiError> {
    let (content, media) = post_body(req)?;
    let user = claims.sub;
    let outcome = run_db(&state, move |db| {
        Ok(match db.update_post(post_id, user, content.as_deref(), &media)? {
            Ownership::Done => db.get_post(post_id, user)?.ok_or(Ownership::Missing),
            other => Err(other),
        })
    })
    .await?;

    match outcome {
        Ok(post) => {
            info!("User {} edited post {}", claims.username, post_id);
            Ok(Json(post))
        }
        Err(Ownership::NotOwner) => Err(ApiError::Forbidden),
        Err(_) => Err(ApiError::NotFound),
    }
}

/// Owner only.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    let user = claims.sub;
    match run_db(&state, move |db| db.delete_post(post_id, user)).await? {
        Ownership::Done => {
            info!("User {} deleted post {}", claims.username, post_id);
            Ok(StatusCode::NO_CONTENT)
        }
        Ownership::NotOwner => Err(ApiError::Forbidden),
        Ownership::Missing => Err(ApiError::NotFound),
    }
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<LikeResponse>, ApiError> {
    let user = claims.sub;
    let toggled = run_db(&state, move |db| db.toggle_post_like(post_id, user))
        .await?
        .ok_or(ApiError::NotFound)?;

    notify(&state, toggled.activity_id);
    Ok(Json(LikeResponse {
        liked: toggled.active,
        likes: toggled.count,
    }))
}
