use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use kinetic_types::api::{Claims, CreateCommentRequest, LikeResponse};

use crate::error::ApiError;
use crate::state::{AppState, notify, run_db};

fn comment_body(req: CreateCommentRequest) -> Result<String, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("comment content is required".into()));
    }
    Ok(content)
}

pub async fn create_comment(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = comment_body(req)?;
    let author = claims.sub;
    let created = run_db(&state, move |db| db.create_comment(post_id, author, &content))
        .await?
        .ok_or(ApiError::NotFound)?;

    notify(&state, created.activity_id);
    Ok((StatusCode::CREATED, Json(created.item)))
}

pub async fn create_reply(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = comment_body(req)?;
    let author = claims.sub;
    let created = run_db(&state, move |db| db.create_reply(comment_id, author, &content))
        .await?
        .ok_or(ApiError::NotFound)?;

    notify(&state, created.activity_id);
    Ok((StatusCode::CREATED, Json(created.item)))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<LikeResponse>, ApiError> {
    let user = claims.sub;
    let toggled = run_db(&state, move |db| db.toggle_comment_like(comment_id, user))
        .await?
        .ok_or(ApiError::NotFound)?;

    notify(&state, toggled.activity_id);
    Ok(Json(LikeResponse {
        liked: toggled.active,
        likes: toggled.count,
    }))
}
