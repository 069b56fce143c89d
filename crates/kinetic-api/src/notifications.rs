use axum::{
    Extension, Json,
    extract::{Path, State},
};

use kinetic_types::api::{Claims, ReadAllResponse, UnreadCountResponse};
use kinetic_types::models::Activity;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// Someone else's activity answers 404, same as a missing one.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(activity_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Activity>, ApiError> {
    let user = claims.sub;
    run_db(&state, move |db| db.mark_activity_read(activity_id, user))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ReadAllResponse>, ApiError> {
    let user = claims.sub;
    let updated = run_db(&state, move |db| db.mark_all_read(user)).await?;
    Ok(Json(ReadAllResponse { updated }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let user = claims.sub;
    let count = run_db(&state, move |db| db.unread_count(user)).await?;
    Ok(Json(UnreadCountResponse { count }))
}
