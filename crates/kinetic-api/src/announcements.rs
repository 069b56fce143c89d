use axum::{
    Extension, Json,
    extract::{Path, State},
};

use kinetic_types::api::{Claims, SuccessResponse};
use kinetic_types::models::Announcement;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

const ANNOUNCEMENT_LIMIT: u32 = 10;

/// Newest announcements the caller has not dismissed.
pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Announcement>>, ApiError> {
    let viewer = claims.sub;
    let announcements = run_db(&state, move |db| db.announcements_for(viewer, ANNOUNCEMENT_LIMIT)).await?;
    Ok(Json(announcements))
}

pub async fn dismiss(
    State(state): State<AppState>,
    Path(announcement_id): Path<i64>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<SuccessResponse>, ApiError> {
    let user = claims.sub;
    if !run_db(&state, move |db| db.dismiss_announcement(announcement_id, user)).await? {
        return Err(ApiError::NotFound);
    }
    Ok(Json(SuccessResponse { success: true }))
}
