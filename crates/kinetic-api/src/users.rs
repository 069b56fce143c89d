use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use kinetic_types::api::{Claims, FollowResponse};

use crate::error::ApiError;
use crate::state::{AppState, notify, run_db};

pub async fn toggle_follow(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<FollowResponse>, ApiError> {
    if user_id == claims.sub {
        return Err(ApiError::BadRequest("cannot follow yourself".into()));
    }

    let follower = claims.sub;
    let toggled = run_db(&state, move |db| db.toggle_follow(follower, user_id))
        .await?
        .ok_or(ApiError::NotFound)?;

    notify(&state, toggled.activity_id);
    Ok(Json(FollowResponse {
        following: toggled.active,
    }))
}
