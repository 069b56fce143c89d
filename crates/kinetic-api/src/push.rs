use axum::{
    Extension, Json,
    extract::State,
};
use tracing::info;

use kinetic_types::api::{Claims, PushSubscribeRequest, PushUnsubscribeRequest, SuccessResponse};

use crate::error::ApiError;
use crate::state::{AppState, run_db};

/// Register a device. Re-subscribing an endpoint moves it to the caller.
pub async fn subscribe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PushSubscribeRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if req.endpoint.is_empty() || req.keys.p256dh.is_empty() || req.keys.auth.is_empty() {
        return Err(ApiError::BadRequest("invalid subscription".into()));
    }

    let user = claims.sub;
    run_db(&state, move |db| {
        db.upsert_subscription(&req.endpoint, user, &req.keys.p256dh, &req.keys.auth)
    })
    .await?;

    info!("User {} subscribed a push endpoint", claims.username);
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn unsubscribe(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<PushUnsubscribeRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    if req.endpoint.is_empty() {
        return Err(ApiError::BadRequest("endpoint is required".into()));
    }

    let user = claims.sub;
    let removed = run_db(&state, move |db| db.delete_user_subscription(&req.endpoint, user)).await?;
    Ok(Json(SuccessResponse { success: removed }))
}
