use axum::{
    Extension, Json,
    extract::State,
};

use kinetic_types::api::{Claims, TopUser};
use kinetic_types::models::Post;

use crate::error::ApiError;
use crate::state::{AppState, run_db};

const TOP_LIMIT: u32 = 10;
const TOP_POSTS_WINDOW_DAYS: i64 = 7;

/// Most liked posts of the last week.
pub async fn top_posts(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let since = chrono::Utc::now() - chrono::Duration::days(TOP_POSTS_WINDOW_DAYS);
    let viewer = claims.sub;
    let posts = run_db(&state, move |db| db.top_posts(since, TOP_LIMIT, viewer)).await?;
    Ok(Json(posts))
}

pub async fn top_users(State(state): State<AppState>) -> Result<Json<Vec<TopUser>>, ApiError> {
    let users = run_db(&state, |db| db.top_users(TOP_LIMIT)).await?;
    Ok(Json(users))
}
