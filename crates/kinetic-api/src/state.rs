use std::sync::Arc;

use tracing::error;

use kinetic_db::Database;
use kinetic_push::PushDispatcher;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub jwt_secret: String,
    pub push: PushDispatcher,
}

/// Run a blocking DB closure off the async runtime.
pub async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = state.db.clone();
    tokio::task::spawn_blocking(move || f(&*db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow::anyhow!("database task failed"))
        })?
        .map_err(ApiError::from)
}

/// Fire-and-forget push fan-out for a freshly recorded activity. The
/// dispatcher keeps its DB work on the blocking pool.
pub fn notify(state: &AppState, activity_id: Option<i64>) {
    let Some(activity_id) = activity_id else {
        return;
    };
    if !state.push.is_enabled() {
        return;
    }

    let state = state.clone();
    tokio::spawn(async move {
        state.push.send_for_activity(state.db.clone(), activity_id).await;
    });
}
