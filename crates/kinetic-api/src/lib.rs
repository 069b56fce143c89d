pub mod announcements;
pub mod comments;
pub mod discover;
pub mod error;
pub mod feed;
pub mod media;
pub mod middleware;
pub mod notifications;
pub mod posts;
pub mod push;
pub mod state;
pub mod users;

use axum::{
    Json, Router,
    routing::{delete, get, post},
};

pub use error::ApiError;
pub use middleware::issue_token;
pub use state::{AppState, AppStateInner};

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Every route except the health check and the transcoder callback
/// requires a bearer token.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route(
            "/video/transcode-complete",
            post(media::transcode_complete).get(media::transcode_status),
        );

    let protected = Router::new()
        // Collections
        .route("/feed", get(feed::global_feed))
        .route("/users/{user_id}/posts", get(feed::user_posts))
        .route("/users/{user_id}/notifications", get(feed::user_notifications))
        .route("/posts/{post_id}/comments", get(feed::post_comments).post(comments::create_comment))
        .route("/comments/{comment_id}/replies", get(feed::comment_replies).post(comments::create_reply))
        // Posts
        .route("/posts", post(posts::create_post))
        .route(
            "/posts/{post_id}",
            get(posts::get_post).patch(posts::update_post).delete(posts::delete_post),
        )
        .route("/posts/{post_id}/like", post(posts::toggle_like))
        // Comments
        .route("/comments/{comment_id}", get(feed::get_comment))
        .route("/comments/{comment_id}/like", post(comments::toggle_like))
        // Social
        .route("/users/{user_id}/follow", post(users::toggle_follow))
        // Notifications
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{activity_id}", get(feed::get_activity))
        .route("/notifications/{activity_id}/read", post(notifications::mark_read))
        // Push
        .route("/push/subscribe", post(push::subscribe))
        .route("/push/unsubscribe", delete(push::unsubscribe).post(push::unsubscribe))
        // Announcements
        .route("/announcements", get(announcements::list))
        .route("/announcements/{announcement_id}/dismiss", post(announcements::dismiss))
        // Discovery
        .route("/home/top-posts", get(discover::top_posts))
        .route("/home/top-users", get(discover::top_users))
        .layer(axum::middleware::from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new().merge(public).merge(protected).with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use kinetic_db::Database;
    use kinetic_push::PushDispatcher;

    use super::*;

    const SECRET: &str = "test-secret";

    fn app() -> (Router, AppState) {
        let state = Arc::new(AppStateInner {
            db: Arc::new(Database::open_in_memory().unwrap()),
            jwt_secret: SECRET.to_string(),
            push: PushDispatcher::disabled(),
        });
        (router(state.clone()), state)
    }

    fn token(user: Uuid, name: &str) -> String {
        issue_token(SECRET, user, name, chrono::Duration::hours(1)).unwrap()
    }

    async fn call(app: &Router, method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = auth {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_is_public_and_feed_is_not() {
        let (app, _) = app();
        let (status, _) = call(&app, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(&app, Method::GET, "/feed", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) = call(&app, Method::GET, "/feed", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn feed_pages_forward_by_cursor() {
        let (app, _) = app();
        let alice = Uuid::new_v4();
        let t = token(alice, "alice");

        let mut ids = Vec::new();
        for i in 0..5 {
            let (status, body) =
                call(&app, Method::POST, "/posts", Some(&t), Some(json!({ "content": format!("post {i}") }))).await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(body["id"].as_i64().unwrap());
        }

        let (_, first) = call(&app, Method::GET, "/feed?limit=3", Some(&t), None).await;
        let first: Vec<i64> = first.as_array().unwrap().iter().map(|i| i["id"].as_i64().unwrap()).collect();
        assert_eq!(first, vec![ids[4], ids[3], ids[2]]);

        let uri = format!("/feed?limit=3&cursor={}", ids[2]);
        let (_, second) = call(&app, Method::GET, &uri, Some(&t), None).await;
        let second: Vec<i64> = second.as_array().unwrap().iter().map(|i| i["id"].as_i64().unwrap()).collect();
        assert_eq!(second, vec![ids[1], ids[0]]);

        let uri = format!("/feed?direction=backward&cursor={}", ids[2]);
        let (_, newer) = call(&app, Method::GET, &uri, Some(&t), None).await;
        let newer: Vec<i64> = newer.as_array().unwrap().iter().map(|i| i["id"].as_i64().unwrap()).collect();
        assert_eq!(newer, vec![ids[3], ids[4]]);
    }

    #[tokio::test]
    async fn empty_post_is_rejected() {
        let (app, _) = app();
        let t = token(Uuid::new_v4(), "alice");
        let (status, _) = call(&app, Method::POST, "/posts", Some(&t), Some(json!({ "content": "   " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn like_toggles_and_notifies_author() {
        let (app, _) = app();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let (ta, tb) = (token(alice, "alice"), token(bob, "bob"));

        let (_, post) = call(&app, Method::POST, "/posts", Some(&ta), Some(json!({ "content": "hello" }))).await;
        let like_uri = format!("/posts/{}/like", post["id"]);

        let (status, body) = call(&app, Method::POST, &like_uri, Some(&tb), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "liked": true, "likes": 1 }));

        let (_, unread) = call(&app, Method::GET, "/notifications/unread-count", Some(&ta), None).await;
        assert_eq!(unread["count"], 1);

        let uri = format!("/users/{alice}/notifications");
        let (_, items) = call(&app, Method::GET, &uri, Some(&ta), None).await;
        assert_eq!(items[0]["kind"], "activity");
        assert_eq!(items[0]["type"], "POST_LIKE");

        let (status, _) = call(&app, Method::GET, &uri, Some(&tb), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, body) = call(&app, Method::POST, &like_uri, Some(&tb), None).await;
        assert_eq!(body, json!({ "liked": false, "likes": 0 }));
    }

    #[tokio::test]
    async fn only_the_author_may_delete() {
        let (app, _) = app();
        let (ta, tb) = (token(Uuid::new_v4(), "alice"), token(Uuid::new_v4(), "bob"));
        let (_, post) = call(&app, Method::POST, "/posts", Some(&ta), Some(json!({ "content": "mine" }))).await;
        let uri = format!("/posts/{}", post["id"]);

        let (status, _) = call(&app, Method::DELETE, &uri, Some(&tb), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, Method::DELETE, &uri, Some(&ta), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = call(&app, Method::GET, &uri, Some(&ta), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn comment_on_missing_post_is_not_found() {
        let (app, _) = app();
        let t = token(Uuid::new_v4(), "alice");
        let (status, _) =
            call(&app, Method::POST, "/posts/999/comments", Some(&t), Some(json!({ "content": "hi" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn transcode_webhook_settles_pending_video() {
        let (app, state) = app();
        let alice = Uuid::new_v4();
        let t = token(alice, "alice");
        let body = json!({
            "content": "clip",
            "visualMedia": [{ "kind": "VIDEO", "url": "https://cdn/clip.mp4", "fileName": "clip.mp4" }]
        });
        let (status, _) = call(&app, Method::POST, "/posts", Some(&t), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, before) = call(&app, Method::GET, "/video/transcode-complete?fileName=clip.mp4", None, None).await;
        assert_eq!(before["processingStatus"], "PENDING");

        let (status, body) = call(
            &app,
            Method::POST,
            "/video/transcode-complete",
            None,
            Some(json!({ "fileName": "clip", "status": "COMPLETE" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "updated": 1 }));

        let media = state.db.find_media("clip.mp4").unwrap().unwrap();
        assert_eq!(media.processing_status, Some(kinetic_types::models::ProcessingStatus::Completed));
    }

    #[tokio::test]
    async fn only_the_author_may_edit() {
        let (app, _) = app();
        let (ta, tb) = (token(Uuid::new_v4(), "alice"), token(Uuid::new_v4(), "bob"));
        let (_, post) = call(&app, Method::POST, "/posts", Some(&ta), Some(json!({ "content": "first take" }))).await;
        let uri = format!("/posts/{}", post["id"]);

        let (status, _) = call(&app, Method::PATCH, &uri, Some(&tb), Some(json!({ "content": "mine now" }))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = call(&app, Method::PATCH, &uri, Some(&ta), Some(json!({ "content": " " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = call(&app, Method::PATCH, "/posts/999", Some(&ta), Some(json!({ "content": "x" }))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, edited) = call(&app, Method::PATCH, &uri, Some(&ta), Some(json!({ "content": "second take" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["id"], post["id"]);
        assert_eq!(edited["content"], "second take");
    }

    #[tokio::test]
    async fn dismissed_announcements_disappear_for_that_user_only() {
        let (app, state) = app();
        let admin = Uuid::new_v4();
        state.db.create_user(admin, "admin", None).unwrap();
        let notice = state.db.create_announcement(admin, "Heads up", "New season").unwrap();
        let (ta, tb) = (token(Uuid::new_v4(), "alice"), token(Uuid::new_v4(), "bob"));

        let (status, listed) = call(&app, Method::GET, "/announcements", Some(&ta), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["title"], "Heads up");
        assert_eq!(listed[0]["createdBy"]["username"], "admin");

        let uri = format!("/announcements/{}/dismiss", notice.id);
        let (status, body) = call(&app, Method::POST, &uri, Some(&ta), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true }));

        let (_, listed) = call(&app, Method::GET, "/announcements", Some(&ta), None).await;
        assert_eq!(listed, json!([]));
        let (_, listed) = call(&app, Method::GET, "/announcements", Some(&tb), None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = call(&app, Method::POST, "/announcements/999/dismiss", Some(&ta), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
