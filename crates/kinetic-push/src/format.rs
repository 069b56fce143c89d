use serde::{Deserialize, Serialize};

use kinetic_types::models::{Activity, ActivityType};

const SNIPPET_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushData {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub source_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<i64>,
    pub source_username: String,
    pub target_username: String,
    pub url: String,
}

/// JSON body delivered to the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub data: PushData,
}

impl PushPayload {
    pub fn for_activity(activity: &Activity, content: Option<&str>, icon: &str) -> Self {
        let NotificationContent { title, body } =
            format_for_activity(activity.activity_type, activity.source_user.display_name(), content);

        Self {
            title,
            body,
            icon: icon.to_string(),
            data: PushData {
                activity_type: activity.activity_type,
                source_id: activity.source_id,
                target_id: activity.target_id,
                source_username: activity.source_user.username.clone(),
                target_username: activity.target_user.username.clone(),
                url: activity_url(activity),
            },
        }
    }
}

/// Title and body shown for an activity.
pub fn format_for_activity(activity_type: ActivityType, source_name: &str, content: Option<&str>) -> NotificationContent {
    let quoted = content.map(snippet).map(|s| format!(": \"{s}\"")).unwrap_or_default();

    let (title, body) = match activity_type {
        ActivityType::CreateFollow => ("New Follower", format!("{source_name} started following you!")),
        ActivityType::PostLike => ("Post Liked", format!("{source_name} liked your post{quoted}")),
        ActivityType::PostMention => ("You were mentioned", format!("{source_name} mentioned you in a post{quoted}")),
        ActivityType::CreateComment => ("New Comment", format!("{source_name} commented on your post{quoted}")),
        ActivityType::CommentLike => ("Comment Liked", format!("{source_name} liked your comment")),
        ActivityType::CommentMention => ("You were mentioned", format!("{source_name} mentioned you in a comment")),
        ActivityType::CreateReply => ("New Reply", format!("{source_name} replied to your comment{quoted}")),
        ActivityType::ReplyLike => ("Reply Liked", format!("{source_name} liked your reply")),
        ActivityType::ReplyMention => ("You were mentioned", format!("{source_name} mentioned you in a reply")),
    };

    NotificationContent {
        title: title.to_string(),
        body,
    }
}

/// Where tapping the notification leads.
pub fn activity_url(activity: &Activity) -> String {
    match (activity.activity_type, activity.target_id) {
        (ActivityType::PostLike | ActivityType::CreateComment, Some(post)) => format!("/posts/{post}"),
        (ActivityType::CreateFollow, _) => format!("/{}", activity.source_user.username),
        (ActivityType::CommentLike | ActivityType::CreateReply, target) => {
            format!("/comments/{}", target.unwrap_or(activity.source_id))
        }
        _ => "/notifications".to_string(),
    }
}

fn snippet(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(SNIPPET_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use kinetic_types::models::UserSummary;

    use super::*;

    fn user(username: &str, name: Option<&str>) -> UserSummary {
        UserSummary {
            id: Uuid::new_v4(),
            username: username.to_string(),
            name: name.map(str::to_string),
            profile_photo: None,
        }
    }

    fn activity(activity_type: ActivityType, target_id: Option<i64>) -> Activity {
        Activity {
            id: 1,
            activity_type,
            source_id: 7,
            target_id,
            source_user: user("bob", Some("Bob")),
            target_user: user("alice", None),
            is_read: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn follow_message() {
        let n = format_for_activity(ActivityType::CreateFollow, "Bob", Some("ignored"));
        assert_eq!(n.title, "New Follower");
        assert_eq!(n.body, "Bob started following you!");
    }

    #[test]
    fn post_like_quotes_short_content() {
        let n = format_for_activity(ActivityType::PostLike, "Bob", Some("sunset"));
        assert_eq!(n.body, "Bob liked your post: \"sunset\"");
        let n = format_for_activity(ActivityType::PostLike, "Bob", None);
        assert_eq!(n.body, "Bob liked your post");
    }

    #[test]
    fn long_content_is_truncated_on_char_boundary() {
        let content = "é".repeat(60);
        let n = format_for_activity(ActivityType::CreateReply, "Bob", Some(&content));
        let expected = format!("Bob replied to your comment: \"{}...\"", "é".repeat(50));
        assert_eq!(n.body, expected);

        let exact = "x".repeat(50);
        let n = format_for_activity(ActivityType::CreateComment, "Bob", Some(&exact));
        assert_eq!(n.body, format!("Bob commented on your post: \"{exact}\""));
    }

    #[test]
    fn comment_like_never_quotes() {
        let n = format_for_activity(ActivityType::CommentLike, "Bob", Some("text"));
        assert_eq!(n.body, "Bob liked your comment");
    }

    #[test]
    fn urls_per_activity_type() {
        assert_eq!(activity_url(&activity(ActivityType::PostLike, Some(3))), "/posts/3");
        assert_eq!(activity_url(&activity(ActivityType::CreateFollow, None)), "/bob");
        assert_eq!(activity_url(&activity(ActivityType::CreateReply, Some(9))), "/comments/9");
        assert_eq!(activity_url(&activity(ActivityType::CommentLike, None)), "/comments/7");
        assert_eq!(activity_url(&activity(ActivityType::ReplyLike, Some(9))), "/notifications");
    }

    #[test]
    fn payload_uses_display_name() {
        let payload = PushPayload::for_activity(&activity(ActivityType::PostLike, Some(3)), None, "/logo.png");
        assert_eq!(payload.body, "Bob liked your post");
        assert_eq!(payload.data.url, "/posts/3");
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["data"]["type"], "POST_LIKE");
        assert_eq!(json["data"]["sourceUsername"], "bob");
    }
}
