use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use kinetic_db::Database;
use kinetic_types::api::PushKeys;

use crate::format::PushPayload;
use crate::transport::{PushTransport, Subscription};

/// Per-call delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub pruned: usize,
    pub failed: usize,
}

/// Sends activity notifications to every device of the target user.
#[derive(Clone)]
pub struct PushDispatcher {
    transport: Option<Arc<dyn PushTransport>>,
    icon: String,
}

impl PushDispatcher {
    pub fn new(transport: Arc<dyn PushTransport>, icon: impl Into<String>) -> Self {
        Self {
            transport: Some(transport),
            icon: icon.into(),
        }
    }

    /// A dispatcher that drops every notification.
    pub fn disabled() -> Self {
        Self {
            transport: None,
            icon: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.transport.is_some()
    }

    /// Notify the target of an activity. Push is best-effort: every failure
    /// is logged here and never reaches the caller.
    pub async fn send_for_activity(&self, db: Arc<Database>, activity_id: i64) {
        if let Err(e) = self.try_send_for_activity(db, activity_id).await {
            error!("Push for activity {} failed: {:#}", activity_id, e);
        }
    }

    async fn try_send_for_activity(&self, db: Arc<Database>, activity_id: i64) -> anyhow::Result<FanoutReport> {
        if !self.is_enabled() {
            debug!("Push disabled, skipping activity {}", activity_id);
            return Ok(FanoutReport::default());
        }

        let icon = self.icon.clone();
        let prepared = blocking(&db, move |db| {
            let Some(activity) = db.get_active_activity(activity_id)? else {
                return Ok(None);
            };
            if activity.source_user.id == activity.target_user.id {
                return Ok(None);
            }
            let content = db.activity_content(&activity)?;
            let payload = PushPayload::for_activity(&activity, content.as_deref(), &icon);
            Ok(Some((activity.target_user.id, payload)))
        })
        .await?;

        match prepared {
            Some((target, payload)) => self.send_to_user(db, target, &payload).await,
            None => Ok(FanoutReport::default()),
        }
    }

    /// Deliver `payload` to all of `user`'s subscriptions concurrently.
    /// Subscriptions the push service reports as gone are deleted.
    pub async fn send_to_user(&self, db: Arc<Database>, user: Uuid, payload: &PushPayload) -> anyhow::Result<FanoutReport> {
        let Some(transport) = &self.transport else {
            warn!("Push transport not configured; notification for {} dropped", user);
            return Ok(FanoutReport::default());
        };

        let subscriptions: Vec<Subscription> = blocking(&db, move |db| db.subscriptions_for_user(user))
            .await?
            .into_iter()
            .map(|row| Subscription {
                endpoint: row.endpoint,
                keys: PushKeys {
                    p256dh: row.p256dh,
                    auth: row.auth,
                },
            })
            .collect();

        if subscriptions.is_empty() {
            return Ok(FanoutReport::default());
        }

        let results = join_all(subscriptions.iter().map(|s| transport.deliver(s, payload))).await;

        let mut report = FanoutReport::default();
        let mut dead = Vec::new();
        for (subscription, result) in subscriptions.into_iter().zip(results) {
            match result {
                Ok(()) => report.delivered += 1,
                Err(e) if e.is_permanent() => {
                    info!("Pruning dead push subscription {}", subscription.endpoint);
                    dead.push(subscription.endpoint);
                }
                Err(e) => {
                    warn!("Push delivery to {} failed: {}", subscription.endpoint, e);
                    report.failed += 1;
                }
            }
        }

        if !dead.is_empty() {
            report.pruned = blocking(&db, move |db| {
                for endpoint in &dead {
                    db.delete_subscription(endpoint)?;
                }
                Ok(dead.len())
            })
            .await?;
        }

        Ok(report)
    }
}

/// Run synchronous DB work on the blocking pool so a busy connection never
/// stalls a runtime worker.
async fn blocking<F, T>(db: &Arc<Database>, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = db.clone();
    tokio::task::spawn_blocking(move || f(&db)).await?
}
