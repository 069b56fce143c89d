use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use kinetic_types::pagination::ItemKey;

use crate::cache::FeedCache;
use crate::error::Result;
use crate::poller::PollerHandle;
use crate::source::FeedSource;

/// Re-fetch every cached post whose media is still pending or transcoding
/// and replace its detail entry. Returns how many have settled.
pub async fn refresh_processing_media(source: &dyn FeedSource, cache: &FeedCache) -> Result<usize> {
    let pending: Vec<ItemKey> = cache.read(|state| {
        state
            .details
            .iter()
            .filter(|(key, item)| key.id > 0 && item.has_processing_media())
            .map(|(key, _)| *key)
            .collect()
    });

    let mut settled = 0;
    for key in pending {
        let Some(item) = source.get_by_id(key).await? else {
            debug!("{:?} disappeared while transcoding", key);
            continue;
        };
        let done = !item.has_processing_media();
        cache.update(|state| {
            if let Some(slot) = state.details.get_mut(&key) {
                *slot = item;
            }
        });
        if done {
            settled += 1;
        }
    }
    Ok(settled)
}

/// Runs `refresh_processing_media` on a fixed period.
pub struct MediaStatusPoller {
    task: PollerHandle,
}

impl MediaStatusPoller {
    pub fn spawn(source: Arc<dyn FeedSource>, cache: FeedCache, token: CancellationToken, period: Duration) -> Self {
        info!("Media status poller started ({:?})", period);
        let task = PollerHandle::spawn(token, period, move || {
            let source = source.clone();
            let cache = cache.clone();
            async move {
                match refresh_processing_media(source.as_ref(), &cache).await {
                    Ok(0) => ControlFlow::Continue(()),
                    Ok(n) => {
                        info!("{} posts finished processing", n);
                        ControlFlow::Continue(())
                    }
                    Err(e) if e.is_auth() => {
                        warn!("Media status poll not authorized, stopping: {}", e);
                        ControlFlow::Break(())
                    }
                    Err(e) => {
                        warn!("Media status poll failed: {}", e);
                        ControlFlow::Continue(())
                    }
                }
            }
        });
        Self { task }
    }

    pub fn stop(&self) {
        self.task.stop();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn shutdown(self) {
        self.task.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use kinetic_types::models::{FeedItem, ProcessingStatus};

    use super::*;
    use crate::testing::{MemoryBackend, post, video_post};

    fn seeded() -> (Arc<MemoryBackend>, FeedCache) {
        let backend = MemoryBackend::with_posts(&[1]);
        backend.insert_post(video_post(2, ProcessingStatus::Pending));
        let cache = FeedCache::new();
        cache.update(|s| {
            s.store([
                FeedItem::Post(post(1)),
                FeedItem::Post(video_post(2, ProcessingStatus::Pending)),
                // optimistic entries are never polled
                FeedItem::Post(video_post(-1, ProcessingStatus::Pending)),
            ])
        });
        (backend, cache)
    }

    fn status(cache: &FeedCache, id: i64) -> Option<ProcessingStatus> {
        match cache.item(ItemKey::post(id)) {
            Some(FeedItem::Post(p)) => p.visual_media.first().and_then(|m| m.processing_status),
            _ => None,
        }
    }

    #[tokio::test]
    async fn replaces_entries_once_settled() {
        let (backend, cache) = seeded();

        assert_eq!(refresh_processing_media(backend.as_ref(), &cache).await.unwrap(), 0);
        assert_eq!(status(&cache, 2), Some(ProcessingStatus::Pending));

        backend.set_media_status(2, ProcessingStatus::Processing);
        assert_eq!(refresh_processing_media(backend.as_ref(), &cache).await.unwrap(), 0);
        assert_eq!(status(&cache, 2), Some(ProcessingStatus::Processing));

        backend.set_media_status(2, ProcessingStatus::Completed);
        assert_eq!(refresh_processing_media(backend.as_ref(), &cache).await.unwrap(), 1);
        assert_eq!(status(&cache, 2), Some(ProcessingStatus::Completed));
        assert_eq!(status(&cache, -1), Some(ProcessingStatus::Pending));

        // nothing left to poll
        assert_eq!(refresh_processing_media(backend.as_ref(), &cache).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn poller_picks_up_failed_transcodes() {
        let (backend, cache) = seeded();
        let poller = MediaStatusPoller::spawn(
            backend.clone(),
            cache.clone(),
            CancellationToken::new(),
            Duration::from_secs(10),
        );

        backend.set_media_status(2, ProcessingStatus::Failed);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert_eq!(status(&cache, 2), Some(ProcessingStatus::Failed));

        poller.shutdown().await;
    }
}
