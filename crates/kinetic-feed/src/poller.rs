use std::future::Future;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::FeedError;
use crate::infinite::InfiniteFeed;

/// A spawned periodic loop. Cancelled on `stop`, on drop, or when the
/// token it was spawned with is cancelled from above.
pub struct PollerHandle {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Run `tick` every `period`, first after one full period. A tick is
    /// awaited before the next one is scheduled, so ticks never overlap.
    pub(crate) fn spawn<F, Fut>(token: CancellationToken, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let stop = token.clone();
        let handle = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = timer.tick() => {}
                }

                let flow = tokio::select! {
                    _ = stop.cancelled() => break,
                    flow = tick() => flow,
                };
                if flow.is_break() {
                    break;
                }
            }
        });

        Self {
            token,
            handle: Some(handle),
        }
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop and wait for the loop to exit.
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Poller task failed: {}", e);
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Periodic backward fetch on an open feed. Stops by itself once the feed
/// is detached or the session loses authorization.
pub struct RefreshPoller {
    task: PollerHandle,
}

impl RefreshPoller {
    pub fn spawn(feed: Arc<InfiniteFeed>, period: Duration) -> Self {
        let token = feed.liveness().child_token();
        info!("Refresh poller for {:?} started ({:?})", feed.scope(), period);

        let task = PollerHandle::spawn(token, period, move || {
            let feed = feed.clone();
            async move { refresh_tick(&feed).await }
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

async fn refresh_tick(feed: &InfiniteFeed) -> ControlFlow<()> {
    match feed.fetch_previous_page().await {
        Ok(0) | Err(FeedError::NoNewData) => ControlFlow::Continue(()),
        Ok(n) => {
            debug!("Refresh of {:?} merged {} items", feed.scope(), n);
            ControlFlow::Continue(())
        }
        Err(FeedError::Detached) => ControlFlow::Break(()),
        Err(e) if e.is_auth() => {
            warn!("Refresh of {:?} not authorized, stopping: {}", feed.scope(), e);
            ControlFlow::Break(())
        }
        Err(e) => {
            warn!("Refresh of {:?} failed: {}", feed.scope(), e);
            ControlFlow::Continue(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use kinetic_types::pagination::FeedScope;

    use super::*;
    use crate::cache::FeedCache;
    use crate::pagination::PaginationEngine;
    use crate::testing::MemoryBackend;

    const PERIOD: Duration = Duration::from_secs(5);

    async fn open(backend: &Arc<MemoryBackend>) -> Arc<InfiniteFeed> {
        let feed = Arc::new(InfiniteFeed::new(
            FeedScope::Global,
            PaginationEngine::new(backend.clone(), 10),
            FeedCache::new(),
            CancellationToken::new(),
        ));
        feed.load_first_page().await.unwrap();
        feed
    }

    async fn advance(d: Duration) {
        tokio::time::sleep(d).await;
        // let the poller task finish its tick
        tokio::task::yield_now().await;
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_once_per_period_and_merges() {
        let backend = MemoryBackend::with_posts(&[1, 2]);
        let feed = open(&backend).await;
        let base = backend.queries.load(Ordering::SeqCst);
        let poller = RefreshPoller::spawn(feed.clone(), PERIOD);

        advance(PERIOD / 2).await;
        assert_eq!(backend.queries.load(Ordering::SeqCst), base);

        backend.add_post(3);
        advance(PERIOD).await;
        assert_eq!(backend.queries.load(Ordering::SeqCst), base + 1);
        assert_eq!(feed.item_ids(), vec![3, 2, 1]);

        advance(PERIOD).await;
        assert_eq!(backend.queries.load(Ordering::SeqCst), base + 2);
        assert_eq!(feed.item_ids(), vec![3, 2, 1]);
        assert!(!feed.has_next_page());

        poller.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stop_leaves_no_timer_behind() {
        let backend = MemoryBackend::with_posts(&[1]);
        let feed = open(&backend).await;
        let poller = RefreshPoller::spawn(feed.clone(), PERIOD);

        advance(PERIOD + Duration::from_millis(1)).await;
        let seen = backend.queries.load(Ordering::SeqCst);

        poller.stop();
        advance(PERIOD * 4).await;
        assert_eq!(backend.queries.load(Ordering::SeqCst), seen);
        assert!(poller.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn detaching_the_feed_stops_the_poller() {
        let backend = MemoryBackend::with_posts(&[1]);
        let feed = open(&backend).await;
        let poller = RefreshPoller::spawn(feed.clone(), PERIOD);

        feed.detach();
        advance(PERIOD * 2).await;
        assert!(poller.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_keep_polling() {
        let backend = MemoryBackend::with_posts(&[1]);
        let feed = open(&backend).await;
        let base = backend.queries.load(Ordering::SeqCst);
        backend.fail_reads.store(true, Ordering::SeqCst);
        let poller = RefreshPoller::spawn(feed.clone(), PERIOD);

        advance(PERIOD * 3 + Duration::from_millis(1)).await;
        assert_eq!(backend.queries.load(Ordering::SeqCst), base + 3);
        assert!(!poller.is_finished());
        assert_eq!(feed.item_ids(), vec![1]);
    }
}
