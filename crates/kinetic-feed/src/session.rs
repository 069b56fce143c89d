use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use kinetic_types::models::UserSummary;
use kinetic_types::pagination::FeedScope;

use crate::cache::FeedCache;
use crate::config::FeedConfig;
use crate::error::Result;
use crate::http::HttpFeedClient;
use crate::infinite::InfiniteFeed;
use crate::media_poll::MediaStatusPoller;
use crate::optimistic::OptimisticCoordinator;
use crate::pagination::PaginationEngine;
use crate::poller::RefreshPoller;
use crate::source::{FeedSource, WriteApi};

/// Everything a signed-in client holds: one cache, one coordinator, and the
/// root liveness token every feed and poller hangs off.
///
/// `logout` cancels the whole tree and empties the cache.
pub struct FeedSession {
    config: FeedConfig,
    viewer: UserSummary,
    engine: PaginationEngine,
    cache: FeedCache,
    coordinator: OptimisticCoordinator,
    root: CancellationToken,
}

impl FeedSession {
    pub fn new(config: FeedConfig, source: Arc<dyn FeedSource>, writes: Arc<dyn WriteApi>, viewer: UserSummary) -> Self {
        let cache = FeedCache::new();
        let root = CancellationToken::new();
        let coordinator = OptimisticCoordinator::new(writes, cache.clone(), viewer.clone(), root.clone());
        let engine = PaginationEngine::new(source, config.page_size);

        Self {
            config,
            viewer,
            engine,
            cache,
            coordinator,
            root,
        }
    }

    /// Session against the HTTP API with a token from the auth service.
    pub fn connect(config: FeedConfig, base_url: &str, token: &str, viewer: UserSummary) -> Result<Self> {
        let client = Arc::new(HttpFeedClient::new(base_url, token)?);
        Ok(Self::new(config, client.clone(), client, viewer))
    }

    pub fn viewer(&self) -> &UserSummary {
        &self.viewer
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    pub fn coordinator(&self) -> &OptimisticCoordinator {
        &self.coordinator
    }

    pub fn is_active(&self) -> bool {
        !self.root.is_cancelled()
    }

    /// A feed view on `scope`. Call `detach` on it when the view goes away.
    pub fn open_feed(&self, scope: FeedScope) -> Arc<InfiniteFeed> {
        Arc::new(InfiniteFeed::new(
            scope,
            self.engine.clone(),
            self.cache.clone(),
            self.root.child_token(),
        ))
    }

    /// Background refresh for an open feed at the configured interval.
    pub fn watch(&self, feed: &Arc<InfiniteFeed>) -> RefreshPoller {
        RefreshPoller::spawn(feed.clone(), self.config.refresh_interval)
    }

    pub fn watch_media(&self) -> MediaStatusPoller {
        MediaStatusPoller::spawn(
            self.engine.source().clone(),
            self.cache.clone(),
            self.root.child_token(),
            self.config.media_poll_interval,
        )
    }

    /// Tear down every feed and poller of this session and drop all cached data.
    pub fn logout(&self) {
        self.root.cancel();
        self.cache.clear();
        info!("Session for {} closed", self.viewer.username);
    }
}
