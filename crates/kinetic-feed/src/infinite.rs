use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use kinetic_types::models::FeedItem;
use kinetic_types::pagination::{Cursor, Direction, FeedScope};

use crate::cache::{FeedCache, PageParam, PagedList};
use crate::error::{FeedError, Result};
use crate::pagination::{FetchedPage, PaginationEngine};

/// A paged, newest-first view of one scope, backed by the shared cache.
///
/// Results of a fetch are committed only while the feed is attached; once
/// `detach` has been called they are dropped with `FeedError::Detached`.
pub struct InfiniteFeed {
    scope: FeedScope,
    engine: PaginationEngine,
    cache: FeedCache,
    alive: CancellationToken,
}

impl InfiniteFeed {
    pub fn new(scope: FeedScope, engine: PaginationEngine, cache: FeedCache, alive: CancellationToken) -> Self {
        Self {
            scope,
            engine,
            cache,
            alive,
        }
    }

    pub fn scope(&self) -> FeedScope {
        self.scope
    }

    pub fn cache(&self) -> &FeedCache {
        &self.cache
    }

    /// Token that is cancelled when this feed goes away. Pollers hang their
    /// own tokens off it.
    pub fn liveness(&self) -> &CancellationToken {
        &self.alive
    }

    pub fn is_attached(&self) -> bool {
        !self.alive.is_cancelled()
    }

    /// Stop committing results. Pollers bound to this feed stop too.
    pub fn detach(&self) {
        self.alive.cancel();
    }

    /// (Re)load the newest page, replacing whatever was cached for this scope.
    pub async fn load_first_page(&self) -> Result<()> {
        let page = self
            .engine
            .fetch(&self.scope, Cursor::START, Direction::Forward)
            .await?;
        self.ensure_attached()?;

        let scope = self.scope;
        self.cache.update(|state| {
            let list = PagedList {
                pages: vec![page.ids()],
                page_params: vec![PageParam::Forward(Cursor::START)],
                next_cursor: page.next_cursor,
            };
            state.lists.insert(scope, list);
            state.store(page.items);
        });
        Ok(())
    }

    /// Append the next older page. Returns `false` when the walk is already
    /// exhausted. Loads the first page if nothing is cached yet.
    pub async fn fetch_next_page(&self) -> Result<bool> {
        let cursor = match self.cache.list(&self.scope) {
            None => {
                self.load_first_page().await?;
                return Ok(true);
            }
            Some(list) => match list.next_cursor {
                Some(cursor) => cursor,
                None => return Ok(false),
            },
        };

        let page = self.engine.fetch(&self.scope, cursor, Direction::Forward).await?;
        self.ensure_attached()?;

        let scope = self.scope;
        self.cache.update(|state| {
            let Some(list) = state.lists.get_mut(&scope) else {
                return;
            };
            let FetchedPage { items, next_cursor } = page;
            let ids: Vec<i64> = items.iter().map(FeedItem::id).collect();

            // A page's slot is its cursor, not its arrival order. Backward pages
            // are never forward slots, even when their cursors coincide.
            match list.forward_slot(cursor) {
                Some(slot) => list.pages[slot] = ids,
                None => {
                    list.pages.push(ids);
                    list.page_params.push(PageParam::Forward(cursor));
                }
            }
            if list.last_forward_cursor() == Some(cursor) {
                list.next_cursor = next_cursor;
            }
            state.store(items);
        });
        Ok(true)
    }

    /// Fetch items newer than the newest one loaded and prepend them.
    ///
    /// Returns the number of ids added to the list. An empty fetch is
    /// `Err(FeedError::NoNewData)` and leaves the cache, including
    /// `has_next_page`, untouched.
    ///
    /// With nothing cached yet this loads the first page instead; an empty
    /// collection is reported as `NoNewData` as well.
    pub async fn fetch_previous_page(&self) -> Result<usize> {
        let Some(list) = self.cache.list(&self.scope) else {
            self.load_first_page().await?;
            return match self.item_ids().len() {
                0 => Err(FeedError::NoNewData),
                loaded => Ok(loaded),
            };
        };

        let cursor = list.newest_server_id().map(Cursor::new).unwrap_or(Cursor::START);
        let page = self.engine.fetch(&self.scope, cursor, Direction::Backward).await?;
        self.ensure_attached()?;

        let scope = self.scope;
        let added = self.cache.update(|state| {
            let Some(list) = state.lists.get_mut(&scope) else {
                return 0;
            };
            let fresh: Vec<i64> = page
                .items
                .iter()
                .map(FeedItem::id)
                .filter(|id| !list.contains(*id))
                .collect();
            let added = fresh.len();
            if added > 0 {
                list.pages.insert(0, fresh);
                list.page_params.insert(0, PageParam::Backward(cursor));
            }
            state.store(page.items);
            added
        });

        if added > 0 {
            debug!("Merged {} new items into {:?}", added, self.scope);
        }
        Ok(added)
    }

    /// Whether a forward fetch could still return items.
    pub fn has_next_page(&self) -> bool {
        self.cache
            .list(&self.scope)
            .is_some_and(|list| list.next_cursor.is_some())
    }

    pub fn item_ids(&self) -> Vec<i64> {
        self.cache
            .list(&self.scope)
            .map(|list| list.ids().collect())
            .unwrap_or_default()
    }

    pub fn items(&self) -> Vec<FeedItem> {
        self.cache.items(&self.scope)
    }

    fn ensure_attached(&self) -> Result<()> {
        if self.is_attached() {
            Ok(())
        } else {
            warn!("Dropping result for detached feed {:?}", self.scope);
            Err(FeedError::Detached)
        }
    }
}
