use std::sync::Arc;

use tracing::debug;

use kinetic_types::models::FeedItem;
use kinetic_types::pagination::{Cursor, Direction, FeedScope, MAX_PAGE_SIZE};

use crate::error::{FeedError, Result};
use crate::source::FeedSource;

/// One fetched window, always newest-first.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    pub items: Vec<FeedItem>,
    /// Cursor for the next call in the same direction. `None` once a
    /// forward walk is exhausted.
    pub next_cursor: Option<Cursor>,
}

impl FetchedPage {
    pub fn ids(&self) -> Vec<i64> {
        self.items.iter().map(FeedItem::id).collect()
    }
}

/// Computes forward and backward windows over a scope.
#[derive(Clone)]
pub struct PaginationEngine {
    source: Arc<dyn FeedSource>,
    page_size: u32,
}

impl PaginationEngine {
    /// `page_size` is clamped to what the server will return, otherwise a
    /// full server page would read as short and end the walk.
    pub fn new(source: Arc<dyn FeedSource>, page_size: u32) -> Self {
        Self {
            source,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn source(&self) -> &Arc<dyn FeedSource> {
        &self.source
    }

    /// Fetch the window after `cursor`.
    ///
    /// Forward: items older than `cursor`; the next cursor is the oldest id,
    /// or `None` when the page came back short.
    ///
    /// Backward: items newer than `cursor`, reversed to newest-first; the next
    /// cursor is the newest id. An empty backward window is
    /// `Err(FeedError::NoNewData)`, never an empty page.
    pub async fn fetch(&self, scope: &FeedScope, cursor: Cursor, direction: Direction) -> Result<FetchedPage> {
        let mut items = self
            .source
            .query_page(scope, cursor, direction, self.page_size)
            .await?;

        match direction {
            Direction::Forward => {
                let next_cursor = if items.len() < self.page_size as usize {
                    None
                } else {
                    items.last().map(|item| Cursor::new(item.id()))
                };
                Ok(FetchedPage { items, next_cursor })
            }
            Direction::Backward => {
                if items.is_empty() {
                    debug!("No items newer than {:?} in {:?}", cursor, scope);
                    return Err(FeedError::NoNewData);
                }
                items.reverse();
                let next_cursor = items.first().map(|item| Cursor::new(item.id()));
                Ok(FetchedPage { items, next_cursor })
            }
        }
    }
}
