//! Client core of the kinetic feed: cursor pagination, a session-scoped
//! cache, optimistic mutations and background refresh.
//!
//! All shared state lives in a [`FeedCache`] owned by a [`FeedSession`].
//! Feeds and pollers are bound to cancellation tokens derived from the
//! session, so dropping a view or logging out stops everything under it.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod infinite;
pub mod media_poll;
pub mod optimistic;
pub mod pagination;
pub mod poller;
pub mod preview;
pub mod session;
pub mod source;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheState, FeedCache, PageParam, PagedList};
pub use config::FeedConfig;
pub use error::{FeedError, Result};
pub use http::HttpFeedClient;
pub use infinite::InfiniteFeed;
pub use media_poll::{MediaStatusPoller, refresh_processing_media};
pub use optimistic::{DraftMedia, OptimisticCoordinator, PostDraft};
pub use pagination::{FetchedPage, PaginationEngine};
pub use poller::{PollerHandle, RefreshPoller};
pub use preview::{PreviewHandle, PreviewRegistry};
pub use session::FeedSession;
pub use source::{CommentTarget, FeedSource, WriteApi};
